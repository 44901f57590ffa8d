//! Scale engine
//!
//! One actor task owns everything mutable about a scale connection: the
//! bring-up state machine, the measurement aggregator, the weight quiet
//! period and throttle, and the user profile. Peripheral events, host
//! commands, the bring-up tick and the quiet-period timer are all
//! serialized through a single `select!` loop.

use std::collections::HashSet;

use chrono::{Local, NaiveDate};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use bodyscale_core::{
    Action, Bringup, Characteristic, CompositionOutcome, MeasurementAggregator, Service,
    UserControlPointResponse, WeightFrame, WeightThrottle,
};
use bodyscale_transport::{AdapterState, Peripheral, PeripheralEvent};
use bodyscale_types::{Gender, UnitSystem, UserProfile};

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::event::ScaleEvent;
use crate::store::ProfileStore;

/// Request from a [`ScaleHandle`] to the running engine
#[derive(Debug)]
enum EngineCommand {
    UpdateProfile {
        edit: ProfileEdit,
        reply: oneshot::Sender<Result<bool>>,
    },
    Profile(oneshot::Sender<UserProfile>),
    Shutdown,
}

/// Body metadata the user can edit locally
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileEdit {
    pub unit: UnitSystem,
    /// Height in the length unit of `unit`
    pub height: u16,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
}

/// State of one peripheral connection
///
/// Dropped as a whole on disconnect.
#[derive(Debug)]
struct Connection {
    discovered: HashSet<Characteristic>,

    /// Started once every required characteristic is discovered
    bringup: Option<Bringup>,

    aggregator: MeasurementAggregator,

    /// Pending weight announcement
    quiet_deadline: Option<Instant>,

    connected: bool,
}

impl Connection {
    fn new(unit: UnitSystem) -> Self {
        Self {
            discovered: HashSet::new(),
            bringup: None,
            aggregator: MeasurementAggregator::new(unit),
            quiet_deadline: None,
            connected: false,
        }
    }

    fn is_ready(&self) -> bool {
        Characteristic::REQUIRED
            .iter()
            .all(|c| self.discovered.contains(c))
    }

    fn is_bringing_up(&self) -> bool {
        self.bringup.as_ref().is_some_and(|b| !b.is_done())
    }
}

/// Protocol engine for one body-composition scale
///
/// # Examples
///
/// ```no_run
/// use bodyscale::{ChannelPeripheral, EngineConfig, MemoryProfileStore, ScaleEngine};
/// use tokio::sync::mpsc;
///
/// #[tokio::main]
/// async fn main() -> bodyscale::Result<()> {
///     let (peripheral, _requests) = ChannelPeripheral::new("scale", 32);
///     let (_radio, peripheral_events) = mpsc::channel(32);
///     let store = MemoryProfileStore::new();
///
///     let (engine, mut events) =
///         ScaleEngine::new(EngineConfig::default(), peripheral, store, peripheral_events)?;
///     let handle = engine.handle();
///     tokio::spawn(engine.run());
///
///     while let Some(event) = events.recv().await {
///         println!("{}", event);
///     }
///     handle.shutdown().await
/// }
/// ```
pub struct ScaleEngine<P, S> {
    config: EngineConfig,
    peripheral: P,
    store: S,
    profile: UserProfile,
    adapter: AdapterState,
    connection: Option<Connection>,
    throttle: WeightThrottle,

    peripheral_events: mpsc::Receiver<PeripheralEvent>,
    events: mpsc::Sender<ScaleEvent>,
    commands: mpsc::Receiver<EngineCommand>,
    command_tx: mpsc::Sender<EngineCommand>,
}

impl<P, S> ScaleEngine<P, S>
where
    P: Peripheral,
    S: ProfileStore,
{
    /// Create an engine and the receiver of its events
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoProfile`] if the store holds no profile yet, or
    /// the store's error if it cannot be read.
    pub fn new(
        config: EngineConfig,
        peripheral: P,
        store: S,
        peripheral_events: mpsc::Receiver<PeripheralEvent>,
    ) -> Result<(Self, mpsc::Receiver<ScaleEvent>)> {
        let profile = store.load_profile()?.ok_or(Error::NoProfile)?;
        info!(
            user_id = profile.id,
            unit = %profile.unit,
            "Loaded profile"
        );

        let (events, events_rx) = mpsc::channel(config.event_buffer.max(1));
        let (command_tx, commands) = mpsc::channel(8);

        let engine = Self {
            throttle: WeightThrottle::new(config.throttle_window),
            config,
            peripheral,
            store,
            profile,
            adapter: AdapterState::default(),
            connection: None,
            peripheral_events,
            events,
            commands,
            command_tx,
        };

        Ok((engine, events_rx))
    }

    /// Handle for talking to the engine once it runs
    pub fn handle(&self) -> ScaleHandle {
        ScaleHandle {
            commands: self.command_tx.clone(),
        }
    }

    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }

    pub fn adapter_state(&self) -> AdapterState {
        self.adapter
    }

    /// Check if bring-up completed on the current connection
    pub fn is_connected(&self) -> bool {
        self.connection.as_ref().is_some_and(|c| c.connected)
    }

    /// Apply a local profile edit
    ///
    /// Returns `true` if anything changed. A change is persisted and clears
    /// `profile_written`, so the next connection pushes the body metadata
    /// again.
    ///
    /// # Errors
    ///
    /// Returns a type error if the edited profile is invalid; the profile
    /// is left untouched.
    pub fn update_profile(&mut self, edit: ProfileEdit) -> Result<bool> {
        let mut candidate = self.profile.clone();
        let changed = candidate.apply_edit(
            edit.unit,
            edit.height,
            edit.date_of_birth,
            edit.gender,
        );
        if !changed {
            return Ok(false);
        }

        candidate.validate(today())?;
        self.profile = candidate;
        self.save_profile();
        info!("Profile updated");
        Ok(true)
    }

    /// Run until shut down or until the peripheral event stream closes
    pub async fn run(mut self) -> Result<()> {
        let mut tick = time::interval(self.config.tick_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Scale engine started on {}", self.peripheral.identifier());

        loop {
            let bringing_up = self
                .connection
                .as_ref()
                .is_some_and(Connection::is_bringing_up);
            let quiet_deadline = self.connection.as_ref().and_then(|c| c.quiet_deadline);

            tokio::select! {
                event = self.peripheral_events.recv() => {
                    let Some(event) = event else {
                        info!("Peripheral event stream closed");
                        break;
                    };
                    if let Err(e) = self.on_peripheral_event(event).await {
                        self.on_transport_error(e).await;
                    }
                }
                Some(command) = self.commands.recv() => {
                    if !self.on_command(command) {
                        break;
                    }
                }
                _ = tick.tick(), if bringing_up => {
                    if let Err(e) = self.drive_bringup().await {
                        self.on_transport_error(e).await;
                    }
                }
                _ = time::sleep_until(quiet_deadline.unwrap_or_else(Instant::now)),
                    if quiet_deadline.is_some() => {
                    self.on_quiet_period_elapsed().await;
                }
            }
        }

        info!("Scale engine stopped");
        Ok(())
    }

    /// Returns `false` when the engine should stop
    fn on_command(&mut self, command: EngineCommand) -> bool {
        match command {
            EngineCommand::UpdateProfile { edit, reply } => {
                let _ = reply.send(self.update_profile(edit));
            }
            EngineCommand::Profile(reply) => {
                let _ = reply.send(self.profile.clone());
            }
            EngineCommand::Shutdown => {
                debug!("Shutdown requested");
                return false;
            }
        }
        true
    }

    async fn on_peripheral_event(&mut self, event: PeripheralEvent) -> Result<()> {
        match event {
            PeripheralEvent::AdapterState(state) => self.on_adapter_state(state).await,
            PeripheralEvent::Connected => self.on_connected().await?,
            PeripheralEvent::ServicesDiscovered(services) => {
                self.on_services_discovered(services).await?
            }
            PeripheralEvent::CharacteristicsDiscovered {
                service,
                characteristics,
            } => {
                self.on_characteristics_discovered(service, characteristics)
                    .await?
            }
            PeripheralEvent::WriteAck(uuid) => {
                if let Some(characteristic) = resolve(uuid) {
                    let actions = self
                        .bringup()
                        .map(|b| b.on_write_ack(characteristic))
                        .unwrap_or_default();
                    self.apply(actions).await?;
                    self.drive_bringup().await?;
                }
            }
            PeripheralEvent::SubscribeAck(uuid) => {
                if let Some(characteristic) = resolve(uuid) {
                    let actions = self
                        .bringup()
                        .map(|b| b.on_subscribe_ack(characteristic))
                        .unwrap_or_default();
                    self.apply(actions).await?;
                    self.drive_bringup().await?;
                }
            }
            PeripheralEvent::Value {
                characteristic,
                value,
            } => {
                if let Some(characteristic) = resolve(characteristic) {
                    self.on_value(characteristic, &value).await?;
                }
            }
            PeripheralEvent::OperationFailed {
                characteristic,
                reason,
            } => {
                return Err(bodyscale_transport::Error::Operation {
                    characteristic,
                    reason,
                }
                .into());
            }
            PeripheralEvent::Disconnected => self.on_disconnected().await,
        }
        Ok(())
    }

    async fn on_adapter_state(&mut self, state: AdapterState) {
        debug!("Adapter state {:?} -> {:?}", self.adapter, state);
        self.adapter = state;
        self.emit(ScaleEvent::BluetoothStateChanged(state)).await;

        if state == AdapterState::PoweredOff && self.connection.take().is_some() {
            warn!("Adapter powered off, dropping session");
            self.emit(ScaleEvent::NotConnected).await;
        }
    }

    async fn on_connected(&mut self) -> Result<()> {
        if self.connection.take().is_some() {
            warn!("Connected while a session was live, starting over");
            self.emit(ScaleEvent::NotConnected).await;
        }

        info!("Connected to {}", self.peripheral.identifier());
        self.connection = Some(Connection::new(self.profile.unit));
        self.peripheral.discover_services().await?;
        Ok(())
    }

    async fn on_services_discovered(&mut self, services: Vec<Uuid>) -> Result<()> {
        if self.connection.is_none() {
            debug!("Ignoring service discovery without a session");
            return Ok(());
        }

        for uuid in services {
            match Service::from_uuid(uuid) {
                Some(service) => self.peripheral.discover_characteristics(service).await?,
                None => trace!("Skipping unknown service {}", uuid),
            }
        }
        Ok(())
    }

    async fn on_characteristics_discovered(
        &mut self,
        service: Uuid,
        characteristics: Vec<Uuid>,
    ) -> Result<()> {
        let Some(conn) = self.connection.as_mut() else {
            debug!("Ignoring characteristic discovery without a session");
            return Ok(());
        };

        conn.discovered
            .extend(characteristics.into_iter().filter_map(resolve));
        debug!(
            "Discovered characteristics of {}: {}/{} required",
            service,
            Characteristic::REQUIRED
                .iter()
                .filter(|c| conn.discovered.contains(*c))
                .count(),
            Characteristic::REQUIRED.len()
        );

        if conn.bringup.is_none() && conn.is_ready() {
            info!("All characteristics discovered, starting bring-up");
            conn.bringup = Some(Bringup::new());
            self.drive_bringup().await?;
        }
        Ok(())
    }

    async fn on_value(&mut self, characteristic: Characteristic, value: &[u8]) -> Result<()> {
        trace!("Value on {}: {}", characteristic, hex::encode_upper(value));

        let Some(conn) = self.connection.as_mut() else {
            debug!("Ignoring value on {} without a session", characteristic);
            return Ok(());
        };

        match characteristic {
            Characteristic::UserControlPoint => {
                let response = match UserControlPointResponse::decode_indication(value) {
                    Ok(response) => response,
                    Err(e) => return drop_malformed(characteristic, value, e),
                };
                debug!("Control point response: {}", response);

                let actions = match conn.bringup.as_mut() {
                    Some(bringup) => bringup.on_control_point(&response, &mut self.profile),
                    None => Vec::new(),
                };
                self.apply(actions).await?;
                self.drive_bringup().await?;
            }
            Characteristic::WeightMeasurement => match WeightFrame::decode(value) {
                Ok(frame) => {
                    conn.aggregator.on_weight_frame(&frame);
                    conn.quiet_deadline = Some(Instant::now() + self.config.quiet_period);
                }
                Err(e) => drop_malformed(characteristic, value, e)?,
            },
            Characteristic::BodyCompositionMeasurement => {
                match conn.aggregator.on_composition_notification(value) {
                    Ok(CompositionOutcome::Complete(_)) => {
                        let snapshot = conn.aggregator.measurement().clone();
                        info!("Composition measured: {}", snapshot);
                        self.emit(ScaleEvent::CompositeMeasured(snapshot)).await;
                    }
                    Ok(CompositionOutcome::Pending) => {}
                    Err(e) => drop_malformed(characteristic, value, e)?,
                }
            }
            other => trace!("Ignoring value on {}", other),
        }
        Ok(())
    }

    async fn on_quiet_period_elapsed(&mut self) {
        let Some(conn) = self.connection.as_mut() else {
            return;
        };
        conn.quiet_deadline = None;

        if !self.throttle.try_fire(Instant::now().into_std()) {
            return;
        }

        let snapshot = conn.aggregator.measurement().clone();
        info!("Weight measured: {}", snapshot);
        self.emit(ScaleEvent::WeightMeasured(snapshot)).await;
    }

    async fn on_disconnected(&mut self) {
        if self.connection.take().is_some() {
            info!("Disconnected from {}", self.peripheral.identifier());
            self.emit(ScaleEvent::NotConnected).await;
        } else {
            debug!("Disconnected without a session");
        }
    }

    /// Tear the session down after a failed peripheral operation
    async fn on_transport_error(&mut self, e: Error) {
        error!("Transport failure: {}", e);

        if self.connection.take().is_some() {
            self.emit(ScaleEvent::NotConnected).await;
        }
        if let Err(e) = self.peripheral.disconnect().await {
            warn!("Disconnect after failure also failed: {}", e);
        }
    }

    fn bringup(&mut self) -> Option<&mut Bringup> {
        self.connection.as_mut().and_then(|c| c.bringup.as_mut())
    }

    /// Issue whatever the current bring-up step still needs
    async fn drive_bringup(&mut self) -> Result<()> {
        let today = today();
        let actions = match self.connection.as_mut().and_then(|c| c.bringup.as_mut()) {
            Some(bringup) => bringup.poll(&mut self.profile, today),
            None => return Ok(()),
        };
        self.apply(actions).await
    }

    async fn apply(&mut self, actions: Vec<Action>) -> Result<()> {
        for action in actions {
            match action {
                Action::Subscribe(characteristic) => {
                    self.peripheral.subscribe(characteristic).await?;
                }
                Action::Write(command) => {
                    debug!("Writing {}", command);
                    self.peripheral
                        .write(command.characteristic(), command.encode(), true)
                        .await?;
                }
                Action::SaveProfile => self.save_profile(),
                Action::UserRegistered => self.emit(ScaleEvent::UserRegistered).await,
                Action::Connected => {
                    if let Some(conn) = self.connection.as_mut() {
                        conn.connected = true;
                    }
                    info!("Scale ready");
                    self.emit(ScaleEvent::Connected).await;
                }
            }
        }
        Ok(())
    }

    fn save_profile(&self) {
        if let Err(e) = self.store.save_profile(&self.profile) {
            warn!("Failed to save profile: {}", e);
        }
    }

    async fn emit(&mut self, event: ScaleEvent) {
        if self.events.send(event).await.is_err() {
            debug!("Event receiver dropped");
        }
    }
}

/// Drop a malformed notification; any other error tears the session down
fn drop_malformed(
    characteristic: Characteristic,
    value: &[u8],
    e: bodyscale_core::Error,
) -> Result<()> {
    if !e.is_decoding_error() {
        return Err(e.into());
    }
    warn!(
        "Dropping malformed value on {} {}: {}",
        characteristic,
        hex::encode_upper(value),
        e
    );
    Ok(())
}

fn resolve(uuid: Uuid) -> Option<Characteristic> {
    match Characteristic::try_from(uuid) {
        Ok(c) => Some(c),
        Err(e) => {
            trace!("{}", e);
            None
        }
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Cloneable handle to a running [`ScaleEngine`]
#[derive(Debug, Clone)]
pub struct ScaleHandle {
    commands: mpsc::Sender<EngineCommand>,
}

impl ScaleHandle {
    /// Push a local profile edit, see [`ScaleEngine::update_profile`]
    pub async fn update_profile(&self, edit: ProfileEdit) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineCommand::UpdateProfile { edit, reply }).await?;
        rx.await.map_err(|_| Error::EngineStopped)?
    }

    /// Current profile as the engine sees it
    pub async fn profile(&self) -> Result<UserProfile> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineCommand::Profile(reply)).await?;
        rx.await.map_err(|_| Error::EngineStopped)
    }

    /// Stop the engine
    pub async fn shutdown(&self) -> Result<()> {
        self.send(EngineCommand::Shutdown).await
    }

    async fn send(&self, command: EngineCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| Error::EngineStopped)
    }
}
