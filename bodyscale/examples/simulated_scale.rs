//! Drive the engine against a simulated scale
//!
//! Run with `RUST_LOG=debug cargo run --example simulated_scale` to watch
//! the bring-up.

use std::time::Duration;

use anyhow::Context;
use chrono::NaiveDate;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

use bodyscale::{
    AdapterState, Characteristic, ChannelPeripheral, EngineConfig, Gender, MassUnit,
    MemoryProfileStore, PeripheralEvent, PeripheralRequest, ScaleEngine, ScaleEvent, Service,
    UnitSystem, UserProfile,
};

/// Answers requests the way a cooperative scale does
async fn simulate(
    mut requests: mpsc::Receiver<PeripheralRequest>,
    radio: mpsc::Sender<PeripheralEvent>,
) -> anyhow::Result<()> {
    radio
        .send(PeripheralEvent::AdapterState(AdapterState::PoweredOn))
        .await?;
    radio.send(PeripheralEvent::Connected).await?;

    while let Some(request) = requests.recv().await {
        match request {
            PeripheralRequest::DiscoverServices => {
                let services = Service::ALL.iter().map(|s| s.uuid()).collect();
                radio
                    .send(PeripheralEvent::ServicesDiscovered(services))
                    .await?;
            }
            PeripheralRequest::DiscoverCharacteristics(service) => {
                let found = Characteristic::ALL
                    .into_iter()
                    .filter(|c| c.service() == service);
                radio
                    .send(PeripheralEvent::characteristics_discovered(service, found))
                    .await?;
            }
            PeripheralRequest::Subscribe(characteristic) => {
                radio
                    .send(PeripheralEvent::subscribe_ack(characteristic))
                    .await?;
                if characteristic == Characteristic::WeightMeasurement {
                    tokio::spawn(step_on(radio.clone()));
                }
            }
            PeripheralRequest::Write {
                characteristic,
                value,
                with_ack,
            } => {
                if with_ack {
                    radio.send(PeripheralEvent::write_ack(characteristic)).await?;
                }
                if characteristic == Characteristic::UserControlPoint {
                    // [0x20, request, success, user id]
                    let response = match value.first() {
                        Some(0x01) => vec![0x20, 0x01, 0x01, 0x01],
                        Some(&op) => vec![0x20, op, 0x01],
                        None => continue,
                    };
                    radio
                        .send(PeripheralEvent::value(characteristic, response))
                        .await?;
                }
            }
            PeripheralRequest::Disconnect => {
                radio.send(PeripheralEvent::Disconnected).await?;
                break;
            }
        }
    }

    Ok(())
}

/// A settling weight reading followed by a two-part composition frame
async fn step_on(radio: mpsc::Sender<PeripheralEvent>) -> anyhow::Result<()> {
    for raw in [1250u16, 1290, 1300, 1302] {
        let [lo, hi] = raw.to_le_bytes();
        radio
            .send(PeripheralEvent::value(
                Characteristic::WeightMeasurement,
                vec![0x08, lo, hi, 0xF8, 0x00],
            ))
            .await?;
        sleep(Duration::from_millis(150)).await;
    }

    let composition = hex::decode(
        "7E 53 06 01 E5 07 03 07 0F 15 28 04 1E 05 AE 01 32 03 \
         66 03 FA 01 FE 01 F4 01 34 00 04 F6 00 AE 00 3B 00 96 03 04 00"
            .replace(' ', ""),
    )?;
    let (first, rest) = composition.split_at(20);
    radio
        .send(PeripheralEvent::value(
            Characteristic::BodyCompositionMeasurement,
            first.to_vec(),
        ))
        .await?;
    sleep(Duration::from_millis(50)).await;
    radio
        .send(PeripheralEvent::value(
            Characteristic::BodyCompositionMeasurement,
            rest.to_vec(),
        ))
        .await?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let dob = NaiveDate::from_ymd_opt(1988, 2, 29).context("invalid date of birth")?;
    let store = MemoryProfileStore::with_profile(UserProfile::new(
        UnitSystem::Metric,
        168,
        dob,
        Gender::Female,
    ));

    let (peripheral, requests) = ChannelPeripheral::new("simulated scale", 32);
    let (radio, radio_events) = mpsc::channel(32);
    let (engine, mut events) =
        ScaleEngine::new(EngineConfig::default(), peripheral, store.clone(), radio_events)?;
    let handle = engine.handle();

    let engine_task = tokio::spawn(engine.run());
    tokio::spawn(simulate(requests, radio));

    let mut composition_seen = false;
    let mut weight_seen = false;
    while let Some(event) = events.recv().await {
        println!("{}", event);

        match &event {
            ScaleEvent::WeightMeasured(m) => {
                if let Some(lb) = m.weight_in(MassUnit::Pound) {
                    println!("  = {:.1} lb", lb);
                }
                weight_seen = true;
            }
            ScaleEvent::CompositeMeasured(_) => composition_seen = true,
            _ => {}
        }

        if weight_seen && composition_seen {
            break;
        }
    }

    println!("Stored profile: {:?}", store.snapshot());

    handle.shutdown().await?;
    engine_task.await??;
    Ok(())
}
