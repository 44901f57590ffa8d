//! Bring-up state machine
//!
//! Drives a freshly connected scale from "characteristics discovered" to
//! "streaming measurements":
//!
//! ```text
//! 1 subscribe vendor notify ──► 2 write unit ──► 3 subscribe control point
//!                                                          │
//!        ┌── registered ───────────────────────────────────┤
//!        │                                                 ▼
//!        │                               4 register new user (random passcode)
//!        │                                                 │ Response(RegisterNewUser, id)
//!        ▼                                                 ▼
//! 5 consent (+ body metadata) ──► 6 subscribe composition ──► 7 subscribe weight ──► done
//! ```
//!
//! The machine performs no I/O. [`Bringup::poll`] returns the actions of the
//! current step (once per step), and the `on_*` handlers consume the
//! peripheral's acknowledgements. Only acknowledgements advance the step;
//! polling again without one is a no-op, so a periodic tick can drive
//! `poll` safely.

use std::fmt;

use chrono::NaiveDate;
use rand::Rng;
use tracing::{debug, error, info, warn};

use bodyscale_types::UserProfile;

use crate::command::{AthleteMode, Command, ScaleUnitMode};
use crate::constants::MAX_PASSCODE;
use crate::control_point::{Opcode, UserControlPointResponse};
use crate::gatt::Characteristic;

/// Handshake step
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Step {
    SubscribeVendorNotify,
    WriteUnit,
    SubscribeControlPoint,
    RegisterUser,
    /// RegisterNewUser written, waiting for the scale to assign an id
    AwaitRegistration,
    Consent,
    SubscribeComposition,
    SubscribeWeight,
    Done,
}

impl Step {
    /// Position in the seven-step handshake, `None` once done
    pub fn number(self) -> Option<u8> {
        match self {
            Self::SubscribeVendorNotify => Some(1),
            Self::WriteUnit => Some(2),
            Self::SubscribeControlPoint => Some(3),
            Self::RegisterUser | Self::AwaitRegistration => Some(4),
            Self::Consent => Some(5),
            Self::SubscribeComposition => Some(6),
            Self::SubscribeWeight => Some(7),
            Self::Done => None,
        }
    }

    /// Characteristic whose acknowledgement completes the step
    pub fn characteristic(self) -> Option<Characteristic> {
        match self {
            Self::SubscribeVendorNotify => Some(Characteristic::VendorNotify),
            Self::WriteUnit => Some(Characteristic::VendorWrite),
            Self::SubscribeControlPoint
            | Self::RegisterUser
            | Self::AwaitRegistration
            | Self::Consent => Some(Characteristic::UserControlPoint),
            Self::SubscribeComposition => Some(Characteristic::BodyCompositionMeasurement),
            Self::SubscribeWeight => Some(Characteristic::WeightMeasurement),
            Self::Done => None,
        }
    }

    fn next(self) -> Self {
        match self {
            Self::SubscribeVendorNotify => Self::WriteUnit,
            Self::WriteUnit => Self::SubscribeControlPoint,
            Self::SubscribeControlPoint => Self::RegisterUser,
            Self::RegisterUser => Self::AwaitRegistration,
            Self::AwaitRegistration => Self::Consent,
            Self::Consent => Self::SubscribeComposition,
            Self::SubscribeComposition => Self::SubscribeWeight,
            Self::SubscribeWeight | Self::Done => Self::Done,
        }
    }

    fn is_subscribe(self) -> bool {
        matches!(
            self,
            Self::SubscribeVendorNotify
                | Self::SubscribeControlPoint
                | Self::SubscribeComposition
                | Self::SubscribeWeight
        )
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SubscribeVendorNotify => "subscribe vendor notify",
            Self::WriteUnit => "write unit",
            Self::SubscribeControlPoint => "subscribe control point",
            Self::RegisterUser => "register user",
            Self::AwaitRegistration => "await registration",
            Self::Consent => "consent",
            Self::SubscribeComposition => "subscribe composition",
            Self::SubscribeWeight => "subscribe weight",
            Self::Done => return write!(f, "done"),
        };
        match self.number() {
            Some(n) => write!(f, "step {} ({})", n, name),
            None => write!(f, "{}", name),
        }
    }
}

/// Effect requested by the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Enable notifications/indications on a characteristic
    Subscribe(Characteristic),

    /// Write a command, with response
    Write(Command),

    /// The profile was modified and must be persisted
    SaveProfile,

    /// The scale assigned a user id
    UserRegistered,

    /// Handshake complete
    Connected,
}

/// Per-connection handshake state
#[derive(Debug, Clone)]
pub struct Bringup {
    step: Step,

    /// The current step's actions have been handed out
    issued: bool,

    /// One-shot guard on the registration recovery
    delete_all_users_attempted: bool,

    /// DeleteAllUsers written, its response not yet seen
    awaiting_delete: bool,

    /// Forward transitions since the last (re)start
    advances: u32,
}

impl Default for Bringup {
    fn default() -> Self {
        Self::new()
    }
}

impl Bringup {
    pub fn new() -> Self {
        Self {
            step: Step::SubscribeVendorNotify,
            issued: false,
            delete_all_users_attempted: false,
            awaiting_delete: false,
            advances: 0,
        }
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn is_done(&self) -> bool {
        self.step == Step::Done
    }

    pub fn delete_all_users_attempted(&self) -> bool {
        self.delete_all_users_attempted
    }

    /// Forward transitions since the handshake (re)started
    pub fn advances(&self) -> u32 {
        self.advances
    }

    /// Hand out the current step's actions
    ///
    /// Returns an empty list if they were already handed out, so calling
    /// this on every tick and after every event is safe. Step 4 is skipped
    /// for a profile that already carries an id.
    pub fn poll(&mut self, profile: &mut UserProfile, today: NaiveDate) -> Vec<Action> {
        let mut actions = Vec::new();

        loop {
            if self.issued || self.is_done() {
                return actions;
            }

            match self.step {
                Step::SubscribeVendorNotify
                | Step::SubscribeControlPoint
                | Step::SubscribeComposition
                | Step::SubscribeWeight => {
                    if let Some(ch) = self.step.characteristic() {
                        actions.push(Action::Subscribe(ch));
                    }
                }
                Step::WriteUnit => {
                    actions.push(Action::Write(Command::SetUnit(ScaleUnitMode::from(
                        profile.unit,
                    ))));
                }
                Step::RegisterUser if profile.is_registered() => {
                    debug!(user_id = profile.id, "User already registered, skipping registration");
                    self.step = Step::Consent;
                    self.advances += 1;
                    continue;
                }
                Step::RegisterUser => {
                    let passcode = rand::thread_rng().gen_range(0..=MAX_PASSCODE);
                    profile.passcode = passcode;
                    actions.push(Action::Write(Command::RegisterNewUser { passcode }));
                    // The write is the step; its id arrives in step 4's response
                    self.advance();
                    self.issued = true;
                    return actions;
                }
                Step::AwaitRegistration => {}
                Step::Consent => {
                    actions.push(Action::Write(Command::Consent {
                        user_id: profile.id,
                        passcode: profile.passcode,
                    }));
                    if !profile.profile_written {
                        actions.extend(Self::body_metadata(profile, today));
                        profile.profile_written = true;
                        actions.push(Action::SaveProfile);
                    }
                }
                Step::Done => {}
            }

            debug!(step = %self.step, "Issuing bring-up step");
            self.issued = true;
            return actions;
        }
    }

    fn body_metadata(profile: &UserProfile, today: NaiveDate) -> Vec<Action> {
        let height = profile.height_cm().round().clamp(0.0, f64::from(u16::MAX)) as u16;

        vec![
            Action::Write(Command::SetGender(profile.gender)),
            Action::Write(Command::SetHeight(height)),
            Action::Write(Command::SetDateOfBirth(profile.date_of_birth)),
            Action::Write(Command::SetAge(profile.age_on(today))),
            Action::Write(Command::SetAthleteMode(AthleteMode::Normal)),
        ]
    }

    /// Subscription acknowledged
    pub fn on_subscribe_ack(&mut self, characteristic: Characteristic) -> Vec<Action> {
        if self.step.is_subscribe() && self.acknowledges(characteristic) {
            self.advance()
        } else {
            debug!(%characteristic, step = %self.step, "Ignoring subscribe acknowledgement");
            Vec::new()
        }
    }

    /// Write acknowledged
    ///
    /// Only the unit write completes on its acknowledgement; control point
    /// writes complete on their response and body metadata writes are not
    /// tracked.
    pub fn on_write_ack(&mut self, characteristic: Characteristic) -> Vec<Action> {
        if self.step == Step::WriteUnit && self.acknowledges(characteristic) {
            self.advance()
        } else {
            debug!(%characteristic, step = %self.step, "Ignoring write acknowledgement");
            Vec::new()
        }
    }

    fn acknowledges(&self, characteristic: Characteristic) -> bool {
        self.issued && self.step.characteristic() == Some(characteristic)
    }

    /// User control point response received
    pub fn on_control_point(
        &mut self,
        response: &UserControlPointResponse,
        profile: &mut UserProfile,
    ) -> Vec<Action> {
        match response.operation {
            Opcode::RegisterNewUser => self.on_registration(response, profile),
            Opcode::DeleteUsers => self.on_users_deleted(response, profile),
            Opcode::Consent => self.on_consent(response, profile),
            _ => {
                debug!(%response, "Ignoring control point response");
                Vec::new()
            }
        }
    }

    fn on_registration(
        &mut self,
        response: &UserControlPointResponse,
        profile: &mut UserProfile,
    ) -> Vec<Action> {
        if self.step != Step::AwaitRegistration {
            debug!(%response, step = %self.step, "Unsolicited registration response");
            return Vec::new();
        }

        if response.is_success() {
            let Some(id) = response.parameter else {
                warn!(%response, "Registration succeeded without a user id");
                return Vec::new();
            };

            info!(user_id = id, "User registered");
            profile.id = id;
            let mut actions = vec![Action::SaveProfile, Action::UserRegistered];
            actions.extend(self.advance());
            return actions;
        }

        if self.delete_all_users_attempted {
            error!(%response, "Registration failed after clearing the user table");
            return Vec::new();
        }

        warn!(%response, "Registration failed, deleting all users");
        self.delete_all_users_attempted = true;
        self.awaiting_delete = true;
        vec![Action::Write(Command::DeleteAllUsers)]
    }

    fn on_users_deleted(
        &mut self,
        response: &UserControlPointResponse,
        profile: &mut UserProfile,
    ) -> Vec<Action> {
        if !self.awaiting_delete {
            debug!(%response, "Unsolicited delete users response");
            return Vec::new();
        }
        self.awaiting_delete = false;

        if !response.is_success() {
            error!(%response, "Deleting all users failed");
            return Vec::new();
        }

        info!("User table cleared, restarting bring-up");
        profile.reset_registration();
        self.restart();
        vec![Action::SaveProfile]
    }

    fn on_consent(
        &mut self,
        response: &UserControlPointResponse,
        profile: &mut UserProfile,
    ) -> Vec<Action> {
        if self.step != Step::Consent || !self.issued {
            debug!(%response, step = %self.step, "Unsolicited consent response");
            return Vec::new();
        }

        if response.is_success() {
            return self.advance();
        }

        warn!(%response, user_id = profile.id, "Consent refused, registering again");
        profile.id = 0;
        self.restart();
        vec![Action::SaveProfile]
    }

    fn advance(&mut self) -> Vec<Action> {
        let from = self.step;
        self.step = from.next();
        self.issued = false;
        self.advances += 1;
        debug!(from = %from, to = %self.step, "Bring-up advanced");

        if self.is_done() {
            info!("Bring-up complete");
            vec![Action::Connected]
        } else {
            Vec::new()
        }
    }

    /// Back to step 1, keeping the delete-all-users guard
    fn restart(&mut self) {
        self.step = Step::SubscribeVendorNotify;
        self.issued = false;
        self.advances = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control_point::ResultCode;
    use bodyscale_types::{Gender, UnitSystem};
    use pretty_assertions::assert_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn today() -> NaiveDate {
        date(2021, 3, 7)
    }

    fn profile() -> UserProfile {
        UserProfile::new(UnitSystem::Metric, 172, date(1985, 6, 15), Gender::Male)
    }

    fn registered() -> UserProfile {
        let mut p = profile();
        p.id = 3;
        p.passcode = 1234;
        p.profile_written = true;
        p
    }

    fn response(operation: Opcode, result: ResultCode, parameter: Option<u8>) -> UserControlPointResponse {
        UserControlPointResponse {
            operation,
            result,
            parameter,
        }
    }

    /// Acknowledge every subscription and the unit write
    fn ack_all(b: &mut Bringup, actions: &[Action]) -> Vec<Action> {
        let mut out = Vec::new();
        for action in actions {
            match action {
                Action::Subscribe(ch) => out.extend(b.on_subscribe_ack(*ch)),
                Action::Write(cmd) if !cmd.is_control_point() => {
                    out.extend(b.on_write_ack(cmd.characteristic()))
                }
                _ => {}
            }
        }
        out
    }

    #[test]
    fn test_registered_user_completes_in_seven_steps() {
        let mut b = Bringup::new();
        let mut p = registered();
        let mut emitted = Vec::new();

        for _ in 0..16 {
            let actions = b.poll(&mut p, today());
            emitted.extend(actions.clone());
            emitted.extend(ack_all(&mut b, &actions));
            if actions.contains(&Action::Write(Command::Consent { user_id: 3, passcode: 1234 })) {
                emitted.extend(b.on_control_point(
                    &response(Opcode::Consent, ResultCode::Success, None),
                    &mut p,
                ));
            }
        }

        assert!(b.is_done());
        assert_eq!(b.advances(), 7);
        assert_eq!(emitted.iter().filter(|a| **a == Action::Connected).count(), 1);
        assert!(!emitted.contains(&Action::UserRegistered));
        assert!(!emitted.contains(&Action::SaveProfile));
        assert!(!emitted.iter().any(|a| matches!(a, Action::Write(Command::RegisterNewUser { .. }))));
    }

    #[test]
    fn test_step_order() {
        let mut b = Bringup::new();
        let mut p = registered();

        assert_eq!(
            b.poll(&mut p, today()),
            vec![Action::Subscribe(Characteristic::VendorNotify)]
        );
        b.on_subscribe_ack(Characteristic::VendorNotify);
        assert_eq!(
            b.poll(&mut p, today()),
            vec![Action::Write(Command::SetUnit(ScaleUnitMode::Kilogram))]
        );
        b.on_write_ack(Characteristic::VendorWrite);
        assert_eq!(
            b.poll(&mut p, today()),
            vec![Action::Subscribe(Characteristic::UserControlPoint)]
        );
        b.on_subscribe_ack(Characteristic::UserControlPoint);
        assert_eq!(
            b.poll(&mut p, today()),
            vec![Action::Write(Command::Consent { user_id: 3, passcode: 1234 })]
        );
        assert_eq!(b.step(), Step::Consent);
        b.on_control_point(&response(Opcode::Consent, ResultCode::Success, None), &mut p);
        assert_eq!(
            b.poll(&mut p, today()),
            vec![Action::Subscribe(Characteristic::BodyCompositionMeasurement)]
        );
        b.on_subscribe_ack(Characteristic::BodyCompositionMeasurement);
        assert_eq!(
            b.poll(&mut p, today()),
            vec![Action::Subscribe(Characteristic::WeightMeasurement)]
        );
        assert_eq!(
            b.on_subscribe_ack(Characteristic::WeightMeasurement),
            vec![Action::Connected]
        );
        assert!(b.poll(&mut p, today()).is_empty());
    }

    #[test]
    fn test_unregistered_user_completes_in_eight_steps() {
        let mut b = Bringup::new();
        let mut p = profile();

        // Steps 1..3
        for _ in 0..3 {
            let actions = b.poll(&mut p, today());
            ack_all(&mut b, &actions);
        }

        let actions = b.poll(&mut p, today());
        let [Action::Write(Command::RegisterNewUser { passcode })] = actions.as_slice() else {
            panic!("expected a registration write, got {:?}", actions);
        };
        assert!(*passcode <= MAX_PASSCODE);
        assert_eq!(p.passcode, *passcode);
        assert!(p.validate(today()).is_ok());
        assert_eq!(b.step(), Step::AwaitRegistration);
        assert!(b.poll(&mut p, today()).is_empty());

        let actions = b.on_control_point(
            &response(Opcode::RegisterNewUser, ResultCode::Success, Some(7)),
            &mut p,
        );
        assert_eq!(actions, vec![Action::SaveProfile, Action::UserRegistered]);
        assert_eq!(p.id, 7);

        let actions = b.poll(&mut p, today());
        assert_eq!(
            actions,
            vec![
                Action::Write(Command::Consent { user_id: 7, passcode: p.passcode }),
                Action::Write(Command::SetGender(Gender::Male)),
                Action::Write(Command::SetHeight(172)),
                Action::Write(Command::SetDateOfBirth(date(1985, 6, 15))),
                Action::Write(Command::SetAge(35)),
                Action::Write(Command::SetAthleteMode(AthleteMode::Normal)),
                Action::SaveProfile,
            ]
        );
        assert!(p.profile_written);

        // Metadata acks do not advance
        assert!(b.on_write_ack(Characteristic::UserGender).is_empty());
        assert_eq!(b.step(), Step::Consent);

        b.on_control_point(&response(Opcode::Consent, ResultCode::Success, None), &mut p);
        let actions = b.poll(&mut p, today());
        ack_all(&mut b, &actions);
        let actions = b.poll(&mut p, today());
        assert_eq!(ack_all(&mut b, &actions), vec![Action::Connected]);
        assert_eq!(b.advances(), 8);
    }

    #[test]
    fn test_imperial_height_is_sent_in_centimetres() {
        let mut b = Bringup::new();
        let mut p = UserProfile::new(UnitSystem::Imperial, 70, date(1990, 1, 1), Gender::Female);
        p.id = 1;

        for _ in 0..3 {
            let actions = b.poll(&mut p, today());
            ack_all(&mut b, &actions);
        }
        let actions = b.poll(&mut p, today());

        assert!(actions.contains(&Action::Write(Command::SetHeight(178))));
        assert!(actions.contains(&Action::Write(Command::SetGender(Gender::Female))));
    }

    #[test]
    fn test_poll_is_idempotent() {
        let mut b = Bringup::new();
        let mut p = registered();

        assert_eq!(b.poll(&mut p, today()).len(), 1);
        for _ in 0..100 {
            assert!(b.poll(&mut p, today()).is_empty());
        }
        assert_eq!(b.step(), Step::SubscribeVendorNotify);
    }

    #[test]
    fn test_stray_acknowledgements_are_ignored() {
        let mut b = Bringup::new();
        let mut p = registered();

        // Not issued yet
        assert!(b.on_subscribe_ack(Characteristic::VendorNotify).is_empty());
        assert_eq!(b.step(), Step::SubscribeVendorNotify);

        b.poll(&mut p, today());
        assert!(b.on_subscribe_ack(Characteristic::WeightMeasurement).is_empty());
        assert!(b.on_write_ack(Characteristic::VendorNotify).is_empty());
        assert_eq!(b.step(), Step::SubscribeVendorNotify);

        b.on_subscribe_ack(Characteristic::VendorNotify);
        assert_eq!(b.step(), Step::WriteUnit);
    }

    fn registration_failed() -> UserControlPointResponse {
        response(Opcode::RegisterNewUser, ResultCode::OperationFailed, None)
    }

    fn drive_to_registration(b: &mut Bringup, p: &mut UserProfile) {
        for _ in 0..4 {
            let actions = b.poll(p, today());
            ack_all(b, &actions);
        }
        assert_eq!(b.step(), Step::AwaitRegistration);
    }

    #[test]
    fn test_registration_failure_deletes_all_users_once() {
        let mut b = Bringup::new();
        let mut p = profile();
        drive_to_registration(&mut b, &mut p);

        assert_eq!(
            b.on_control_point(&registration_failed(), &mut p),
            vec![Action::Write(Command::DeleteAllUsers)]
        );
        assert!(b.delete_all_users_attempted());

        let actions = b.on_control_point(
            &response(Opcode::DeleteUsers, ResultCode::Success, None),
            &mut p,
        );
        assert_eq!(actions, vec![Action::SaveProfile]);
        assert_eq!(b.step(), Step::SubscribeVendorNotify);
        assert_eq!(b.advances(), 0);
        assert_eq!(p.id, 0);
        assert_eq!(p.passcode, 0);
        assert!(!p.profile_written);

        drive_to_registration(&mut b, &mut p);
        assert!(b.on_control_point(&registration_failed(), &mut p).is_empty());
        assert_eq!(b.step(), Step::AwaitRegistration);
    }

    #[test]
    fn test_repeated_delete_users_response_is_ignored() {
        let mut b = Bringup::new();
        let mut p = profile();
        drive_to_registration(&mut b, &mut p);

        b.on_control_point(&registration_failed(), &mut p);
        let deleted = response(Opcode::DeleteUsers, ResultCode::Success, None);
        assert_eq!(b.on_control_point(&deleted, &mut p), vec![Action::SaveProfile]);

        drive_to_registration(&mut b, &mut p);
        b.on_control_point(
            &response(Opcode::RegisterNewUser, ResultCode::Success, Some(7)),
            &mut p,
        );
        b.poll(&mut p, today());
        assert_eq!(b.step(), Step::Consent);
        assert!(p.profile_written);

        assert!(b.on_control_point(&deleted, &mut p).is_empty());
        assert_eq!(b.step(), Step::Consent);
        assert_eq!(p.id, 7);
        assert!(p.profile_written);
    }

    #[test]
    fn test_delete_users_response_without_attempt_is_ignored() {
        let mut b = Bringup::new();
        let mut p = registered();
        b.poll(&mut p, today());

        let actions = b.on_control_point(
            &response(Opcode::DeleteUsers, ResultCode::Success, None),
            &mut p,
        );
        assert!(actions.is_empty());
        assert_eq!(p.id, 3);
    }

    #[test]
    fn test_registration_success_without_id_stalls() {
        let mut b = Bringup::new();
        let mut p = profile();
        drive_to_registration(&mut b, &mut p);

        let actions = b.on_control_point(
            &response(Opcode::RegisterNewUser, ResultCode::Success, None),
            &mut p,
        );
        assert!(actions.is_empty());
        assert_eq!(b.step(), Step::AwaitRegistration);
        assert!(!p.is_registered());
    }

    #[test]
    fn test_consent_failure_restarts_without_deleting() {
        let mut b = Bringup::new();
        let mut p = registered();
        for _ in 0..4 {
            let actions = b.poll(&mut p, today());
            ack_all(&mut b, &actions);
        }
        assert_eq!(b.step(), Step::Consent);

        let actions = b.on_control_point(
            &response(Opcode::Consent, ResultCode::NotAuthorized, None),
            &mut p,
        );
        assert_eq!(actions, vec![Action::SaveProfile]);
        assert_eq!(p.id, 0);
        assert_eq!(b.step(), Step::SubscribeVendorNotify);
        assert!(!b.delete_all_users_attempted());

        // Re-registers on the way back through step 4
        drive_to_registration(&mut b, &mut p);
    }

    #[test]
    fn test_step_display() {
        assert_eq!(Step::SubscribeControlPoint.to_string(), "step 3 (subscribe control point)");
        assert_eq!(Step::AwaitRegistration.number(), Some(4));
        assert_eq!(Step::Done.to_string(), "done");
    }
}
