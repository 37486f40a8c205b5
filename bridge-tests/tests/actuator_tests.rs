//! Integration Tests für Aktor-Controller und Kommando-Interpreter
//!
//! Diese Tests laufen auf dem Host (x86_64) und nutzen MockOutput

use bridge_core::actuator::ActuatorController;
use bridge_core::command::{self, ToneParams};
use bridge_core::types::Outbox;
use bridge_core::{
    Action, ActuatorSpec, Applied, ApplyError, Command, Drive, OutputError, Origin, ParseError,
    TonePolicy,
};

mod common;
use common::MockOutput;

const RELAY: ActuatorSpec = ActuatorSpec::switch("relay", "dev/relay/set", "dev/relay/state");
const BUZZER: ActuatorSpec = ActuatorSpec::tone("buzzer", "dev/buzzer/set", "dev/buzzer/state");

// ============================================================================
// Tests: Idempotenz
// ============================================================================

#[test]
fn test_on_on_writes_and_publishes_once() {
    let output = MockOutput::new();
    let mut driver = output.clone();
    let mut outbox = Outbox::new();
    let mut controller = ActuatorController::new(TonePolicy::default());
    let id = controller.add(RELAY, &mut driver).unwrap();

    let on = Command::new(id, Action::On);
    assert_eq!(
        controller.apply(&on, Origin::Remote, 0, &mut outbox),
        Ok(Applied::StateChanged)
    );
    assert_eq!(
        controller.apply(&on, Origin::Remote, 10, &mut outbox),
        Ok(Applied::NoOp)
    );

    assert_eq!(output.writes(), vec![Drive::On]);
    assert_eq!(outbox.len(), 1);
    let publish = outbox.front().unwrap();
    assert_eq!(publish.topic, "dev/relay/state");
    assert_eq!(publish.payload, "ON");
    assert!(publish.retain);
}

#[test]
fn test_off_while_off_is_noop() {
    let output = MockOutput::new();
    let mut driver = output.clone();
    let mut outbox = Outbox::new();
    let mut controller = ActuatorController::new(TonePolicy::default());
    let id = controller.add(RELAY, &mut driver).unwrap();

    assert_eq!(
        controller.apply(&Command::new(id, Action::Off), Origin::Local, 0, &mut outbox),
        Ok(Applied::NoOp)
    );
    assert_eq!(output.write_count(), 0);
    assert!(outbox.is_empty());
}

#[test]
fn test_toggle_twice_returns_to_original() {
    let output = MockOutput::new();
    let mut driver = output.clone();
    let mut outbox = Outbox::new();
    let mut controller = ActuatorController::new(TonePolicy::default());
    let id = controller.add(RELAY, &mut driver).unwrap();

    let toggle = Command::new(id, Action::Toggle);
    controller.apply(&toggle, Origin::Local, 0, &mut outbox).unwrap();
    assert!(controller.state(id).unwrap().current_value);
    controller.apply(&toggle, Origin::Local, 500, &mut outbox).unwrap();

    let state = controller.state(id).unwrap();
    assert!(!state.current_value);
    assert_eq!(state.last_changed_at, 500);
    assert_eq!(output.writes(), vec![Drive::On, Drive::Off]);
    assert_eq!(outbox.len(), 2);
}

#[test]
fn test_initialize_drives_everything_off() {
    let relay_out = MockOutput::new();
    let buzzer_out = MockOutput::new();
    let mut relay_driver = relay_out.clone();
    let mut buzzer_driver = buzzer_out.clone();
    let mut controller = ActuatorController::new(TonePolicy::default());
    controller.add(RELAY, &mut relay_driver).unwrap();
    let buzzer = controller.add(BUZZER, &mut buzzer_driver).unwrap();

    controller.initialize(42).unwrap();

    assert_eq!(relay_out.writes(), vec![Drive::Off]);
    assert_eq!(buzzer_out.writes(), vec![Drive::Off]);
    let state = controller.state(buzzer).unwrap();
    assert_eq!(state.origin, Origin::Startup);
    assert_eq!(state.last_changed_at, 42);
}

#[test]
fn test_write_failure_keeps_previous_state() {
    let output = MockOutput::new();
    let mut driver = output.clone();
    let mut outbox = Outbox::new();
    let mut controller = ActuatorController::new(TonePolicy::default());
    let id = controller.add(RELAY, &mut driver).unwrap();

    controller
        .apply(&Command::new(id, Action::On), Origin::Remote, 0, &mut outbox)
        .unwrap();
    output.fail_next_write();
    let result = controller.apply(&Command::new(id, Action::Off), Origin::Remote, 10, &mut outbox);

    assert_eq!(result, Err(ApplyError::Output(OutputError::WriteFailed)));
    assert!(controller.state(id).unwrap().current_value);
    assert_eq!(outbox.len(), 1);
}

// ============================================================================
// Tests: Interpreter → Controller
// ============================================================================

#[test]
fn test_malformed_json_leaves_state_unchanged() {
    let output = MockOutput::new();
    let mut driver = output.clone();
    let mut outbox = Outbox::new();
    let mut controller = ActuatorController::new(TonePolicy::default());
    let id = controller.add(BUZZER, &mut driver).unwrap();
    let before = *controller.state(id).unwrap();

    let result = command::parse(id, br#"{"state":"ON","frequency":}"#);
    assert_eq!(result, Err(ParseError::MalformedStructure));

    assert_eq!(*controller.state(id).unwrap(), before);
    assert_eq!(output.write_count(), 0);
    assert!(outbox.is_empty());
}

#[test]
fn test_parsed_tone_drives_requested_frequency() {
    let output = MockOutput::new();
    let mut driver = output.clone();
    let mut outbox = Outbox::new();
    let mut controller = ActuatorController::new(TonePolicy::default());
    let id = controller.add(BUZZER, &mut driver).unwrap();

    let cmd = command::parse(id, br#"{"state":"ON","frequency":1000,"duration":0.5}"#).unwrap();
    assert_eq!(
        cmd.params,
        Some(ToneParams {
            frequency_hz: Some(1000),
            duty: None,
            duration_ms: Some(500),
        })
    );
    controller.apply(&cmd, Origin::Remote, 100, &mut outbox).unwrap();

    assert_eq!(
        output.last(),
        Some(Drive::Tone {
            frequency_hz: 1000,
            duty: 32768
        })
    );
    assert_eq!(controller.next_deadline(), Some(600));

    assert_eq!(controller.expire_due(600, &mut outbox), 1);
    assert_eq!(output.last(), Some(Drive::Off));
    let payloads: Vec<&str> = core::iter::from_fn(|| outbox.pop_front()).map(|p| p.payload).collect();
    assert_eq!(payloads, vec!["ON", "OFF"]);
}

#[test]
fn test_tone_off_cancels_deadline() {
    let output = MockOutput::new();
    let mut driver = output.clone();
    let mut outbox = Outbox::new();
    let mut controller = ActuatorController::new(TonePolicy::default());
    let id = controller.add(BUZZER, &mut driver).unwrap();

    let on = command::parse(id, br#"{"state":"ON","duration":5}"#).unwrap();
    controller.apply(&on, Origin::Remote, 0, &mut outbox).unwrap();
    let off = command::parse(id, b"OFF").unwrap();
    controller.apply(&off, Origin::Remote, 1_000, &mut outbox).unwrap();

    assert_eq!(controller.next_deadline(), None);
    assert_eq!(controller.expire_due(5_000, &mut outbox), 0);
    assert_eq!(output.write_count(), 2);
}
