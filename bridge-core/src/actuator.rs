//! Aktor-Controller
//!
//! Einzige Quelle der Wahrheit für den aktuellen Zustand jedes Aktors.
//! `current_value` spiegelt immer den zuletzt tatsächlich auf die Hardware
//! geschriebenen Wert: schlägt der Schreibzugriff fehl, bleibt der Zustand
//! unverändert und es wird nichts gepublished.

use core::fmt;

use heapless::Vec;

use crate::command::{Action, Command, ToneParams};
use crate::config::TonePolicy;
use crate::traits::{OutputDriver, OutputError};
use crate::types::{ActuatorId, Drive, Millis, Origin, Outbox, PendingPublish};

/// Maximale Anzahl Aktoren pro Gerät
pub const MAX_ACTUATORS: usize = 8;

/// Art des Aktors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ActuatorKind {
    /// Relais, LED: nur an/aus
    Switch,
    /// PWM-Buzzer: an = Ton mit Frequenz/Duty, optional zeitbegrenzt
    Tone,
}

/// Statische Beschreibung eines Aktors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ActuatorSpec {
    pub name: &'static str,
    pub kind: ActuatorKind,
    /// None = nur lokal steuerbar
    pub command_topic: Option<&'static str>,
    pub state_topic: &'static str,
    pub on_payload: &'static str,
    pub off_payload: &'static str,
}

impl ActuatorSpec {
    pub const fn switch(
        name: &'static str,
        command_topic: &'static str,
        state_topic: &'static str,
    ) -> Self {
        Self {
            name,
            kind: ActuatorKind::Switch,
            command_topic: Some(command_topic),
            state_topic,
            on_payload: "ON",
            off_payload: "OFF",
        }
    }

    pub const fn tone(
        name: &'static str,
        command_topic: &'static str,
        state_topic: &'static str,
    ) -> Self {
        Self {
            kind: ActuatorKind::Tone,
            ..Self::switch(name, command_topic, state_topic)
        }
    }

    /// Aktor ohne Command-Topic (z.B. Relais hinter einem Sensor)
    pub const fn local_only(name: &'static str, state_topic: &'static str) -> Self {
        Self {
            name,
            kind: ActuatorKind::Switch,
            command_topic: None,
            state_topic,
            on_payload: "ON",
            off_payload: "OFF",
        }
    }

    pub fn state_publish(&self, value: bool) -> PendingPublish {
        PendingPublish::retained(
            self.state_topic,
            if value { self.on_payload } else { self.off_payload },
        )
    }
}

/// Aktueller Zustand eines Aktors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ActuatorState {
    pub id: ActuatorId,
    pub current_value: bool,
    pub last_changed_at: Millis,
    pub origin: Origin,
    /// Automatisches Abschalten (zeitbegrenzter Ton)
    pub off_at: Option<Millis>,
}

/// Ergebnis von `apply()`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Applied {
    StateChanged,
    NoOp,
}

/// Fehler beim Anwenden eines Kommandos
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyError {
    UnknownActuator,
    Output(OutputError),
}

impl From<OutputError> for ApplyError {
    fn from(error: OutputError) -> Self {
        ApplyError::Output(error)
    }
}

impl fmt::Display for ApplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplyError::UnknownActuator => f.write_str("unknown actuator"),
            ApplyError::Output(e) => write!(f, "hardware write failed: {}", e),
        }
    }
}

impl core::error::Error for ApplyError {}

#[cfg(feature = "defmt")]
impl defmt::Format for ApplyError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            ApplyError::UnknownActuator => defmt::write!(fmt, "Unknown actuator"),
            ApplyError::Output(e) => defmt::write!(fmt, "Output error: {}", e),
        }
    }
}

struct Slot<'a> {
    spec: ActuatorSpec,
    state: ActuatorState,
    output: &'a mut dyn OutputDriver,
}

/// Verwaltet alle Aktoren eines Geräts
///
/// Pro akzeptierter Zustandsänderung: genau ein Hardware-Write und genau
/// ein Publish in der Outbox. Abgelehnte No-Ops erzeugen beides nicht.
pub struct ActuatorController<'a> {
    slots: Vec<Slot<'a>, MAX_ACTUATORS>,
    tone: TonePolicy,
}

impl<'a> ActuatorController<'a> {
    pub fn new(tone: TonePolicy) -> Self {
        Self {
            slots: Vec::new(),
            tone,
        }
    }

    /// Registriert einen Aktor; Startzustand ist aus
    pub fn add(
        &mut self,
        spec: ActuatorSpec,
        output: &'a mut dyn OutputDriver,
    ) -> Option<ActuatorId> {
        let id = ActuatorId(u8::try_from(self.slots.len()).ok()?);
        let state = ActuatorState {
            id,
            current_value: false,
            last_changed_at: 0,
            origin: Origin::Startup,
            off_at: None,
        };
        self.slots.push(Slot { spec, state, output }).ok()?;
        Some(id)
    }

    /// Schreibt beim Booten alle Ausgänge auf aus
    pub fn initialize(&mut self, now: Millis) -> Result<(), OutputError> {
        for slot in self.slots.iter_mut() {
            slot.output.drive(Drive::Off)?;
            slot.state.current_value = false;
            slot.state.last_changed_at = now;
            slot.state.origin = Origin::Startup;
            slot.state.off_at = None;
            debug!("Actuator '{}' initialized OFF", slot.spec.name);
        }
        Ok(())
    }

    /// Wendet ein Kommando an
    ///
    /// - `On`/`Off`: idempotent, bei gleichem Zustand `NoOp`
    /// - `Toggle`: immer `StateChanged`
    /// - Ton mit Dauer > 0: setzt `off_at`
    pub fn apply(
        &mut self,
        command: &Command,
        origin: Origin,
        now: Millis,
        outbox: &mut Outbox,
    ) -> Result<Applied, ApplyError> {
        let tone = self.tone;
        let slot = self
            .slots
            .get_mut(command.target.index())
            .ok_or(ApplyError::UnknownActuator)?;

        let current = slot.state.current_value;
        let desired = match command.action {
            Action::On => true,
            Action::Off => false,
            Action::Toggle => !current,
        };

        if command.action != Action::Toggle && desired == current {
            debug!("Actuator '{}' already {}, no-op", slot.spec.name, desired);
            return Ok(Applied::NoOp);
        }

        let params = command.params.unwrap_or_default();
        let drive = if !desired {
            Drive::Off
        } else {
            match slot.spec.kind {
                ActuatorKind::Switch => Drive::On,
                ActuatorKind::Tone => tone_drive(&params, &tone),
            }
        };

        slot.output.drive(drive)?;

        let off_at = match (slot.spec.kind, desired, params.duration_ms) {
            (ActuatorKind::Tone, true, Some(duration)) if duration > 0 => {
                Some(now.saturating_add(duration))
            }
            _ => None,
        };

        slot.state.current_value = desired;
        slot.state.last_changed_at = now;
        slot.state.origin = origin;
        slot.state.off_at = off_at;
        outbox.push(slot.spec.state_publish(desired));

        info!(
            "Actuator '{}' -> {} ({})",
            slot.spec.name,
            if desired { "ON" } else { "OFF" },
            origin
        );
        Ok(Applied::StateChanged)
    }

    /// Schaltet alle Töne ab, deren Deadline erreicht ist
    ///
    /// Gibt die Anzahl abgeschalteter Aktoren zurück.
    pub fn expire_due(&mut self, now: Millis, outbox: &mut Outbox) -> usize {
        let mut expired = 0;
        for index in 0..self.slots.len() {
            let due = matches!(self.slots[index].state.off_at, Some(off_at) if now >= off_at);
            if !due {
                continue;
            }
            let command = Command::new(self.slots[index].state.id, Action::Off);
            match self.apply(&command, Origin::Timer, now, outbox) {
                Ok(Applied::StateChanged) => expired += 1,
                Ok(Applied::NoOp) => {}
                Err(e) => {
                    // Deadline bleibt stehen, nächster Tick versucht es erneut
                    error!(
                        "Actuator '{}' failed to switch off: {}",
                        self.slots[index].spec.name, e
                    );
                }
            }
        }
        expired
    }

    /// Frühestes `off_at` aller Aktoren
    pub fn next_deadline(&self) -> Option<Millis> {
        self.slots.iter().filter_map(|slot| slot.state.off_at).min()
    }

    /// Sucht den Aktor zu einem Command-Topic
    pub fn find_by_command_topic(&self, topic: &str) -> Option<ActuatorId> {
        self.slots
            .iter()
            .find(|slot| slot.spec.command_topic == Some(topic))
            .map(|slot| slot.state.id)
    }

    pub fn command_topics(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.slots.iter().filter_map(|slot| slot.spec.command_topic)
    }

    /// Reiht den aktuellen Zustand aller Aktoren in die Outbox ein
    pub fn republish_all(&self, outbox: &mut Outbox) {
        for slot in self.slots.iter() {
            outbox.push(slot.spec.state_publish(slot.state.current_value));
        }
    }

    pub fn state(&self, id: ActuatorId) -> Option<&ActuatorState> {
        self.slots.get(id.index()).map(|slot| &slot.state)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

fn tone_drive(params: &ToneParams, policy: &TonePolicy) -> Drive {
    Drive::Tone {
        frequency_hz: params.frequency_hz.unwrap_or(policy.default_frequency_hz),
        duty: params.duty.unwrap_or(policy.default_duty),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingOutput {
        last: Option<Drive>,
        writes: usize,
        fail_next_write: bool,
    }

    impl OutputDriver for RecordingOutput {
        fn drive(&mut self, drive: Drive) -> Result<(), OutputError> {
            if self.fail_next_write {
                self.fail_next_write = false;
                return Err(OutputError::WriteFailed);
            }
            self.last = Some(drive);
            self.writes += 1;
            Ok(())
        }
    }

    const RELAY: ActuatorSpec = ActuatorSpec::switch("relay", "dev/relay/set", "dev/relay/state");
    const BUZZER: ActuatorSpec =
        ActuatorSpec::tone("buzzer", "dev/buzzer/set", "dev/buzzer/state");

    #[test]
    fn test_on_on_is_idempotent() {
        let mut output = RecordingOutput::default();
        let mut outbox = Outbox::new();
        let mut controller = ActuatorController::new(TonePolicy::default());
        let id = controller.add(RELAY, &mut output).unwrap();

        let on = Command::new(id, Action::On);
        assert_eq!(
            controller.apply(&on, Origin::Remote, 10, &mut outbox),
            Ok(Applied::StateChanged)
        );
        assert_eq!(
            controller.apply(&on, Origin::Remote, 20, &mut outbox),
            Ok(Applied::NoOp)
        );
        assert_eq!(outbox.len(), 1);
        assert_eq!(controller.state(id).unwrap().last_changed_at, 10);
        drop(controller);
        assert_eq!(output.writes, 1);
    }

    #[test]
    fn test_failed_write_keeps_state() {
        let mut output = RecordingOutput {
            fail_next_write: true,
            ..Default::default()
        };
        let mut outbox = Outbox::new();
        let mut controller = ActuatorController::new(TonePolicy::default());
        let id = controller.add(RELAY, &mut output).unwrap();

        let result = controller.apply(&Command::new(id, Action::On), Origin::Local, 0, &mut outbox);
        assert_eq!(result, Err(ApplyError::Output(OutputError::WriteFailed)));
        assert!(!controller.state(id).unwrap().current_value);
        assert!(outbox.is_empty());
    }

    #[test]
    fn test_unknown_actuator() {
        let mut outbox = Outbox::new();
        let mut controller = ActuatorController::new(TonePolicy::default());
        let result = controller.apply(
            &Command::new(ActuatorId(3), Action::On),
            Origin::Remote,
            0,
            &mut outbox,
        );
        assert_eq!(result, Err(ApplyError::UnknownActuator));
    }

    #[test]
    fn test_tone_uses_policy_defaults() {
        let mut output = RecordingOutput::default();
        let mut outbox = Outbox::new();
        let mut controller = ActuatorController::new(TonePolicy::default());
        let id = controller.add(BUZZER, &mut output).unwrap();

        controller
            .apply(&Command::new(id, Action::On), Origin::Remote, 0, &mut outbox)
            .unwrap();
        assert_eq!(controller.state(id).unwrap().off_at, None);
        drop(controller);
        assert_eq!(
            output.last,
            Some(Drive::Tone {
                frequency_hz: 1000,
                duty: 32768
            })
        );
    }

    #[test]
    fn test_timed_tone_expires() {
        let mut output = RecordingOutput::default();
        let mut outbox = Outbox::new();
        let mut controller = ActuatorController::new(TonePolicy::default());
        let id = controller.add(BUZZER, &mut output).unwrap();

        let command = Command {
            target: id,
            action: Action::On,
            params: Some(ToneParams {
                frequency_hz: Some(2000),
                duty: None,
                duration_ms: Some(500),
            }),
        };
        controller
            .apply(&command, Origin::Remote, 1_000, &mut outbox)
            .unwrap();
        assert_eq!(controller.next_deadline(), Some(1_500));

        assert_eq!(controller.expire_due(1_499, &mut outbox), 0);
        assert_eq!(controller.expire_due(1_500, &mut outbox), 1);

        let state = controller.state(id).unwrap();
        assert!(!state.current_value);
        assert_eq!(state.origin, Origin::Timer);
        assert_eq!(state.off_at, None);
        assert_eq!(outbox.len(), 2);
    }

    #[test]
    fn test_switch_ignores_duration() {
        let mut output = RecordingOutput::default();
        let mut outbox = Outbox::new();
        let mut controller = ActuatorController::new(TonePolicy::default());
        let id = controller.add(RELAY, &mut output).unwrap();

        let command = Command {
            target: id,
            action: Action::On,
            params: Some(ToneParams {
                duration_ms: Some(500),
                ..Default::default()
            }),
        };
        controller.apply(&command, Origin::Remote, 0, &mut outbox).unwrap();
        assert_eq!(controller.next_deadline(), None);
        drop(controller);
        assert_eq!(output.last, Some(Drive::On));
    }

    #[test]
    fn test_command_topic_lookup() {
        let mut relay = RecordingOutput::default();
        let mut buzzer = RecordingOutput::default();
        let mut controller = ActuatorController::new(TonePolicy::default());
        let relay_id = controller.add(RELAY, &mut relay).unwrap();
        let buzzer_id = controller.add(BUZZER, &mut buzzer).unwrap();

        assert_eq!(controller.find_by_command_topic("dev/relay/set"), Some(relay_id));
        assert_eq!(controller.find_by_command_topic("dev/buzzer/set"), Some(buzzer_id));
        assert_eq!(controller.find_by_command_topic("dev/other/set"), None);
        assert_eq!(controller.command_topics().count(), 2);
    }
}
