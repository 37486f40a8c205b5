//! Eingangs-Bindungen: Flanke → lokales Kommando bzw. Zustands-Meldung
//!
//! Ob ein Taster beim Drücken oder beim Loslassen schaltet und ob beide
//! Flanken gemeldet werden, ist eine explizite Einstellung pro Eingang.

use crate::command::{Action, Command};
use crate::debounce::Edge;
use crate::types::{ActuatorId, Millis, PendingPublish};

/// Welcher Pegel "aktiv" (gedrückt, nass, ...) bedeutet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Polarity {
    ActiveHigh,
    /// Pull-Up: LOW = gedrückt
    ActiveLow,
}

impl Polarity {
    pub fn is_active(self, level: bool) -> bool {
        match self {
            Polarity::ActiveHigh => level,
            Polarity::ActiveLow => !level,
        }
    }
}

/// Lokale Steuerung eines Aktors durch einen Eingang
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EdgeAction {
    /// Umschalten beim Wechsel in den aktiven Pegel
    ToggleOnPress,
    /// Umschalten beim Wechsel in den inaktiven Pegel
    ToggleOnRelease,
    /// Aktor folgt dem Pegel (z.B. Bewässerungs-Relais folgt Feuchte-Sensor)
    FollowLevel { on_when_active: bool },
}

/// Welche Flanken eine Zustands-Meldung auslösen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReportEdges {
    Both,
    ActiveOnly,
}

/// Meldet den entprellten Pegel eines Eingangs auf ein eigenes Topic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReportSpec {
    pub topic: &'static str,
    pub high_payload: &'static str,
    pub low_payload: &'static str,
    pub retain: bool,
    pub edges: ReportEdges,
}

impl ReportSpec {
    /// Binärsensor mit beliebigen Payloads, beide Flanken, retained
    pub const fn levels(topic: &'static str, high: &'static str, low: &'static str) -> Self {
        Self {
            topic,
            high_payload: high,
            low_payload: low,
            retain: true,
            edges: ReportEdges::Both,
        }
    }

    pub fn payload(&self, level: bool) -> &'static str {
        if level {
            self.high_payload
        } else {
            self.low_payload
        }
    }
}

/// Konfiguration eines Eingangs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InputBinding {
    pub name: &'static str,
    pub polarity: Polarity,
    /// Überschreibt `BridgeConfig::debounce_ms`
    pub debounce_ms: Option<Millis>,
    pub control: Option<(ActuatorId, EdgeAction)>,
    pub report: Option<ReportSpec>,
}

impl InputBinding {
    pub const fn new(name: &'static str, polarity: Polarity) -> Self {
        Self {
            name,
            polarity,
            debounce_ms: None,
            control: None,
            report: None,
        }
    }

    pub const fn controls(mut self, target: ActuatorId, action: EdgeAction) -> Self {
        self.control = Some((target, action));
        self
    }

    pub const fn reports(mut self, report: ReportSpec) -> Self {
        self.report = Some(report);
        self
    }

    pub const fn debounce(mut self, debounce_ms: Millis) -> Self {
        self.debounce_ms = Some(debounce_ms);
        self
    }

    /// Übersetzt eine Flanke in ein lokales Kommando
    pub fn resolve(&self, edge: &Edge) -> Option<Command> {
        let (target, action) = self.control?;
        let active = self.polarity.is_active(edge.level());

        let action = match action {
            EdgeAction::ToggleOnPress if active => Action::Toggle,
            EdgeAction::ToggleOnRelease if !active => Action::Toggle,
            EdgeAction::ToggleOnPress | EdgeAction::ToggleOnRelease => return None,
            EdgeAction::FollowLevel { on_when_active } => follow(active, on_when_active),
        };
        Some(Command::new(target, action))
    }

    /// Kommando für den Startzustand (nur bei `FollowLevel`)
    pub fn initial_command(&self, level: bool) -> Option<Command> {
        match self.control? {
            (target, EdgeAction::FollowLevel { on_when_active }) => {
                let active = self.polarity.is_active(level);
                Some(Command::new(target, follow(active, on_when_active)))
            }
            _ => None,
        }
    }

    /// Zustands-Meldung für eine Flanke
    pub fn report_edge(&self, edge: &Edge) -> Option<PendingPublish> {
        let report = self.report?;
        let level = edge.level();
        if report.edges == ReportEdges::ActiveOnly && !self.polarity.is_active(level) {
            return None;
        }
        Some(PendingPublish {
            topic: report.topic,
            payload: report.payload(level),
            retain: report.retain,
        })
    }

    /// Zustands-Meldung für Heartbeat/Reconnect (nur bei `ReportEdges::Both`)
    pub fn report_level(&self, level: bool) -> Option<PendingPublish> {
        let report = self.report?;
        if report.edges != ReportEdges::Both {
            return None;
        }
        Some(PendingPublish {
            topic: report.topic,
            payload: report.payload(level),
            retain: report.retain,
        })
    }
}

fn follow(active: bool, on_when_active: bool) -> Action {
    if active == on_when_active {
        Action::On
    } else {
        Action::Off
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debounce::Direction;

    const RELAY: ActuatorId = ActuatorId(1);

    fn falling(at: Millis) -> Edge {
        Edge {
            direction: Direction::FallingToLow,
            at,
        }
    }

    fn rising(at: Millis) -> Edge {
        Edge {
            direction: Direction::RisingToHigh,
            at,
        }
    }

    #[test]
    fn test_toggle_on_press_active_low() {
        let button = InputBinding::new("a", Polarity::ActiveLow)
            .controls(RELAY, EdgeAction::ToggleOnPress);
        assert_eq!(
            button.resolve(&falling(0)),
            Some(Command::new(RELAY, Action::Toggle))
        );
        assert_eq!(button.resolve(&rising(300)), None);
    }

    #[test]
    fn test_toggle_on_release_active_low() {
        let button = InputBinding::new("a", Polarity::ActiveLow)
            .controls(RELAY, EdgeAction::ToggleOnRelease);
        assert_eq!(button.resolve(&falling(0)), None);
        assert_eq!(
            button.resolve(&rising(300)),
            Some(Command::new(RELAY, Action::Toggle))
        );
    }

    #[test]
    fn test_follow_level_inverted() {
        // Sensor LOW = nass → Relais aus; HIGH = trocken → Relais an
        let soil = InputBinding::new("soil", Polarity::ActiveLow)
            .controls(RELAY, EdgeAction::FollowLevel { on_when_active: false });
        assert_eq!(
            soil.resolve(&falling(0)).map(|c| c.action),
            Some(Action::Off)
        );
        assert_eq!(
            soil.resolve(&rising(10)).map(|c| c.action),
            Some(Action::On)
        );
        assert_eq!(soil.initial_command(true).map(|c| c.action), Some(Action::On));
    }

    #[test]
    fn test_initial_command_only_for_follow() {
        let button = InputBinding::new("a", Polarity::ActiveLow)
            .controls(RELAY, EdgeAction::ToggleOnPress);
        assert_eq!(button.initial_command(false), None);
    }

    #[test]
    fn test_report_both_edges() {
        let button = InputBinding::new("a", Polarity::ActiveLow)
            .reports(ReportSpec::levels("btn/a/state", "OFF", "ON"));
        assert_eq!(button.report_edge(&falling(0)).map(|p| p.payload), Some("ON"));
        assert_eq!(button.report_edge(&rising(5)).map(|p| p.payload), Some("OFF"));
        assert_eq!(button.report_level(true).map(|p| p.payload), Some("OFF"));
    }

    #[test]
    fn test_report_active_only() {
        let mut spec = ReportSpec::levels("btn/a/state", "OFF", "ON");
        spec.edges = ReportEdges::ActiveOnly;
        let button = InputBinding::new("a", Polarity::ActiveLow).reports(spec);
        assert!(button.report_edge(&falling(0)).is_some());
        assert!(button.report_edge(&rising(5)).is_none());
        assert!(button.report_level(false).is_none());
    }
}
