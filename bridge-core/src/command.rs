//! Kommando-Interpreter
//!
//! Dekodiert eingehende MQTT-Payloads in validierte Aktor-Kommandos.
//! Unterstützt werden:
//! - nackte Tokens: `ON`, `OFF`, `TOGGLE` (Groß-/Kleinschreibung egal)
//! - JSON: `{"state":"ON","frequency":1000,"duty":32768,"duration":0.5}`
//!
//! Redundante Kommandos (`ON` bei bereits eingeschaltetem Aktor) werden
//! hier NICHT gefiltert, das übernimmt der Aktor-Controller.

use core::fmt;

use serde::Deserialize;

use crate::types::{ActuatorId, Millis};

/// Gewünschte Aktion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Action {
    On,
    Off,
    Toggle,
}

impl Action {
    /// Parst ein Token ohne Rücksicht auf Groß-/Kleinschreibung
    pub fn from_token(token: &str) -> Option<Self> {
        let token = token.trim();
        if token.eq_ignore_ascii_case("ON") {
            Some(Action::On)
        } else if token.eq_ignore_ascii_case("OFF") {
            Some(Action::Off)
        } else if token.eq_ignore_ascii_case("TOGGLE") {
            Some(Action::Toggle)
        } else {
            None
        }
    }
}

/// Optionale Ton-Parameter eines Kommandos
///
/// Fehlende Werte werden über die `TonePolicy` aufgefüllt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ToneParams {
    pub frequency_hz: Option<u32>,
    pub duty: Option<u16>,
    /// Dauer in ms; 0 oder None = bis zum nächsten OFF
    pub duration_ms: Option<Millis>,
}

/// Validiertes Kommando für genau einen Aktor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Command {
    pub target: ActuatorId,
    pub action: Action,
    pub params: Option<ToneParams>,
}

impl Command {
    pub const fn new(target: ActuatorId, action: Action) -> Self {
        Self {
            target,
            action,
            params: None,
        }
    }
}

/// Fehler beim Parsen einer Payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// Kein gültiges UTF-8
    MalformedEncoding,
    /// JSON kaputt, `state` fehlt oder Parameter ausserhalb des Wertebereichs
    MalformedStructure,
    /// Token nicht in ON/OFF/TOGGLE
    UnknownAction,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ParseError::MalformedEncoding => "payload is not valid UTF-8",
            ParseError::MalformedStructure => "malformed structured payload",
            ParseError::UnknownAction => "unknown action",
        };
        f.write_str(text)
    }
}

impl core::error::Error for ParseError {}

#[cfg(feature = "defmt")]
impl defmt::Format for ParseError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            ParseError::MalformedEncoding => defmt::write!(fmt, "Malformed encoding"),
            ParseError::MalformedStructure => defmt::write!(fmt, "Malformed structure"),
            ParseError::UnknownAction => defmt::write!(fmt, "Unknown action"),
        }
    }
}

/// JSON-Form eines Kommandos (serde-json-core, zero-copy)
#[derive(Debug, Deserialize)]
struct StructuredCommand<'a> {
    #[serde(default, borrow)]
    state: Option<&'a str>,
    #[serde(default)]
    frequency: Option<u32>,
    #[serde(default)]
    duty: Option<u32>,
    /// Sekunden
    #[serde(default)]
    duration: Option<f32>,
}

/// Parst eine rohe Payload für den Aktor `target`
///
/// # Beispiele
///
/// ```
/// # use bridge_core::command::{parse, Action};
/// # use bridge_core::ActuatorId;
/// # fn demo(target: ActuatorId) {
/// let cmd = parse(target, b"toggle").unwrap();
/// assert_eq!(cmd.action, Action::Toggle);
/// # }
/// ```
pub fn parse(target: ActuatorId, raw: &[u8]) -> Result<Command, ParseError> {
    let text = core::str::from_utf8(raw).map_err(|_| ParseError::MalformedEncoding)?;
    let text = text.trim();

    if text.starts_with('{') {
        return parse_structured(target, text);
    }

    let action = Action::from_token(text).ok_or(ParseError::UnknownAction)?;
    Ok(Command::new(target, action))
}

fn parse_structured(target: ActuatorId, text: &str) -> Result<Command, ParseError> {
    let (payload, _) = serde_json_core::from_str::<StructuredCommand<'_>>(text)
        .map_err(|_| ParseError::MalformedStructure)?;

    let state = payload.state.ok_or(ParseError::MalformedStructure)?;
    let action = Action::from_token(state).ok_or(ParseError::UnknownAction)?;

    let frequency_hz = match payload.frequency {
        Some(0) => return Err(ParseError::MalformedStructure),
        other => other,
    };

    let duty = payload
        .duty
        .map(|duty| u16::try_from(duty).map_err(|_| ParseError::MalformedStructure))
        .transpose()?;

    let duration_ms = payload.duration.map(seconds_to_millis).transpose()?;

    let params = if frequency_hz.is_none() && duty.is_none() && duration_ms.is_none() {
        None
    } else {
        Some(ToneParams {
            frequency_hz,
            duty,
            duration_ms,
        })
    };

    Ok(Command {
        target,
        action,
        params,
    })
}

fn seconds_to_millis(seconds: f32) -> Result<Millis, ParseError> {
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(ParseError::MalformedStructure);
    }
    // Rundung auf ganze ms; jede Dauer > 0 bleibt zeitbegrenzt (0 = Dauerton)
    let millis = (seconds * 1000.0 + 0.5) as Millis;
    if seconds > 0.0 {
        Ok(millis.max(1))
    } else {
        Ok(millis)
    }
}
