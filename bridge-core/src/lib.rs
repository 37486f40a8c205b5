//! Bridge Core - Platform-agnostic GPIO ⇄ MQTT Logic
//!
//! Diese Crate enthält KEINE Hardware-Dependencies.
//! Sie definiert Traits für die Kollaborateure (Pins, WiFi, MQTT, Uhr)
//! und die komplette Bridge-Logik darüber.

#![no_std]

// Muss als erstes Modul stehen, damit die Log-Makros überall sichtbar sind
#[macro_use]
mod fmt;

pub mod actuator;
pub mod bridge;
pub mod command;
pub mod config;
pub mod debounce;
pub mod discovery;
pub mod health;
pub mod input;
pub mod traits;
pub mod types;

// Re-exports für einfachen Zugriff
pub use actuator::{ActuatorSpec, ActuatorState, Applied, ApplyError};
pub use bridge::{Bridge, BridgeError, TickReport};
pub use command::{Action, Command, ParseError};
pub use config::{BackoffPolicy, BridgeConfig, TonePolicy};
pub use debounce::{Direction, Edge, EdgeDetector};
pub use health::{ConnectionHealth, LinkState};
pub use input::{EdgeAction, InputBinding, Polarity, ReportEdges, ReportSpec};
pub use traits::{
    Clock, InputPin, MqttTransport, Network, OutputDriver, OutputError, TransportError,
};
pub use types::{ActuatorId, Drive, InputId, Millis, Origin, PendingPublish};
