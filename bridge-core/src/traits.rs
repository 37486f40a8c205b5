//! Hardware- und Netzwerk-Abstraktions-Traits
//!
//! Diese Traits definieren die Schnittstellen zu den externen Kollaborateuren
//! (GPIO, PWM, WiFi, MQTT-Client, Uhr) ohne konkrete Implementierung.
//!
//! # Implementierungen
//! - **Production:** bridge-firmware (esp-hal, embassy-net, rust-mqtt)
//! - **Testing:** In-Memory Mocks in bridge-tests

use core::fmt;

use crate::types::{Drive, Inbox, Millis};

/// Fehler-Typ für Ausgangs-Operationen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputError {
    WriteFailed,
}

impl fmt::Display for OutputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputError::WriteFailed => f.write_str("output write failed"),
        }
    }
}

impl core::error::Error for OutputError {}

/// Netzwerk- bzw. Broker-Fehler
///
/// Wird über die Reconnect-State-Machine behandelt, nie lokal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    NetworkUnavailable,
    ConnectFailed,
    SubscribeFailed,
    PublishFailed,
    ReceiveFailed,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TransportError::NetworkUnavailable => "network unavailable",
            TransportError::ConnectFailed => "broker connect failed",
            TransportError::SubscribeFailed => "subscribe failed",
            TransportError::PublishFailed => "publish failed",
            TransportError::ReceiveFailed => "receive failed",
        };
        f.write_str(text)
    }
}

impl core::error::Error for TransportError {}

/// Digitaler Eingang (Taster, Sensor)
pub trait InputPin {
    /// Liest den rohen Pegel (true = HIGH)
    fn read(&mut self) -> bool;
}

/// Schaltbarer Ausgang (Relais, LED, Buzzer)
///
/// Ein Relais ignoriert die Ton-Parameter von `Drive::Tone` und schaltet ein.
pub trait OutputDriver {
    /// Schreibt den Zustand auf die Hardware
    ///
    /// # Fehlerbehandlung
    /// Gibt `OutputError::WriteFailed` zurück wenn Hardware-Zugriff fehlschlägt
    fn drive(&mut self, drive: Drive) -> Result<(), OutputError>;
}

/// Netzwerk-Anbindung (WiFi Join)
#[allow(async_fn_in_trait)]
pub trait Network {
    /// Versucht die Verbindung herzustellen (bzw. wartet auf den Join)
    async fn connect(&mut self) -> Result<(), TransportError>;

    fn is_connected(&self) -> bool;
}

/// MQTT-Client auf Transport-Ebene
///
/// Das Wire-Protokoll bleibt vollständig beim Implementierer.
#[allow(async_fn_in_trait)]
pub trait MqttTransport {
    /// Baut die Broker-Session auf (CONNECT/CONNACK)
    async fn connect(&mut self) -> Result<(), TransportError>;

    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
    ) -> Result<(), TransportError>;

    async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError>;

    /// Holt null oder mehr eingehende Nachrichten, ohne zu blockieren.
    /// Hört auf sobald `inbox.is_full()`.
    async fn poll_once(&mut self, inbox: &mut Inbox) -> Result<(), TransportError>;

    /// Verwirft die aktuelle Session
    fn disconnect(&mut self);
}

/// Monotone Uhr und einziger Suspend-Punkt der Bridge
#[allow(async_fn_in_trait)]
pub trait Clock {
    fn now_ms(&self) -> Millis;

    async fn delay_ms(&mut self, ms: Millis);
}

// ============================================================================
// defmt::Format Implementations (optional feature)
// ============================================================================

#[cfg(feature = "defmt")]
impl defmt::Format for OutputError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            OutputError::WriteFailed => defmt::write!(fmt, "Write failed"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for TransportError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            TransportError::NetworkUnavailable => defmt::write!(fmt, "Network unavailable"),
            TransportError::ConnectFailed => defmt::write!(fmt, "Connect failed"),
            TransportError::SubscribeFailed => defmt::write!(fmt, "Subscribe failed"),
            TransportError::PublishFailed => defmt::write!(fmt, "Publish failed"),
            TransportError::ReceiveFailed => defmt::write!(fmt, "Receive failed"),
        }
    }
}
