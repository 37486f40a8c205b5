//! Laufzeit-Konfiguration der Bridge
//!
//! Geräte-spezifische Werte (Pins, Topics, Zugangsdaten) liegen in der
//! Firmware als Compile-Time-Konstanten. Hier nur das Verhalten.

use crate::types::Millis;

/// Payload für das Availability-Topic (online)
pub const AVAILABILITY_ONLINE: &str = "online";

/// Payload für das Availability-Topic (offline, Last Will)
pub const AVAILABILITY_OFFLINE: &str = "offline";

/// Exponentielles Backoff für Reconnect-Versuche
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BackoffPolicy {
    /// Start- und Minimalwert (nach erfolgreicher Verbindung)
    pub floor_ms: Millis,
    /// Obergrenze
    pub cap_ms: Millis,
    /// Nach so vielen Fehlversuchen in Folge: FatalExhaustion (None = nie)
    pub max_failures: Option<u32>,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            floor_ms: 2_000,
            cap_ms: 30_000,
            max_failures: Some(10),
        }
    }
}

/// Defaults und Halte-Strategie für PWM-Töne
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TonePolicy {
    pub default_frequency_hz: u32,
    /// 16-Bit Duty (32768 = 50%)
    pub default_duty: u16,
    /// Töne bis zu dieser Dauer werden blockierend im Tick gehalten,
    /// längere über eine Deadline abgeschaltet. 0 = nie blockieren.
    pub blocking_hold_max_ms: Millis,
}

impl Default for TonePolicy {
    fn default() -> Self {
        Self {
            default_frequency_hz: 1_000,
            default_duty: 32_768,
            blocking_hold_max_ms: 0,
        }
    }
}

/// Verhalten der Bridge-Loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BridgeConfig {
    /// Retained Availability-Topic (online/offline)
    pub availability_topic: &'static str,
    /// Pause zwischen zwei Ticks
    pub tick_interval_ms: Millis,
    /// Alle N Ticks wird der komplette Zustand erneut gesendet
    pub heartbeat_ticks: u32,
    /// Default-Entprellzeit für Eingänge
    pub debounce_ms: Millis,
    /// Maximal verarbeitete eingehende Nachrichten pro Tick
    pub max_inbound_per_tick: usize,
    pub backoff: BackoffPolicy,
    pub tone: TonePolicy,
}

impl BridgeConfig {
    pub fn new(availability_topic: &'static str) -> Self {
        Self {
            availability_topic,
            tick_interval_ms: 50,
            // 6000 × 50 ms = 5 Minuten
            heartbeat_ticks: 6_000,
            debounce_ms: 200,
            max_inbound_per_tick: 4,
            backoff: BackoffPolicy::default(),
            tone: TonePolicy::default(),
        }
    }
}
