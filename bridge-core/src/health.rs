//! Verbindungs-Überwachung
//!
//! State-Machine: `Disconnected → Connecting → Connected → Degraded → Disconnected`
//!
//! Der Monitor führt selbst keine I/O aus. Die Bridge meldet Ergebnisse
//! (Versuch erfolgreich/fehlgeschlagen, Transport-Fehler) und fragt ab,
//! ob ein neuer Versuch fällig ist.

use crate::config::BackoffPolicy;
use crate::types::Millis;

/// Zustand der Broker-Verbindung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkState {
    /// Kein Versuch aktiv, wartet auf Ablauf des Backoffs
    Disconnected,
    Connecting,
    Connected,
    /// Publish/Poll fehlgeschlagen nach bestehender Verbindung
    Degraded,
}

/// Zähler und Flags der Verbindung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectionHealth {
    pub network_connected: bool,
    pub broker_connected: bool,
    pub consecutive_failures: u32,
    pub last_attempt_at: Option<Millis>,
    pub backoff_ms: Millis,
}

/// Reconnect-Versuche erschöpft; Gerät muss neu starten
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Exhausted {
    pub failures: u32,
}

/// Ereignis beim Wechsel nach `Connected`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CameOnline {
    /// Fehlversuche vor diesem Erfolg
    pub after_failures: u32,
}

pub struct HealthMonitor {
    state: LinkState,
    health: ConnectionHealth,
    policy: BackoffPolicy,
}

impl HealthMonitor {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            state: LinkState::Disconnected,
            health: ConnectionHealth {
                network_connected: false,
                broker_connected: false,
                consecutive_failures: 0,
                last_attempt_at: None,
                backoff_ms: policy.floor_ms,
            },
            policy,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn health(&self) -> &ConnectionHealth {
        &self.health
    }

    pub fn is_connected(&self) -> bool {
        self.state == LinkState::Connected
    }

    /// Ist ein neuer Verbindungsversuch fällig?
    ///
    /// Beim Start sofort, danach erst wenn `backoff_ms` seit dem letzten
    /// Versuch vergangen ist.
    pub fn attempt_due(&self, now: Millis) -> bool {
        if self.state != LinkState::Disconnected {
            return false;
        }
        match self.health.last_attempt_at {
            None => true,
            Some(last) => now.saturating_sub(last) >= self.health.backoff_ms,
        }
    }

    /// `Disconnected → Connecting`
    pub fn begin_attempt(&mut self, now: Millis) {
        if self.state != LinkState::Disconnected {
            return;
        }
        self.state = LinkState::Connecting;
        self.health.last_attempt_at = Some(now);
        debug!(
            "Health: connecting (failures so far: {})",
            self.health.consecutive_failures
        );
    }

    pub fn network_joined(&mut self) {
        self.health.network_connected = true;
    }

    pub fn network_lost(&mut self) {
        self.health.network_connected = false;
    }

    /// `Connecting → Connected`: Zähler und Backoff zurücksetzen
    pub fn attempt_succeeded(&mut self) -> Option<CameOnline> {
        if self.state != LinkState::Connecting {
            return None;
        }
        let event = CameOnline {
            after_failures: self.health.consecutive_failures,
        };
        self.state = LinkState::Connected;
        self.health.network_connected = true;
        self.health.broker_connected = true;
        self.health.consecutive_failures = 0;
        self.health.backoff_ms = self.policy.floor_ms;
        Some(event)
    }

    /// `Connecting → Disconnected`: Backoff verdoppeln (mit Obergrenze)
    ///
    /// Gibt `Exhausted` zurück, sobald `max_failures` erreicht ist.
    pub fn attempt_failed(&mut self, now: Millis, network_ok: bool) -> Result<(), Exhausted> {
        if self.state != LinkState::Connecting {
            return Ok(());
        }
        self.state = LinkState::Disconnected;
        self.health.network_connected = network_ok;
        self.health.broker_connected = false;
        self.health.consecutive_failures = self.health.consecutive_failures.saturating_add(1);
        self.health.last_attempt_at = Some(now);
        self.health.backoff_ms = self
            .health
            .backoff_ms
            .saturating_mul(2)
            .min(self.policy.cap_ms);

        match self.policy.max_failures {
            Some(max) if self.health.consecutive_failures >= max => Err(Exhausted {
                failures: self.health.consecutive_failures,
            }),
            _ => Ok(()),
        }
    }

    /// `Connected → Degraded`
    pub fn transport_failed(&mut self) {
        if self.state == LinkState::Connected {
            self.state = LinkState::Degraded;
            self.health.broker_connected = false;
        }
    }

    /// `Degraded → Disconnected`: Session verwerfen, Backoff-Zyklus beginnt
    pub fn drop_session(&mut self, now: Millis) {
        if self.state == LinkState::Degraded {
            self.state = LinkState::Disconnected;
            self.health.broker_connected = false;
            self.health.last_attempt_at = Some(now);
        }
    }
}
