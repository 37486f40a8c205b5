//! Bridge-Loop
//!
//! Kooperativer Scheduler, der Eingänge, Aktoren, Kommando-Interpreter und
//! Verbindungs-Überwachung pro Tick zusammenführt:
//!
//! 1. Verbindung überwachen (Reconnect mit Backoff)
//! 2. Abgelaufene Töne abschalten
//! 3. Eingänge entprellen → lokale Kommandos
//! 4. Eingehende Nachrichten parsen und anwenden (`Origin::Remote`)
//! 5. Lokale Kommandos anwenden (`Origin::Local`)
//! 6. Heartbeat
//! 7. Outbox in Einfüge-Reihenfolge flushen
//!
//! Einziger Suspend-Punkt neben dem Transport ist `Clock::delay_ms()`.

use core::fmt;

use heapless::Vec;

use crate::actuator::{ActuatorController, ActuatorSpec, ActuatorState, Applied, ApplyError};
use crate::command::{self, Command};
use crate::config::{AVAILABILITY_ONLINE, BridgeConfig};
use crate::debounce::EdgeDetector;
use crate::health::{ConnectionHealth, HealthMonitor, LinkState};
use crate::input::InputBinding;
use crate::traits::{
    Clock, InputPin, MqttTransport, Network, OutputDriver, OutputError, TransportError,
};
use crate::types::{ActuatorId, InputId, Inbox, Origin, Outbox, PendingPublish};

/// Maximale Anzahl Eingänge pro Gerät
pub const MAX_INPUTS: usize = 8;

/// Maximale Anzahl Discovery-Dokumente
pub const MAX_ANNOUNCEMENTS: usize = 16;

/// Zusammenfassung eines Ticks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TickReport {
    /// Akzeptierte Flanken
    pub edges: usize,
    /// Kommandos mit Zustandsänderung
    pub commands_applied: usize,
    /// Verworfene Payloads und fehlgeschlagene Hardware-Writes
    pub rejected: usize,
    /// Erfolgreich gesendete Publishes
    pub published: usize,
}

/// Fehler, die die Bridge-Loop beenden bzw. die Einrichtung abbrechen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeError {
    /// Zu viele Aktoren, Eingänge oder Announcements
    CapacityExceeded,
    /// Eingang verweist auf einen nicht registrierten Aktor
    UnknownActuator,
    Output(OutputError),
    /// Reconnect-Versuche erschöpft → Gerät neu starten
    FatalExhaustion { failures: u32 },
}

impl From<OutputError> for BridgeError {
    fn from(error: OutputError) -> Self {
        BridgeError::Output(error)
    }
}

impl From<ApplyError> for BridgeError {
    fn from(error: ApplyError) -> Self {
        match error {
            ApplyError::UnknownActuator => BridgeError::UnknownActuator,
            ApplyError::Output(e) => BridgeError::Output(e),
        }
    }
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeError::CapacityExceeded => f.write_str("capacity exceeded"),
            BridgeError::UnknownActuator => f.write_str("unknown actuator"),
            BridgeError::Output(e) => write!(f, "output error: {}", e),
            BridgeError::FatalExhaustion { failures } => {
                write!(f, "reconnection exhausted after {} failures", failures)
            }
        }
    }
}

impl core::error::Error for BridgeError {}

#[cfg(feature = "defmt")]
impl defmt::Format for BridgeError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            BridgeError::CapacityExceeded => defmt::write!(fmt, "Capacity exceeded"),
            BridgeError::UnknownActuator => defmt::write!(fmt, "Unknown actuator"),
            BridgeError::Output(e) => defmt::write!(fmt, "Output error: {}", e),
            BridgeError::FatalExhaustion { failures } => {
                defmt::write!(fmt, "Fatal exhaustion after {} failures", failures)
            }
        }
    }
}

struct InputChannel<'a> {
    binding: InputBinding,
    detector: EdgeDetector,
    pin: &'a mut dyn InputPin,
}

/// Die Bridge besitzt alle Komponenten für die Laufzeit des Prozesses
pub struct Bridge<'a, N, T, C> {
    config: BridgeConfig,
    network: N,
    transport: T,
    clock: C,
    inputs: Vec<InputChannel<'a>, MAX_INPUTS>,
    actuators: ActuatorController<'a>,
    announcements: Vec<PendingPublish, MAX_ANNOUNCEMENTS>,
    health: HealthMonitor,
    outbox: Outbox,
    inbox: Inbox,
    ticks_since_heartbeat: u32,
}

impl<'a, N, T, C> Bridge<'a, N, T, C>
where
    N: Network,
    T: MqttTransport,
    C: Clock,
{
    pub fn new(config: BridgeConfig, network: N, transport: T, clock: C) -> Self {
        Self {
            actuators: ActuatorController::new(config.tone),
            health: HealthMonitor::new(config.backoff),
            inbox: Inbox::with_limit(config.max_inbound_per_tick),
            config,
            network,
            transport,
            clock,
            inputs: Vec::new(),
            announcements: Vec::new(),
            outbox: Outbox::new(),
            ticks_since_heartbeat: 0,
        }
    }

    pub fn add_actuator(
        &mut self,
        spec: ActuatorSpec,
        output: &'a mut dyn OutputDriver,
    ) -> Result<ActuatorId, BridgeError> {
        self.actuators
            .add(spec, output)
            .ok_or(BridgeError::CapacityExceeded)
    }

    /// Registriert einen Eingang; der aktuelle Pegel gilt als Ausgangszustand
    pub fn add_input(
        &mut self,
        binding: InputBinding,
        pin: &'a mut dyn InputPin,
    ) -> Result<InputId, BridgeError> {
        if let Some((target, _)) = binding.control {
            if self.actuators.state(target).is_none() {
                return Err(BridgeError::UnknownActuator);
            }
        }
        let index = u8::try_from(self.inputs.len()).map_err(|_| BridgeError::CapacityExceeded)?;
        let id = InputId(index);
        let debounce_ms = binding.debounce_ms.unwrap_or(self.config.debounce_ms);
        let detector = EdgeDetector::new(debounce_ms, pin.read());
        self.inputs
            .push(InputChannel {
                binding,
                detector,
                pin,
            })
            .map_err(|_| BridgeError::CapacityExceeded)?;
        Ok(id)
    }

    /// Retained Nachricht, die bei jedem Verbindungsaufbau vor allen
    /// anderen gesendet wird (Discovery-Dokumente)
    pub fn announce(
        &mut self,
        topic: &'static str,
        payload: &'static str,
    ) -> Result<(), BridgeError> {
        self.announcements
            .push(PendingPublish::retained(topic, payload))
            .map_err(|_| BridgeError::CapacityExceeded)
    }

    /// Startzustand: alle Aktoren aus, danach `FollowLevel`-Eingänge anwenden
    pub fn start(&mut self) -> Result<(), BridgeError> {
        let now = self.clock.now_ms();
        self.actuators.initialize(now)?;

        // Der komplette Zustand wird beim Verbindungsaufbau ohnehin gesendet
        let mut startup = Outbox::new();
        for channel in self.inputs.iter() {
            if let Some(command) = channel.binding.initial_command(channel.detector.level()) {
                self.actuators
                    .apply(&command, Origin::Startup, now, &mut startup)?;
            }
        }
        info!(
            "Bridge: started with {} actuators, {} inputs",
            self.actuators.len(),
            self.inputs.len()
        );
        Ok(())
    }

    pub fn link_state(&self) -> LinkState {
        self.health.state()
    }

    pub fn health(&self) -> &ConnectionHealth {
        self.health.health()
    }

    pub fn actuator_state(&self, id: ActuatorId) -> Option<&ActuatorState> {
        self.actuators.state(id)
    }

    /// Entprellter Pegel eines Eingangs
    pub fn input_level(&self, id: InputId) -> Option<bool> {
        self.inputs.get(id.index()).map(|channel| channel.detector.level())
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Ein Durchlauf der Loop (ohne abschließendes Sleep)
    ///
    /// Einzelne fehlerhafte Operationen brechen den Tick nicht ab; nur
    /// `FatalExhaustion` wird zurückgegeben.
    pub async fn tick(&mut self) -> Result<TickReport, BridgeError> {
        let mut report = TickReport::default();

        self.supervise_connection().await?;

        let now = self.clock.now_ms();
        self.actuators.expire_due(now, &mut self.outbox);

        let mut local: Vec<Command, MAX_INPUTS> = Vec::new();
        for channel in self.inputs.iter_mut() {
            let raw = channel.pin.read();
            let Some(edge) = channel.detector.observe(raw, now) else {
                continue;
            };
            report.edges += 1;
            debug!(
                "Input '{}': edge to {} at {}",
                channel.binding.name,
                edge.level(),
                edge.at
            );
            if let Some(publish) = channel.binding.report_edge(&edge) {
                self.outbox.push(publish);
            }
            if let Some(command) = channel.binding.resolve(&edge) {
                // Pro Eingang höchstens ein Kommando, Kapazität reicht immer
                let _ = local.push(command);
            }
        }

        if self.health.is_connected() {
            if let Err(e) = self.transport.poll_once(&mut self.inbox).await {
                self.on_transport_error(e);
            }
        }
        // Auch nach einem Fehler: bereits empfangene Nachrichten verarbeiten
        for message in self.inbox.take() {
            let Some(target) = self.actuators.find_by_command_topic(message.topic.as_str()) else {
                debug!("Bridge: ignoring message on '{}'", message.topic.as_str());
                continue;
            };
            match command::parse(target, &message.payload) {
                Ok(command) => self.execute(&command, Origin::Remote, &mut report).await,
                Err(e) => {
                    report.rejected += 1;
                    warn!(
                        "Bridge: rejected payload on '{}': {}",
                        message.topic.as_str(),
                        e
                    );
                }
            }
        }

        for command in local {
            self.execute(&command, Origin::Local, &mut report).await;
        }

        self.ticks_since_heartbeat = self.ticks_since_heartbeat.saturating_add(1);
        let heartbeat_ticks = self.config.heartbeat_ticks;
        if heartbeat_ticks > 0 && self.ticks_since_heartbeat >= heartbeat_ticks {
            self.ticks_since_heartbeat = 0;
            if self.health.is_connected() {
                debug!("Bridge: heartbeat");
                self.enqueue_snapshot();
            }
        }

        report.published += self.flush().await;

        if report != TickReport::default() {
            debug!(
                "Bridge: tick edges={} applied={} rejected={} published={}",
                report.edges,
                report.commands_applied,
                report.rejected,
                report.published
            );
        }
        Ok(report)
    }

    /// Endlos-Loop; kehrt nur mit einem fatalen Fehler zurück
    ///
    /// `after_tick` wird nach jedem erfolgreichen Tick aufgerufen
    /// (z.B. Status-LED).
    pub async fn run<F>(&mut self, mut after_tick: F) -> BridgeError
    where
        F: FnMut(&TickReport, LinkState),
    {
        loop {
            match self.tick().await {
                Ok(report) => after_tick(&report, self.health.state()),
                Err(e) => {
                    error!("Bridge: stopping: {}", e);
                    return e;
                }
            }
            self.clock.delay_ms(self.config.tick_interval_ms).await;
        }
    }

    async fn supervise_connection(&mut self) -> Result<(), BridgeError> {
        if self.health.is_connected() && !self.network.is_connected() {
            self.health.network_lost();
            self.on_transport_error(TransportError::NetworkUnavailable);
        }

        let now = self.clock.now_ms();
        if !self.health.attempt_due(now) {
            return Ok(());
        }

        self.health.begin_attempt(now);
        info!(
            "Bridge: connecting (attempt {})",
            self.health.health().consecutive_failures + 1
        );

        match self.establish().await {
            Ok(()) => {
                if let Some(event) = self.health.attempt_succeeded() {
                    info!("Bridge: online after {} failed attempts", event.after_failures);
                }
                for announcement in self.announcements.iter() {
                    self.outbox.push(*announcement);
                }
                self.enqueue_snapshot();
                self.ticks_since_heartbeat = 0;
                Ok(())
            }
            Err(e) => {
                self.transport.disconnect();
                let network_ok = self.network.is_connected();
                let now = self.clock.now_ms();
                self.health.attempt_failed(now, network_ok).map_err(|exhausted| {
                    error!(
                        "Bridge: giving up after {} failed attempts",
                        exhausted.failures
                    );
                    BridgeError::FatalExhaustion {
                        failures: exhausted.failures,
                    }
                })?;
                warn!(
                    "Bridge: connect failed: {}, retry in {} ms",
                    e,
                    self.health.health().backoff_ms
                );
                Ok(())
            }
        }
    }

    /// WiFi-Join, Broker-Handshake, alle Command-Topics abonnieren
    async fn establish(&mut self) -> Result<(), TransportError> {
        if !self.network.is_connected() {
            self.network.connect().await?;
        }
        self.health.network_joined();

        self.transport.connect().await?;
        for topic in self.actuators.command_topics() {
            self.transport.subscribe(topic).await?;
            debug!("Bridge: subscribed to '{}'", topic);
        }
        Ok(())
    }

    /// `Connected → Degraded → Disconnected`; die Outbox bleibt erhalten
    fn on_transport_error(&mut self, error: TransportError) {
        warn!("Bridge: transport error: {}", error);
        self.health.transport_failed();
        self.transport.disconnect();
        self.health.drop_session(self.clock.now_ms());
    }

    /// Availability, alle Aktor-Zustände und gemeldete Eingangspegel
    fn enqueue_snapshot(&mut self) {
        self.outbox.push(PendingPublish::retained(
            self.config.availability_topic,
            AVAILABILITY_ONLINE,
        ));
        self.actuators.republish_all(&mut self.outbox);
        for channel in self.inputs.iter() {
            if let Some(publish) = channel.binding.report_level(channel.detector.level()) {
                self.outbox.push(publish);
            }
        }
    }

    async fn execute(&mut self, command: &Command, origin: Origin, report: &mut TickReport) {
        let now = self.clock.now_ms();
        match self.actuators.apply(command, origin, now, &mut self.outbox) {
            Ok(Applied::StateChanged) => {
                report.commands_applied += 1;
                report.published += self.hold_short_tone(command.target).await;
            }
            Ok(Applied::NoOp) => {}
            Err(e) => {
                report.rejected += 1;
                warn!("Bridge: command rejected: {}", e);
            }
        }
    }

    /// Kurze Töne werden blockierend gehalten
    ///
    /// Das ON-Publish wird vorher gesendet, damit ON und OFF als zwei
    /// getrennte Nachrichten ankommen. Während des Haltens werden weder
    /// Eingänge noch Nachrichten bedient.
    async fn hold_short_tone(&mut self, target: ActuatorId) -> usize {
        let max_hold = self.config.tone.blocking_hold_max_ms;
        if max_hold == 0 {
            return 0;
        }
        let Some(off_at) = self.actuators.state(target).and_then(|state| state.off_at) else {
            return 0;
        };
        let remaining = off_at.saturating_sub(self.clock.now_ms());
        if remaining > max_hold {
            return 0;
        }

        let published = self.flush().await;
        debug!("Bridge: holding tone for {} ms", remaining);
        self.clock.delay_ms(remaining).await;
        let now = self.clock.now_ms();
        self.actuators.expire_due(now, &mut self.outbox);
        published
    }

    /// Sendet die Outbox in Einfüge-Reihenfolge
    ///
    /// Ein Eintrag wird erst nach erfolgreichem Publish entfernt; beim
    /// ersten Fehler bleibt der Rest für die nächste Session liegen.
    async fn flush(&mut self) -> usize {
        let mut published = 0;
        while self.health.is_connected() {
            let Some(item) = self.outbox.front().copied() else {
                break;
            };
            match self
                .transport
                .publish(item.topic, item.payload.as_bytes(), item.retain)
                .await
            {
                Ok(()) => {
                    self.outbox.pop_front();
                    published += 1;
                }
                Err(e) => self.on_transport_error(e),
            }
        }
        published
    }
}
