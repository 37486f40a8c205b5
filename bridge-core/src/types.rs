//! Core Types für die GPIO ⇄ MQTT Bridge
//!
//! Datenstrukturen ohne Hardware-Dependencies

use heapless::{Deque, String, Vec};

/// Zeitstempel bzw. Dauer in Millisekunden (monotone Uhr)
pub type Millis = u64;

/// Platz für Zustandsänderungen zusätzlich zum Verbindungs-Snapshot
pub const OUTBOX_HEADROOM: usize = 16;

/// Kapazität der ausgehenden Publish-Queue
///
/// Ein Verbindungsaufbau reiht alle Announcements, Availability, alle
/// Aktor-Zustände und alle Eingangspegel ein; das passt immer vollständig.
pub const OUTBOX_CAPACITY: usize = crate::bridge::MAX_ANNOUNCEMENTS
    + 1
    + crate::actuator::MAX_ACTUATORS
    + crate::bridge::MAX_INPUTS
    + OUTBOX_HEADROOM;

/// Maximale Anzahl eingehender Nachrichten pro Tick
pub const INBOX_CAPACITY: usize = 8;

/// Maximale Topic-Länge für eingehende Nachrichten
pub const MAX_TOPIC_LEN: usize = 96;

/// Maximale Payload-Länge für eingehende Nachrichten
pub const MAX_PAYLOAD_LEN: usize = 256;

/// Index eines registrierten Aktors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ActuatorId(pub(crate) u8);

impl ActuatorId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index eines registrierten Eingangs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InputId(pub(crate) u8);

impl InputId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Herkunft einer Zustandsänderung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Origin {
    /// Lokaler Eingang (Taster, Sensor)
    Local,
    /// Kommando über MQTT
    Remote,
    /// Initialzustand beim Booten
    Startup,
    /// Abgelaufene Ton-Dauer
    Timer,
}

/// Ansteuerung eines Ausgangs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Drive {
    Off,
    On,
    /// PWM-Ton: Frequenz in Hz, Duty als 16-Bit-Anteil (0..=65535)
    Tone { frequency_hz: u32, duty: u16 },
}

impl Drive {
    pub fn is_on(self) -> bool {
        !matches!(self, Drive::Off)
    }
}

/// Ausstehende MQTT-Nachricht
///
/// Wird bei jeder akzeptierten Zustandsänderung erzeugt und im
/// nächsten Flush in Einfüge-Reihenfolge gesendet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PendingPublish {
    pub topic: &'static str,
    pub payload: &'static str,
    pub retain: bool,
}

impl PendingPublish {
    pub const fn retained(topic: &'static str, payload: &'static str) -> Self {
        Self {
            topic,
            payload,
            retain: true,
        }
    }
}

/// FIFO der ausstehenden Publishes
///
/// Bei Überlauf wird der älteste Eintrag verworfen. State-Topics sind
/// retained und werden bei Reconnect und Heartbeat ohnehin neu gesendet.
#[derive(Default)]
pub struct Outbox {
    queue: Deque<PendingPublish, OUTBOX_CAPACITY>,
}

impl Outbox {
    pub const fn new() -> Self {
        Self {
            queue: Deque::new(),
        }
    }

    pub fn push(&mut self, item: PendingPublish) {
        if self.queue.is_full() {
            if let Some(dropped) = self.queue.pop_front() {
                warn!("Outbox full, dropping publish to '{}'", dropped.topic);
            }
        }
        // Nach pop_front ist garantiert Platz
        let _ = self.queue.push_back(item);
    }

    pub fn front(&self) -> Option<&PendingPublish> {
        self.queue.front()
    }

    pub fn pop_front(&mut self) -> Option<PendingPublish> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Eingehende MQTT-Nachricht (kopiert aus dem Transport-Buffer)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String<MAX_TOPIC_LEN>,
    pub payload: Vec<u8, MAX_PAYLOAD_LEN>,
}

/// Fehler beim Einfügen in die Inbox
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InboxError {
    Full,
    TopicTooLong,
    PayloadTooLarge,
}

/// Begrenzter Eingangspuffer für einen Tick
///
/// Der Transport füllt die Inbox in `poll_once()` bis `is_full()`,
/// die Bridge leert sie im selben Tick.
pub struct Inbox {
    messages: Vec<InboundMessage, INBOX_CAPACITY>,
    limit: usize,
}

impl Inbox {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            messages: Vec::new(),
            limit: limit.clamp(1, INBOX_CAPACITY),
        }
    }

    pub fn is_full(&self) -> bool {
        self.messages.len() >= self.limit
    }

    pub fn push(&mut self, topic: &str, payload: &[u8]) -> Result<(), InboxError> {
        if self.is_full() {
            return Err(InboxError::Full);
        }
        let topic = String::try_from(topic).map_err(|_| InboxError::TopicTooLong)?;
        let payload = Vec::from_slice(payload).map_err(|_| InboxError::PayloadTooLarge)?;
        self.messages
            .push(InboundMessage { topic, payload })
            .map_err(|_| InboxError::Full)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Nimmt alle gepufferten Nachrichten heraus und leert die Inbox
    pub fn take(&mut self) -> Vec<InboundMessage, INBOX_CAPACITY> {
        core::mem::take(&mut self.messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbox_keeps_order() {
        let mut outbox = Outbox::new();
        outbox.push(PendingPublish::retained("a", "ON"));
        outbox.push(PendingPublish::retained("b", "OFF"));
        assert_eq!(outbox.pop_front().map(|p| p.topic), Some("a"));
        assert_eq!(outbox.pop_front().map(|p| p.topic), Some("b"));
        assert!(outbox.is_empty());
    }

    #[test]
    fn test_outbox_drops_oldest_on_overflow() {
        let mut outbox = Outbox::new();
        outbox.push(PendingPublish::retained("first", "ON"));
        for _ in 0..OUTBOX_CAPACITY {
            outbox.push(PendingPublish::retained("next", "OFF"));
        }
        assert_eq!(outbox.len(), OUTBOX_CAPACITY);
        assert_eq!(outbox.front().map(|p| p.topic), Some("next"));
    }

    #[test]
    fn test_inbox_respects_limit() {
        let mut inbox = Inbox::with_limit(2);
        assert!(inbox.push("t", b"ON").is_ok());
        assert!(inbox.push("t", b"OFF").is_ok());
        assert!(inbox.is_full());
        assert_eq!(inbox.push("t", b"ON"), Err(InboxError::Full));

        let taken = inbox.take();
        assert_eq!(taken.len(), 2);
        assert!(inbox.is_empty());
    }

    #[test]
    fn test_inbox_rejects_oversized_payload() {
        let mut inbox = Inbox::with_limit(4);
        let big = [b'x'; MAX_PAYLOAD_LEN + 1];
        assert_eq!(inbox.push("t", &big), Err(InboxError::PayloadTooLarge));
        assert!(inbox.is_empty());
    }
}
