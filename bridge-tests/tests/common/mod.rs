//! Gemeinsame Mocks für die Integration Tests
//!
//! Jeder Mock teilt seinen Zustand über `Rc<RefCell<…>>` mit einem Handle,
//! damit Tests nach dem Ausleihen an die Bridge noch prüfen können.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use bridge_core::types::Inbox;
use bridge_core::{
    Clock, Drive, InputPin, Millis, MqttTransport, Network, OutputDriver, OutputError,
    TransportError,
};

// ============================================================================
// Mock Input
// ============================================================================

#[derive(Clone)]
pub struct MockInput {
    level: Rc<Cell<bool>>,
}

impl MockInput {
    pub fn new(level: bool) -> Self {
        Self {
            level: Rc::new(Cell::new(level)),
        }
    }

    pub fn set(&self, level: bool) {
        self.level.set(level);
    }
}

impl InputPin for MockInput {
    fn read(&mut self) -> bool {
        self.level.get()
    }
}

// ============================================================================
// Mock Output
// ============================================================================

#[derive(Default)]
pub struct OutputLog {
    pub writes: Vec<Drive>,
    pub fail_next_write: bool,
}

#[derive(Clone, Default)]
pub struct MockOutput {
    pub log: Rc<RefCell<OutputLog>>,
}

impl MockOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> Vec<Drive> {
        self.log.borrow().writes.clone()
    }

    pub fn write_count(&self) -> usize {
        self.log.borrow().writes.len()
    }

    pub fn last(&self) -> Option<Drive> {
        self.log.borrow().writes.last().copied()
    }

    pub fn fail_next_write(&self) {
        self.log.borrow_mut().fail_next_write = true;
    }
}

impl OutputDriver for MockOutput {
    fn drive(&mut self, drive: Drive) -> Result<(), OutputError> {
        let mut log = self.log.borrow_mut();
        if log.fail_next_write {
            log.fail_next_write = false;
            return Err(OutputError::WriteFailed);
        }
        log.writes.push(drive);
        Ok(())
    }
}

// ============================================================================
// Mock Clock
// ============================================================================

/// Virtuelle Uhr: `delay_ms()` spult die Zeit vor, ohne zu warten
#[derive(Clone, Default)]
pub struct MockClock {
    now: Rc<Cell<Millis>>,
}

impl MockClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ms: Millis) {
        self.now.set(self.now.get() + ms);
    }

    pub fn now(&self) -> Millis {
        self.now.get()
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> Millis {
        self.now.get()
    }

    async fn delay_ms(&mut self, ms: Millis) {
        self.advance(ms);
    }
}

// ============================================================================
// Mock Network
// ============================================================================

pub struct NetworkState {
    pub available: bool,
    pub connected: bool,
    pub connect_calls: usize,
}

#[derive(Clone)]
pub struct MockNetwork {
    pub state: Rc<RefCell<NetworkState>>,
}

impl MockNetwork {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(NetworkState {
                available: true,
                connected: false,
                connect_calls: 0,
            })),
        }
    }

    /// Simuliert Verlust des WLANs
    pub fn drop_link(&self) {
        let mut state = self.state.borrow_mut();
        state.available = false;
        state.connected = false;
    }

    pub fn restore(&self) {
        self.state.borrow_mut().available = true;
    }
}

impl Network for MockNetwork {
    async fn connect(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        state.connect_calls += 1;
        if state.available {
            state.connected = true;
            Ok(())
        } else {
            Err(TransportError::NetworkUnavailable)
        }
    }

    fn is_connected(&self) -> bool {
        self.state.borrow().connected
    }
}

// ============================================================================
// Mock Transport (Broker)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
}

#[derive(Default)]
pub struct BrokerState {
    pub reachable: bool,
    pub session: bool,
    /// So viele CONNECTs schlagen noch fehl
    pub fail_connects: usize,
    /// So viele Publishes schlagen noch fehl
    pub fail_publishes: usize,
    pub fail_next_poll: bool,
    pub connect_calls: usize,
    pub disconnects: usize,
    pub subscriptions: Vec<String>,
    pub published: Vec<Published>,
    pub incoming: VecDeque<(String, Vec<u8>)>,
}

#[derive(Clone)]
pub struct MockTransport {
    pub broker: Rc<RefCell<BrokerState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            broker: Rc::new(RefCell::new(BrokerState {
                reachable: true,
                ..Default::default()
            })),
        }
    }

    /// Stellt eine Nachricht für den nächsten `poll_once()` bereit
    pub fn inject(&self, topic: &str, payload: &[u8]) {
        self.broker
            .borrow_mut()
            .incoming
            .push_back((topic.to_string(), payload.to_vec()));
    }

    pub fn published(&self) -> Vec<Published> {
        self.broker.borrow().published.clone()
    }

    /// Payloads, die auf `topic` gesendet wurden
    pub fn payloads_on(&self, topic: &str) -> Vec<String> {
        self.broker
            .borrow()
            .published
            .iter()
            .filter(|p| p.topic == topic)
            .map(|p| p.payload.clone())
            .collect()
    }

    pub fn clear_published(&self) {
        self.broker.borrow_mut().published.clear();
    }
}

impl MqttTransport for MockTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        let mut broker = self.broker.borrow_mut();
        broker.connect_calls += 1;
        if broker.fail_connects > 0 {
            broker.fail_connects -= 1;
            return Err(TransportError::ConnectFailed);
        }
        if !broker.reachable {
            return Err(TransportError::ConnectFailed);
        }
        broker.session = true;
        Ok(())
    }

    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
    ) -> Result<(), TransportError> {
        let mut broker = self.broker.borrow_mut();
        if !broker.session {
            return Err(TransportError::PublishFailed);
        }
        if broker.fail_publishes > 0 {
            broker.fail_publishes -= 1;
            return Err(TransportError::PublishFailed);
        }
        broker.published.push(Published {
            topic: topic.to_string(),
            payload: String::from_utf8_lossy(payload).into_owned(),
            retain,
        });
        Ok(())
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        let mut broker = self.broker.borrow_mut();
        if !broker.session {
            return Err(TransportError::SubscribeFailed);
        }
        broker.subscriptions.push(topic.to_string());
        Ok(())
    }

    async fn poll_once(&mut self, inbox: &mut Inbox) -> Result<(), TransportError> {
        let mut broker = self.broker.borrow_mut();
        if broker.fail_next_poll {
            broker.fail_next_poll = false;
            return Err(TransportError::ReceiveFailed);
        }
        while !inbox.is_full() {
            let Some((topic, payload)) = broker.incoming.pop_front() else {
                break;
            };
            // Zu große Nachrichten verwirft der Transport
            let _ = inbox.push(&topic, &payload);
        }
        Ok(())
    }

    fn disconnect(&mut self) {
        let mut broker = self.broker.borrow_mut();
        broker.session = false;
        broker.disconnects += 1;
    }
}
