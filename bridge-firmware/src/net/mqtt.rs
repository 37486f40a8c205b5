// MQTT-Transport auf Basis von rust-mqtt und embassy-net
//
// Der rust-mqtt Client besitzt seinen Transport für immer. Damit die
// Session ohne neuen Client neu aufgebaut werden kann, teilen sich
// Client und Transport einen statischen TCP-Socket hinter einem Mutex.

use bridge_core::config::AVAILABILITY_OFFLINE;
use bridge_core::types::Inbox;
use bridge_core::{MqttTransport, TransportError};
use defmt::{Debug2Format, debug, info, warn};
use embassy_net::tcp::TcpSocket;
use embassy_net::{IpAddress, Ipv4Address, Stack, dns::DnsQueryType};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::{Duration, Instant, with_timeout};
use embedded_io_async::{ErrorType, Read, Write};
use rust_mqtt::client::client::MqttClient;
use rust_mqtt::client::client_config::{ClientConfig, MqttVersion};
use rust_mqtt::packet::v5::publish_packet::QualityOfService;
use rust_mqtt::packet::v5::reason_codes::ReasonCode;
use rust_mqtt::utils::rng_generator::CountingRng;
use static_cell::{ConstStaticCell, StaticCell};

use crate::config::*;

/// Der eine TCP-Socket zum Broker
pub type SocketCell = Mutex<NoopRawMutex, TcpSocket<'static>>;

/// Statische Puffer für Socket und Client
struct MqttBuffers {
    tcp_rx: [u8; TCP_BUFFER_SIZE],
    tcp_tx: [u8; TCP_BUFFER_SIZE],
    send: [u8; MQTT_BUFFER_SIZE],
    recv: [u8; MQTT_BUFFER_SIZE],
}

static BUFFERS: ConstStaticCell<MqttBuffers> = ConstStaticCell::new(MqttBuffers {
    tcp_rx: [0; TCP_BUFFER_SIZE],
    tcp_tx: [0; TCP_BUFFER_SIZE],
    send: [0; MQTT_BUFFER_SIZE],
    recv: [0; MQTT_BUFFER_SIZE],
});

static SOCKET: StaticCell<SocketCell> = StaticCell::new();

// ============================================================================
// Geteilter Socket (embedded-io-async für rust-mqtt)
// ============================================================================

/// Transport-Handle für rust-mqtt
pub struct SharedSocket {
    socket: &'static SocketCell,
}

impl ErrorType for SharedSocket {
    type Error = embassy_net::tcp::Error;
}

impl Read for SharedSocket {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.socket.lock().await.read(buf).await
    }
}

impl Write for SharedSocket {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.socket.lock().await.write(buf).await
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        self.socket.lock().await.flush().await
    }
}

// ============================================================================
// MqttTransport
// ============================================================================

pub struct RustMqttTransport {
    stack: &'static Stack<'static>,
    socket: &'static SocketCell,
    client: MqttClient<'static, SharedSocket, 5, CountingRng>,
    last_ping: Instant,
}

impl RustMqttTransport {
    /// Erstellt Socket und Client (einmalig, Puffer sind statisch)
    ///
    /// Der Last Will meldet `offline` retained auf `availability_topic`.
    pub fn new(stack: &'static Stack<'static>, availability_topic: &'static str) -> Self {
        let MqttBuffers {
            tcp_rx,
            tcp_tx,
            send,
            recv,
        } = BUFFERS.take();
        let socket: &'static SocketCell =
            SOCKET.init(Mutex::new(TcpSocket::new(*stack, tcp_rx, tcp_tx)));

        let mut config = ClientConfig::<5, _>::new(MqttVersion::MQTTv5, CountingRng(20000));
        config.add_client_id(MQTT_CLIENT_ID);
        config.keep_alive = MQTT_KEEP_ALIVE_SECS;
        config.max_packet_size = MQTT_BUFFER_SIZE as u32;
        if let Some(username) = MQTT_USERNAME {
            config.add_username(username);
            if let Some(password) = MQTT_PASSWORD {
                config.add_password(password);
            }
        }
        config.add_will(availability_topic, AVAILABILITY_OFFLINE.as_bytes(), true);

        let send_len = send.len();
        let recv_len = recv.len();
        let client = MqttClient::<_, 5, _>::new(
            SharedSocket { socket },
            send,
            send_len,
            recv,
            recv_len,
            config,
        );

        Self {
            stack,
            socket,
            client,
            last_ping: Instant::now(),
        }
    }

    fn ping_due(&self) -> bool {
        self.last_ping.elapsed() >= Duration::from_secs(u64::from(MQTT_KEEP_ALIVE_SECS) / 2)
    }
}

impl MqttTransport for RustMqttTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        info!("MQTT: Resolving '{}'...", MQTT_BROKER);
        let broker_ip = resolve_hostname(self.stack, MQTT_BROKER).await?;
        info!("MQTT: Resolved to {}", Debug2Format(&broker_ip));

        {
            let mut socket = self.socket.lock().await;
            // Reste einer alten Session verwerfen
            socket.abort();
            socket.set_timeout(Some(Duration::from_secs(MQTT_SOCKET_TIMEOUT_SECS)));
            socket
                .connect((broker_ip, MQTT_PORT))
                .await
                .map_err(|e| {
                    warn!("MQTT: TCP connect failed: {}", Debug2Format(&e));
                    TransportError::ConnectFailed
                })?;
        }
        info!("MQTT: TCP connected");

        self.client.connect_to_broker().await.map_err(|e| {
            warn!("MQTT: CONNECT rejected: {}", Debug2Format(&e));
            TransportError::ConnectFailed
        })?;
        self.last_ping = Instant::now();
        info!("MQTT: Connected to broker as '{}'", MQTT_CLIENT_ID);
        Ok(())
    }

    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
    ) -> Result<(), TransportError> {
        debug!(
            "MQTT: Publishing to '{}' len={} retain={}",
            topic,
            payload.len(),
            retain
        );
        match self
            .client
            .send_message(topic, payload, QualityOfService::QoS0, retain)
            .await
        {
            // Zugestellt, nur niemand abonniert
            Ok(()) | Err(ReasonCode::NoMatchingSubscribers) => Ok(()),
            Err(e) => {
                warn!("MQTT: Publish to '{}' failed: {}", topic, Debug2Format(&e));
                Err(TransportError::PublishFailed)
            }
        }
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        self.client.subscribe_to_topic(topic).await.map_err(|e| {
            warn!("MQTT: Subscribe to '{}' failed: {}", topic, Debug2Format(&e));
            TransportError::SubscribeFailed
        })?;
        info!("MQTT: Subscribed to '{}'", topic);
        Ok(())
    }

    async fn poll_once(&mut self, inbox: &mut Inbox) -> Result<(), TransportError> {
        if self.ping_due() {
            self.client.send_ping().await.map_err(|e| {
                warn!("MQTT: Ping failed: {}", Debug2Format(&e));
                TransportError::ReceiveFailed
            })?;
            self.last_ping = Instant::now();
        }

        // Nur lesen wenn Daten anstehen, receive_message() würde sonst warten
        while !inbox.is_full() && self.socket.lock().await.can_recv() {
            let received = with_timeout(
                Duration::from_millis(MQTT_RECEIVE_TIMEOUT_MS),
                self.client.receive_message(),
            )
            .await;
            match received {
                Ok(Ok((topic, payload))) => {
                    if inbox.push(topic, payload).is_err() {
                        warn!(
                            "MQTT: Dropping message on '{}' ({} bytes)",
                            topic,
                            payload.len()
                        );
                    }
                }
                Ok(Err(e)) => {
                    warn!("MQTT: Receive failed: {}", Debug2Format(&e));
                    return Err(TransportError::ReceiveFailed);
                }
                // Paket nur halb gelesen, der Stream ist nicht mehr synchron
                Err(_) => {
                    warn!("MQTT: Receive timed out mid-packet");
                    return Err(TransportError::ReceiveFailed);
                }
            }
        }
        Ok(())
    }

    fn disconnect(&mut self) {
        // Client und Bridge laufen im selben Task, der Socket ist hier frei
        match self.socket.try_lock() {
            Ok(mut socket) => socket.abort(),
            Err(_) => warn!("MQTT: Socket busy, not aborted"),
        }
        info!("MQTT: Session dropped");
    }
}

/// Löst Hostname zu IPv4-Adresse auf
///
/// Nutzt embassy-net DNS-Stack mit konfigurierbarem Timeout.
async fn resolve_hostname(
    stack: &'static Stack<'static>,
    hostname: &str,
) -> Result<Ipv4Address, TransportError> {
    let result = with_timeout(
        Duration::from_secs(DNS_TIMEOUT_SECS),
        stack.dns_query(hostname, DnsQueryType::A),
    )
    .await;

    match result {
        Ok(Ok(addrs)) => addrs
            .iter()
            .find_map(|addr| match addr {
                IpAddress::Ipv4(ipv4) => Some(*ipv4),
                #[allow(unreachable_patterns)]
                _ => None,
            })
            .ok_or_else(|| {
                warn!("MQTT: No IPv4 address for '{}'", hostname);
                TransportError::ConnectFailed
            }),
        Ok(Err(e)) => {
            warn!("MQTT: DNS failed: {}", Debug2Format(&e));
            Err(TransportError::ConnectFailed)
        }
        Err(_) => {
            warn!("MQTT: DNS timeout after {}s", DNS_TIMEOUT_SECS);
            Err(TransportError::ConnectFailed)
        }
    }
}
