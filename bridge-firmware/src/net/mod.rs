// Netzwerk-Kollaborateure der Bridge: WiFi-Link und MQTT-Transport

pub mod link;
pub mod mqtt;

pub use link::WifiLink;
pub use mqtt::RustMqttTransport;
