//! Home Assistant MQTT Discovery
//!
//! Baut die statischen Config-Dokumente für Aktoren und gemeldete Eingänge.
//! Die Dokumente werden bei jedem Reconnect retained gesendet, damit ein
//! Neustart von Home Assistant die Entitäten nicht verliert.
//!
//! Referenz: https://www.home-assistant.io/integrations/mqtt/#mqtt-discovery

use core::fmt::{self, Write};

use heapless::String;
use serde::Serialize;

use crate::actuator::{ActuatorKind, ActuatorSpec};
use crate::config::{AVAILABILITY_OFFLINE, AVAILABILITY_ONLINE};
use crate::input::ReportSpec;

/// Standard-Präfix von Home Assistant
pub const DISCOVERY_PREFIX: &str = "homeassistant";

pub const DISCOVERY_TOPIC_LEN: usize = 128;
pub const DISCOVERY_PAYLOAD_LEN: usize = 768;

/// `{device_id}_{object_id}`
const UNIQUE_ID_LEN: usize = 64;

pub type DiscoveryTopic = String<DISCOVERY_TOPIC_LEN>;
pub type DiscoveryPayload = String<DISCOVERY_PAYLOAD_LEN>;

/// Dokument passt nicht in seinen Buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DiscoveryOverflow;

impl From<fmt::Error> for DiscoveryOverflow {
    fn from(_: fmt::Error) -> Self {
        DiscoveryOverflow
    }
}

/// Geräte-Informationen (gemeinsam für alle Entitäten)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub model: &'static str,
    pub manufacturer: &'static str,
    pub sw_version: &'static str,
}

#[derive(Serialize)]
struct DeviceConfig<'a> {
    identifiers: &'a [&'a str],
    name: &'a str,
    model: &'a str,
    manufacturer: &'a str,
    sw_version: &'a str,
}

/// Gemeinsames Config-Dokument für switch, siren und binary_sensor
#[derive(Serialize)]
struct EntityConfig<'a> {
    name: &'a str,
    unique_id: &'a str,
    state_topic: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    command_topic: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    device_class: Option<&'a str>,
    payload_on: &'a str,
    payload_off: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    support_duration: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state_on: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state_off: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    optimistic: Option<bool>,
    availability_topic: &'a str,
    payload_available: &'a str,
    payload_not_available: &'a str,
    device: DeviceConfig<'a>,
}

impl<'a> EntityConfig<'a> {
    /// Pflichtfelder; alles Optionale bleibt weg
    fn new(
        device: &'a DeviceInfo,
        identifiers: &'a [&'a str],
        name: &'a str,
        unique_id: &'a str,
        state_topic: &'a str,
        availability_topic: &'a str,
    ) -> Self {
        Self {
            name,
            unique_id,
            state_topic,
            command_topic: None,
            device_class: None,
            payload_on: "ON",
            payload_off: "OFF",
            support_duration: None,
            state_on: None,
            state_off: None,
            optimistic: None,
            availability_topic,
            payload_available: AVAILABILITY_ONLINE,
            payload_not_available: AVAILABILITY_OFFLINE,
            device: DeviceConfig {
                identifiers,
                name: device.name,
                model: device.model,
                manufacturer: device.manufacturer,
                sw_version: device.sw_version,
            },
        }
    }

    fn to_payload(&self) -> Result<DiscoveryPayload, DiscoveryOverflow> {
        let mut json_buffer = [0u8; DISCOVERY_PAYLOAD_LEN];
        let n = serde_json_core::to_slice(self, &mut json_buffer)
            .map_err(|_| DiscoveryOverflow)?;
        let json_str = core::str::from_utf8(&json_buffer[..n]).map_err(|_| DiscoveryOverflow)?;
        String::try_from(json_str).map_err(|_| DiscoveryOverflow)
    }
}

/// Topic: `homeassistant/{component}/{device_id}/{object_id}/config`
pub fn discovery_topic(
    component: &str,
    device_id: &str,
    object_id: &str,
) -> Result<DiscoveryTopic, DiscoveryOverflow> {
    let mut topic = String::new();
    write!(
        topic,
        "{}/{}/{}/{}/config",
        DISCOVERY_PREFIX, component, device_id, object_id
    )?;
    Ok(topic)
}

/// HA-Komponente für einen Aktor
///
/// Aktoren ohne Command-Topic sind aus Sicht von HA nur Sensoren.
pub fn actuator_component(spec: &ActuatorSpec) -> &'static str {
    match (spec.kind, spec.command_topic) {
        (_, None) => "binary_sensor",
        (ActuatorKind::Switch, Some(_)) => "switch",
        (ActuatorKind::Tone, Some(_)) => "siren",
    }
}

fn unique_id(
    device: &DeviceInfo,
    object_id: &str,
) -> Result<String<UNIQUE_ID_LEN>, DiscoveryOverflow> {
    let mut id = String::new();
    write!(id, "{}_{}", device.id, object_id)?;
    Ok(id)
}

/// Config-Dokument für Relais (switch) bzw. Buzzer (siren)
pub fn actuator_config(
    device: &DeviceInfo,
    spec: &ActuatorSpec,
    availability_topic: &str,
) -> Result<DiscoveryPayload, DiscoveryOverflow> {
    let identifiers = [device.id];
    let unique_id = unique_id(device, spec.name)?;
    let is_tone = spec.kind == ActuatorKind::Tone;

    let config = EntityConfig {
        command_topic: spec.command_topic,
        payload_on: spec.on_payload,
        payload_off: spec.off_payload,
        support_duration: is_tone.then_some(true),
        state_on: is_tone.then_some(spec.on_payload),
        state_off: is_tone.then_some(spec.off_payload),
        optimistic: spec.command_topic.map(|_| false),
        ..EntityConfig::new(
            device,
            &identifiers,
            spec.name,
            &unique_id,
            spec.state_topic,
            availability_topic,
        )
    };
    config.to_payload()
}

/// Config-Dokument für einen gemeldeten Eingang (binary_sensor)
pub fn input_config(
    device: &DeviceInfo,
    name: &str,
    report: &ReportSpec,
    device_class: Option<&str>,
    availability_topic: &str,
) -> Result<DiscoveryPayload, DiscoveryOverflow> {
    let identifiers = [device.id];
    let unique_id = unique_id(device, name)?;

    // HA erwartet payload_on = aktiver Zustand; der Eingang meldet Pegel
    let config = EntityConfig {
        device_class,
        payload_on: report.low_payload,
        payload_off: report.high_payload,
        ..EntityConfig::new(
            device,
            &identifiers,
            name,
            &unique_id,
            report.topic,
            availability_topic,
        )
    };
    config.to_payload()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEVICE: DeviceInfo = DeviceInfo {
        id: "bitdoglab",
        name: "BitDogLab IO",
        model: "ESP32-C6",
        manufacturer: "BitDogLab",
        sw_version: "1.0.0",
    };

    #[test]
    fn test_discovery_topic_format() {
        let topic = discovery_topic("switch", "bitdoglab", "relay_a").unwrap();
        assert_eq!(topic.as_str(), "homeassistant/switch/bitdoglab/relay_a/config");
    }

    #[test]
    fn test_switch_config_contains_topics() {
        let spec = ActuatorSpec::switch("relay_a", "dev/relay_a/set", "dev/relay_a/state");
        let payload = actuator_config(&DEVICE, &spec, "dev/status").unwrap();
        assert!(payload.starts_with('{') && payload.ends_with('}'));
        assert!(payload.contains("\"command_topic\":\"dev/relay_a/set\""));
        assert!(payload.contains("\"state_topic\":\"dev/relay_a/state\""));
        assert!(payload.contains("\"availability_topic\":\"dev/status\""));
        assert!(payload.contains("\"unique_id\":\"bitdoglab_relay_a\""));
        assert!(!payload.contains("support_duration"));
        assert_eq!(actuator_component(&spec), "switch");
    }

    #[test]
    fn test_tone_config_is_siren() {
        let spec = ActuatorSpec::tone("buzzer", "dev/buzzer/set", "dev/buzzer/state");
        let payload = actuator_config(&DEVICE, &spec, "dev/status").unwrap();
        assert!(payload.contains("\"support_duration\":true"));
        assert_eq!(actuator_component(&spec), "siren");
    }

    #[test]
    fn test_local_only_actuator_has_no_command_topic() {
        let spec = ActuatorSpec::local_only("pump", "dev/pump/state");
        let payload = actuator_config(&DEVICE, &spec, "dev/status").unwrap();
        assert!(!payload.contains("command_topic"));
        assert!(!payload.contains("optimistic"));
        assert_eq!(actuator_component(&spec), "binary_sensor");
    }

    #[test]
    fn test_input_config_moisture() {
        let report = ReportSpec::levels("dev/soil/state", "1", "0");
        let payload =
            input_config(&DEVICE, "soil", &report, Some("moisture"), "dev/status").unwrap();
        assert!(payload.contains("\"device_class\":\"moisture\""));
        assert!(payload.contains("\"payload_on\":\"0\""));
        assert!(payload.contains("\"payload_off\":\"1\""));
    }

    #[test]
    fn test_config_escapes_strings() {
        let device = DeviceInfo {
            name: "Garten \"Nord\"",
            ..DEVICE
        };
        let spec = ActuatorSpec::switch("relay_a", "dev/relay_a/set", "dev/relay_a/state");
        let payload = actuator_config(&device, &spec, "dev/status").unwrap();
        assert!(payload.contains(r#""name":"Garten \"Nord\"""#));
        assert!(payload.contains(r#""identifiers":["bitdoglab"]"#));
    }

    static LONG_MODEL: [u8; DISCOVERY_PAYLOAD_LEN] = [b'x'; DISCOVERY_PAYLOAD_LEN];

    #[test]
    fn test_config_too_large_for_buffer() {
        let device = DeviceInfo {
            model: core::str::from_utf8(&LONG_MODEL).unwrap(),
            ..DEVICE
        };
        let spec = ActuatorSpec::switch("relay_a", "dev/relay_a/set", "dev/relay_a/state");
        assert_eq!(
            actuator_config(&device, &spec, "dev/status"),
            Err(DiscoveryOverflow)
        );
    }
}
