// Bridge Task - verbindet GPIOs mit dem MQTT Broker
//
// Besitzt alle Pins und den MQTT-Transport und treibt die Bridge-Loop
// aus bridge-core. Kehrt nur bei erschöpftem Reconnect-Budget zurück,
// dann startet der Chip neu.

use bridge_core::discovery::{
    self, DeviceInfo, DiscoveryOverflow, DiscoveryPayload, DiscoveryTopic, actuator_component,
};
use bridge_core::{
    ActuatorId, ActuatorSpec, Bridge, BridgeError, Clock, EdgeAction, InputBinding, LinkState,
    MqttTransport, Network, Polarity, ReportSpec,
};
use defmt::{error, info};
use embassy_net::Stack;
use heapless::Vec;
use static_cell::ConstStaticCell;

use crate::config::*;
use crate::hal::{BuzzerOutput, EmbassyClock, EspInput, RelayOutput};
use crate::net::{RustMqttTransport, WifiLink};
use crate::BridgePins;

const RELAY_A: ActuatorSpec =
    ActuatorSpec::switch("relay_a", TOPIC_RELAY_A_SET, TOPIC_RELAY_A_STATE);
const RELAY_B: ActuatorSpec =
    ActuatorSpec::switch("relay_b", TOPIC_RELAY_B_SET, TOPIC_RELAY_B_STATE);
const PUMP: ActuatorSpec = ActuatorSpec::local_only("pump", TOPIC_PUMP_STATE);
const BUZZER: ActuatorSpec = ActuatorSpec::tone("buzzer", TOPIC_BUZZER_SET, TOPIC_BUZZER_STATE);

/// Taster melden Ereignisse, nicht retained
const fn button_report(topic: &'static str) -> ReportSpec {
    ReportSpec {
        retain: false,
        ..ReportSpec::levels(topic, "OFF", "ON")
    }
}

const DEVICE: DeviceInfo = DeviceInfo {
    id: DEVICE_ID,
    name: DEVICE_NAME,
    model: DEVICE_MODEL,
    manufacturer: DEVICE_MANUFACTURER,
    sw_version: env!("CARGO_PKG_VERSION"),
};

/// 4 Aktoren + 4 Eingänge
const DISCOVERY_DOCUMENTS: usize = 8;

type DiscoveryDocuments = Vec<(DiscoveryTopic, DiscoveryPayload), DISCOVERY_DOCUMENTS>;

static DISCOVERY: ConstStaticCell<DiscoveryDocuments> = ConstStaticCell::new(Vec::new());

/// Bridge Task
///
/// # Parameter
/// - `stack`: embassy-net Stack für WiFi-Link und Broker-Verbindung
/// - `pins`: alle Ein- und Ausgänge der Bridge
/// - `buzzer`: LEDC-Buzzer
#[embassy_executor::task]
pub async fn bridge_task(
    stack: &'static Stack<'static>,
    pins: BridgePins,
    buzzer: BuzzerOutput,
) {
    let BridgePins {
        button_a,
        button_b,
        button_c,
        soil,
        relay_a,
        relay_b,
        pump,
        mut status_led,
    } = pins;

    let mut hardware = Hardware {
        relay_a: RelayOutput::new(relay_a, RELAY_ACTIVE_HIGH),
        relay_b: RelayOutput::new(relay_b, RELAY_ACTIVE_HIGH),
        pump: RelayOutput::new(pump, RELAY_ACTIVE_HIGH),
        buzzer,
        button_a: EspInput::new(button_a),
        button_b: EspInput::new(button_b),
        button_c: EspInput::new(button_c),
        soil: EspInput::new(soil),
    };

    let mut bridge = Bridge::new(
        bridge_config(),
        WifiLink::new(stack),
        RustMqttTransport::new(stack, TOPIC_AVAILABILITY),
        EmbassyClock,
    );

    if let Err(e) = setup(&mut bridge, &mut hardware) {
        error!("Bridge: Setup failed: {}", e);
        return;
    }
    info!("Bridge: Started, {} ms tick", TICK_INTERVAL_MS);

    let reason = bridge
        .run(|_, state| {
            if state == LinkState::Connected {
                status_led.set_high();
            } else {
                status_led.set_low();
            }
        })
        .await;

    error!("Bridge: Giving up ({}), restarting...", reason);
    esp_hal::system::software_reset();
}

/// Treiber der Bridge, leben so lange wie der Task
struct Hardware {
    relay_a: RelayOutput,
    relay_b: RelayOutput,
    pump: RelayOutput,
    buzzer: BuzzerOutput,
    button_a: EspInput,
    button_b: EspInput,
    button_c: EspInput,
    soil: EspInput,
}

/// Registriert Aktoren, Eingänge und Discovery und setzt den Startzustand
fn setup<'a, N, T, C>(
    bridge: &mut Bridge<'a, N, T, C>,
    hardware: &'a mut Hardware,
) -> Result<(), BridgeError>
where
    N: Network,
    T: MqttTransport,
    C: Clock,
{
    let Hardware {
        relay_a,
        relay_b,
        pump,
        buzzer,
        button_a,
        button_b,
        button_c,
        soil,
    } = hardware;

    let bindings = Bindings {
        relay_a: bridge.add_actuator(RELAY_A, relay_a)?,
        relay_b: bridge.add_actuator(RELAY_B, relay_b)?,
        pump: bridge.add_actuator(PUMP, pump)?,
        buzzer: bridge.add_actuator(BUZZER, buzzer)?,
    };
    bridge.add_input(bindings.button_a(), button_a)?;
    bridge.add_input(bindings.button_b(), button_b)?;
    bridge.add_input(bindings.button_c(), button_c)?;
    bridge.add_input(bindings.soil(), soil)?;

    announce_discovery(bridge, &bindings)?;
    bridge.start()
}

/// Aktor-IDs für die Eingangs-Bindungen
struct Bindings {
    relay_a: ActuatorId,
    relay_b: ActuatorId,
    pump: ActuatorId,
    buzzer: ActuatorId,
}

impl Bindings {
    fn button_a(&self) -> InputBinding {
        InputBinding::new("button_a", Polarity::ActiveLow)
            .controls(self.relay_a, EdgeAction::ToggleOnRelease)
            .reports(button_report(TOPIC_BUTTON_A_STATE))
    }

    fn button_b(&self) -> InputBinding {
        InputBinding::new("button_b", Polarity::ActiveLow)
            .controls(self.relay_b, EdgeAction::ToggleOnPress)
            .reports(button_report(TOPIC_BUTTON_B_STATE))
    }

    fn button_c(&self) -> InputBinding {
        InputBinding::new("button_c", Polarity::ActiveLow)
            .controls(self.buzzer, EdgeAction::ToggleOnPress)
            .reports(button_report(TOPIC_BUTTON_C_STATE))
    }

    /// HIGH = trocken, dann läuft die Pumpe
    fn soil(&self) -> InputBinding {
        InputBinding::new("soil", Polarity::ActiveHigh)
            .controls(self.pump, EdgeAction::FollowLevel { on_when_active: true })
            .reports(ReportSpec::levels(TOPIC_SOIL_STATE, "1", "0"))
            .debounce(SOIL_DEBOUNCE_MS)
    }
}

/// Baut die Home Assistant Discovery-Dokumente und meldet sie an
fn announce_discovery<N, T, C>(
    bridge: &mut Bridge<'_, N, T, C>,
    bindings: &Bindings,
) -> Result<(), BridgeError>
where
    N: Network,
    T: MqttTransport,
    C: Clock,
{
    let documents = DISCOVERY.take();
    let availability = TOPIC_AVAILABILITY;

    for spec in [RELAY_A, RELAY_B, PUMP, BUZZER] {
        let topic = discovery::discovery_topic(actuator_component(&spec), DEVICE_ID, spec.name);
        let payload = discovery::actuator_config(&DEVICE, &spec, availability);
        push_document(documents, topic, payload)?;
    }

    let inputs = [
        (bindings.button_a(), None),
        (bindings.button_b(), None),
        (bindings.button_c(), None),
        (bindings.soil(), Some("moisture")),
    ];
    for (binding, device_class) in inputs {
        let Some(report) = binding.report else {
            continue;
        };
        let topic = discovery::discovery_topic("binary_sensor", DEVICE_ID, binding.name);
        let payload =
            discovery::input_config(&DEVICE, binding.name, &report, device_class, availability);
        push_document(documents, topic, payload)?;
    }

    let documents: &'static DiscoveryDocuments = documents;
    for (topic, payload) in documents.iter() {
        bridge.announce(topic.as_str(), payload.as_str())?;
    }
    info!("Bridge: {} discovery documents", documents.len());
    Ok(())
}

fn push_document(
    documents: &mut DiscoveryDocuments,
    topic: Result<DiscoveryTopic, DiscoveryOverflow>,
    payload: Result<DiscoveryPayload, DiscoveryOverflow>,
) -> Result<(), BridgeError> {
    let (Ok(topic), Ok(payload)) = (topic, payload) else {
        error!("Bridge: Discovery document does not fit its buffer");
        return Err(BridgeError::CapacityExceeded);
    };
    documents
        .push((topic, payload))
        .map_err(|_| BridgeError::CapacityExceeded)
}
