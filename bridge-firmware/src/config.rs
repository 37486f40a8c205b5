// Projekt-Konfiguration: Konstanten und Hardware-Zuordnungen

use bridge_core::{BackoffPolicy, BridgeConfig, TonePolicy};

// ============================================================================
// GPIO Zuordnung (ESP32-C6 DevKitC-1)
// ============================================================================
//
// Die Pins selbst werden in main.rs aus `Peripherals` entnommen
// (esp-hal verlangt die konkreten GPIOn-Typen). Hier nur zur Übersicht:
//
//   GPIO6   Taster A      (Pull-Up, schaltet Relais A beim Loslassen)
//   GPIO7   Taster B      (Pull-Up, schaltet Relais B beim Drücken)
//   GPIO10  Taster C      (Pull-Up, schaltet den Buzzer)
//   GPIO11  Bodenfeuchte  (digitaler Ausgang des Sensor-Moduls, HIGH = trocken)
//   GPIO19  Relais A
//   GPIO20  Relais B
//   GPIO18  Pumpen-Relais (folgt dem Bodenfeuchte-Sensor)
//   GPIO21  Buzzer        (passiv, Ton per LEDC-PWM)
//   GPIO23  Status-LED    (leuchtet solange die Broker-Session steht)

/// `false` für Relais-Module, die bei LOW anziehen
pub const RELAY_ACTIVE_HIGH: bool = true;

// ============================================================================
// Gerät & Topics
// ============================================================================

/// Geräte-ID für Topics und Home Assistant `unique_id`
pub const DEVICE_ID: &str = "esp_gpio_bridge";

pub const DEVICE_NAME: &str = "GPIO Bridge";
pub const DEVICE_MODEL: &str = "ESP32-C6";
pub const DEVICE_MANUFACTURER: &str = "Espressif";

/// Retained online/offline, zugleich Last Will
pub const TOPIC_AVAILABILITY: &str = "esp_gpio_bridge/status";

pub const TOPIC_RELAY_A_SET: &str = "esp_gpio_bridge/relay_a/set";
pub const TOPIC_RELAY_A_STATE: &str = "esp_gpio_bridge/relay_a/state";
pub const TOPIC_RELAY_B_SET: &str = "esp_gpio_bridge/relay_b/set";
pub const TOPIC_RELAY_B_STATE: &str = "esp_gpio_bridge/relay_b/state";
pub const TOPIC_PUMP_STATE: &str = "esp_gpio_bridge/pump/state";
pub const TOPIC_BUZZER_SET: &str = "esp_gpio_bridge/buzzer/set";
pub const TOPIC_BUZZER_STATE: &str = "esp_gpio_bridge/buzzer/state";

pub const TOPIC_BUTTON_A_STATE: &str = "esp_gpio_bridge/button_a/state";
pub const TOPIC_BUTTON_B_STATE: &str = "esp_gpio_bridge/button_b/state";
pub const TOPIC_BUTTON_C_STATE: &str = "esp_gpio_bridge/button_c/state";
pub const TOPIC_SOIL_STATE: &str = "esp_gpio_bridge/soil/state";

// ============================================================================
// Bridge-Verhalten
// ============================================================================

/// Tick-Intervall der Bridge-Loop
pub const TICK_INTERVAL_MS: u64 = 50;

/// Entprellzeit für Taster
pub const BUTTON_DEBOUNCE_MS: u64 = 200;

/// Der Sensor kippt langsam, längere Entprellung gegen Flattern an der Schwelle
pub const SOIL_DEBOUNCE_MS: u64 = 2_000;

/// Kompletter Zustand alle 5 Minuten
pub const HEARTBEAT_TICKS: u32 = 6_000;

/// Töne bis 500 ms werden im Tick gehalten, längere per Deadline beendet
pub const TONE_BLOCKING_HOLD_MAX_MS: u64 = 500;

/// Standard-Ton; der LEDC-Timer startet ebenfalls mit dieser Frequenz
pub const BUZZER_FREQUENCY_HZ: u32 = 1_000;

/// Nach so vielen Fehlversuchen in Folge: Neustart
pub const MAX_CONNECT_FAILURES: u32 = 20;

pub fn bridge_config() -> BridgeConfig {
    BridgeConfig {
        tick_interval_ms: TICK_INTERVAL_MS,
        heartbeat_ticks: HEARTBEAT_TICKS,
        debounce_ms: BUTTON_DEBOUNCE_MS,
        backoff: BackoffPolicy {
            max_failures: Some(MAX_CONNECT_FAILURES),
            ..BackoffPolicy::default()
        },
        tone: TonePolicy {
            blocking_hold_max_ms: TONE_BLOCKING_HOLD_MAX_MS,
            default_frequency_hz: BUZZER_FREQUENCY_HZ,
            ..TonePolicy::default()
        },
        ..BridgeConfig::new(TOPIC_AVAILABILITY)
    }
}

// ============================================================================
// WiFi Konfiguration
// ============================================================================

/// WiFi SSID (Netzwerk-Name)
/// Wird zur Build-Zeit aus der Environment Variable WIFI_SSID geladen
/// Setze diese in .env file (siehe .env.example)
pub const WIFI_SSID: &str = env!(
    "WIFI_SSID",
    "WiFi SSID nicht gesetzt! Erstelle .env file (siehe .env.example)"
);

/// WiFi Passwort
pub const WIFI_PASSWORD: &str = env!(
    "WIFI_PASSWORD",
    "WiFi Password nicht gesetzt! Erstelle .env file (siehe .env.example)"
);

/// So lange wartet ein Verbindungsversuch auf Link + DHCP
pub const WIFI_JOIN_TIMEOUT_SECS: u64 = 20;

/// Heap-Größe für WiFi (Bytes)
/// WiFi benötigt dynamischen Speicher für Pakete
pub const WIFI_HEAP_SIZE: usize = 65536; // 64 KB

/// Zusätzliche Heap-Größe (Bytes)
pub const EXTRA_HEAP_SIZE: usize = 36864; // 36 KB

// ============================================================================
// MQTT Konfiguration
// ============================================================================

/// MQTT Broker Hostname oder IP-Adresse
pub const MQTT_BROKER: &str = env!(
    "MQTT_BROKER",
    "MQTT Broker nicht gesetzt! Erstelle .env file (siehe .env.example)"
);

/// MQTT Broker Port
/// Standard: 1883 (unverschlüsselt). Kann in .env überschrieben werden
pub const MQTT_PORT: u16 = parse_port(option_env!("MQTT_PORT"), 1883);

/// MQTT Client ID
pub const MQTT_CLIENT_ID: &str = env!(
    "MQTT_CLIENT_ID",
    "MQTT Client ID nicht gesetzt! Erstelle .env file (siehe .env.example)"
);

/// Optionale Broker-Zugangsdaten (leer = anonym)
pub const MQTT_USERNAME: Option<&str> = non_empty(option_env!("MQTT_USERNAME"));
pub const MQTT_PASSWORD: Option<&str> = non_empty(option_env!("MQTT_PASSWORD"));

/// Keep-Alive in Sekunden, PINGREQ nach der Hälfte
pub const MQTT_KEEP_ALIVE_SECS: u16 = 30;

/// MQTT Buffer-Größe in Bytes
/// Muss das größte Discovery-Dokument fassen
pub const MQTT_BUFFER_SIZE: usize = 1024;

/// TCP RX/TX Buffer für die Broker-Verbindung
pub const TCP_BUFFER_SIZE: usize = 2048;

/// Socket-Timeout (Connect, Lesen, Schreiben)
pub const MQTT_SOCKET_TIMEOUT_SECS: u64 = 10;

/// Obergrenze für das Lesen eines bereits angekündigten Pakets
pub const MQTT_RECEIVE_TIMEOUT_MS: u64 = 500;

/// DNS Query Timeout in Sekunden
pub const DNS_TIMEOUT_SECS: u64 = 10;

/// Dezimal-Port aus der Build-Umgebung, sonst `default`
const fn parse_port(value: Option<&str>, default: u16) -> u16 {
    let bytes = match value {
        Some(value) => value.as_bytes(),
        None => return default,
    };
    if bytes.is_empty() {
        return default;
    }
    let mut port: u32 = 0;
    let mut i = 0;
    while i < bytes.len() {
        let digit = bytes[i];
        if !digit.is_ascii_digit() {
            panic!("MQTT_PORT ist keine Zahl");
        }
        port = port * 10 + (digit - b'0') as u32;
        if port > u16::MAX as u32 {
            panic!("MQTT_PORT zu groß");
        }
        i += 1;
    }
    port as u16
}

const fn non_empty(value: Option<&'static str>) -> Option<&'static str> {
    match value {
        Some(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}
