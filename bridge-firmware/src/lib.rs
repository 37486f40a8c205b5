// Library-Root: Hardware-Anbindung der GPIO ⇄ MQTT Bridge
// Keine Standard-Bibliothek (Embedded System)
#![no_std]

// Module
pub mod config;
pub mod hal;
pub mod net;
pub mod tasks;

use esp_hal::gpio::{Input, Output};

/// Alle GPIOs, die der bridge_task besitzt
///
/// Wird in main.rs aus den Peripherals gebaut, damit die Pin-Zuordnung
/// an einer Stelle bleibt.
pub struct BridgePins {
    pub button_a: Input<'static>,
    pub button_b: Input<'static>,
    pub button_c: Input<'static>,
    pub soil: Input<'static>,
    pub relay_a: Output<'static>,
    pub relay_b: Output<'static>,
    pub pump: Output<'static>,
    pub status_led: Output<'static>,
}
