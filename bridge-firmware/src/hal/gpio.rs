// GPIO-Adapter für die Bridge-Traits
//
// Verbindet esp-hal `Input`/`Output` mit `InputPin`/`OutputDriver`
// aus bridge-core. Der Buzzer liegt in buzzer.rs (LEDC).

use bridge_core::{Drive, InputPin, OutputDriver, OutputError};
use esp_hal::gpio::{Input, Output};

/// Taster oder digitaler Sensor-Ausgang
pub struct EspInput {
    pin: Input<'static>,
}

impl EspInput {
    pub fn new(pin: Input<'static>) -> Self {
        Self { pin }
    }
}

impl InputPin for EspInput {
    fn read(&mut self) -> bool {
        self.pin.is_high()
    }
}

/// Relais bzw. einfacher Schaltausgang
///
/// `Drive::Tone` wird wie `Drive::On` behandelt.
pub struct RelayOutput {
    pin: Output<'static>,
    active_high: bool,
}

impl RelayOutput {
    pub fn new(pin: Output<'static>, active_high: bool) -> Self {
        Self { pin, active_high }
    }
}

impl OutputDriver for RelayOutput {
    fn drive(&mut self, drive: Drive) -> Result<(), OutputError> {
        if drive.is_on() == self.active_high {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
        Ok(())
    }
}
