// Hardware Abstraction Layer (HAL) Module
//
// Implementiert die Hardware-Traits aus bridge-core für den ESP32-C6.
// Die Logik selbst wird in bridge-tests gegen Mocks getestet.

pub mod buzzer;
pub mod clock;
pub mod gpio;

pub use clock::EmbassyClock;
pub use buzzer::BuzzerOutput;
pub use gpio::{EspInput, RelayOutput};
