// Uhr für die Bridge-Loop auf Basis von embassy-time

use bridge_core::{Clock, Millis};
use embassy_time::{Instant, Timer};

/// Monotone Zeit seit Boot
pub struct EmbassyClock;

impl Clock for EmbassyClock {
    fn now_ms(&self) -> Millis {
        Instant::now().as_millis()
    }

    async fn delay_ms(&mut self, ms: Millis) {
        Timer::after_millis(ms).await;
    }
}
