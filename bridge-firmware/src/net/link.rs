// WiFi-Anbindung als `Network` für die Bridge
//
// Join und Reconnect erledigt `connection_task`, hier wird nur auf
// Link + DHCP-Adresse gewartet.

use bridge_core::{Network, TransportError};
use defmt::{info, warn};
use embassy_net::Stack;
use embassy_time::{Duration, Timer, with_timeout};

use crate::config::WIFI_JOIN_TIMEOUT_SECS;

pub struct WifiLink {
    stack: &'static Stack<'static>,
}

impl WifiLink {
    pub fn new(stack: &'static Stack<'static>) -> Self {
        Self { stack }
    }
}

impl Network for WifiLink {
    async fn connect(&mut self) -> Result<(), TransportError> {
        if self.is_connected() {
            return Ok(());
        }
        info!("WiFi: Waiting for link and IP address...");
        match with_timeout(
            Duration::from_secs(WIFI_JOIN_TIMEOUT_SECS),
            wait_for_network(self.stack),
        )
        .await
        {
            Ok(()) => Ok(()),
            Err(_) => {
                warn!(
                    "WiFi: No network after {}s",
                    WIFI_JOIN_TIMEOUT_SECS
                );
                Err(TransportError::NetworkUnavailable)
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.stack.is_link_up() && self.stack.config_v4().is_some()
    }
}

/// Wartet bis Netzwerk-Verbindung verfügbar ist
///
/// Prüft kontinuierlich Link-Status und DHCP-Konfiguration.
async fn wait_for_network(stack: &'static Stack<'static>) {
    loop {
        if stack.is_link_up() && stack.config_v4().is_some() {
            break;
        }
        Timer::after(Duration::from_millis(500)).await;
    }
}
