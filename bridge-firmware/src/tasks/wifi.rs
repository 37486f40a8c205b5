// WiFi Tasks - Verbindet mit WLAN und hält den Netzwerk-Stack am Laufen
use defmt::{Debug2Format, error, info, warn};
use embassy_net::{Runner, Stack};
use embassy_time::{Duration, Timer};
use esp_radio::wifi::{ClientConfig, ModeConfig, WifiController, WifiDevice, WifiEvent};

use crate::config::{WIFI_PASSWORD, WIFI_SSID};

/// Wartezeit nach einem fehlgeschlagenen Start oder Join
const RETRY_DELAY_SECS: u64 = 5;

/// WiFi Connection Task
///
/// Hält die Station mit dem Access Point verbunden. Ob die Bridge die
/// Verbindung nutzen kann, entscheidet `WifiLink` anhand von Link + DHCP.
#[embassy_executor::task]
pub async fn connection_task(
    mut controller: WifiController<'static>,
    stack: &'static Stack<'static>,
) {
    info!("WiFi: Starting connection task");

    loop {
        if matches!(controller.is_started(), Ok(false)) {
            let client_config = ModeConfig::Client(
                ClientConfig::default()
                    .with_ssid(WIFI_SSID.into())
                    .with_password(WIFI_PASSWORD.into()),
            );

            if let Err(e) = controller.set_config(&client_config) {
                error!("WiFi: Failed to set configuration: {}", Debug2Format(&e));
                Timer::after(Duration::from_secs(RETRY_DELAY_SECS)).await;
                continue;
            }

            if let Err(e) = controller.start_async().await {
                error!("WiFi: Failed to start: {}", Debug2Format(&e));
                Timer::after(Duration::from_secs(RETRY_DELAY_SECS)).await;
                continue;
            }

            info!("WiFi: Started");
        }

        info!("WiFi: Connecting to '{}'...", WIFI_SSID);
        if let Err(e) = controller.connect_async().await {
            warn!("WiFi: Connection failed: {}", Debug2Format(&e));
            Timer::after(Duration::from_secs(RETRY_DELAY_SECS)).await;
            continue;
        }
        info!("WiFi: Associated");

        log_address(stack).await;

        controller.wait_for_event(WifiEvent::StaDisconnected).await;
        warn!("WiFi: Disconnected from AP, will retry...");

        Timer::after(Duration::from_secs(2)).await;
    }
}

/// Network Task
///
/// Prozessiert Netzwerk-Pakete des TCP/IP Stacks
#[embassy_executor::task]
pub async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) -> ! {
    runner.run().await
}

/// Loggt die Adresse sobald DHCP fertig ist
async fn log_address(stack: &'static Stack<'static>) {
    for _ in 0..40 {
        if let Some(config) = stack.config_v4() {
            info!("WiFi: Got IP address!");
            info!("  IP:      {}", Debug2Format(&config.address.address()));
            info!("  Gateway: {}", Debug2Format(&config.gateway));
            return;
        }
        Timer::after(Duration::from_millis(500)).await;
    }
    warn!("WiFi: No DHCP lease after 20s");
}
