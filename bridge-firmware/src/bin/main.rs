// Keine Standard-Bibliothek verwenden (Embedded System)
#![no_std]
// Kein normaler main() Einstiegspunkt (wird von esp_rtos bereitgestellt)
#![no_main]
// Verbiete mem::forget - gefährlich bei ESP HAL Types mit DMA-Buffern
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
// Verbiete große Stack-Frames (Stack ist auf Embedded Systemen begrenzt)
#![deny(clippy::large_stack_frames)]

// Heap Allocator (WiFi benötigt dynamischen Speicher)
extern crate alloc;

// Embassy Async Runtime
use embassy_executor::Spawner;
use embassy_net::{Config as NetConfig, Stack, StackResources};
use embassy_time::{Duration, Timer};

// ESP32-C6 HAL
use esp_hal::clock::CpuClock;
use esp_hal::gpio::{Input, InputConfig, Level, Output, OutputConfig, Pull};
use esp_hal::ledc::timer::{Timer as LedcTimer, TimerIFace};
use esp_hal::ledc::{LSGlobalClkSource, Ledc, LowSpeed};
use esp_hal::rng::Rng;
use esp_hal::timer::timg::TimerGroup;

// Backtrace bei Panic und println!() Support
use {esp_backtrace as _, esp_println as _};

// Projekt-Module und Konfiguration
use esp_gpio_bridge::BridgePins;
use esp_gpio_bridge::config::{BUZZER_FREQUENCY_HZ, EXTRA_HEAP_SIZE, WIFI_HEAP_SIZE};
use esp_gpio_bridge::hal::BuzzerOutput;
use esp_gpio_bridge::hal::buzzer::{BUZZER_TIMER, timer_config};
use esp_gpio_bridge::tasks::{bridge_task, connection_task, net_task};

// ESP-IDF App Descriptor - erforderlich für den Bootloader!
// Ohne diesen schlägt das Flashen mit "ESP-IDF App Descriptor missing" fehl
esp_bootloader_esp_idf::esp_app_desc!();

/// Main Entry Point
///
/// Initialisiert Hardware, WiFi, startet Embassy Runtime und spawnt Tasks.
/// Danach schläft main() - alle Arbeit läuft in Tasks.
#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    // ESP32-C6 Konfiguration: CPU auf maximale Taktfrequenz (160 MHz)
    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    // Heap Allocator initialisieren (WiFi braucht dynamischen Speicher!)
    // Zwei Bereiche: reclaimed RAM (64 KB) + extra (36 KB) = 100 KB total
    esp_alloc::heap_allocator!(
        #[esp_hal::ram(reclaimed)]
        size: WIFI_HEAP_SIZE
    );
    esp_alloc::heap_allocator!(size: EXTRA_HEAP_SIZE);

    // Embassy Runtime initialisieren (Timer + Software Interrupt)
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    let sw_interrupt =
        esp_hal::interrupt::software::SoftwareInterruptControl::new(peripherals.SW_INTERRUPT);
    esp_rtos::start(timg0.timer0, sw_interrupt.software_interrupt0);

    // GPIOs: Taster mit Pull-Up, Ausgänge starten LOW
    // Zuordnung siehe config.rs
    let button = InputConfig::default().with_pull(Pull::Up);
    let pins = BridgePins {
        button_a: Input::new(peripherals.GPIO6, button),
        button_b: Input::new(peripherals.GPIO7, button),
        button_c: Input::new(peripherals.GPIO10, button),
        soil: Input::new(peripherals.GPIO11, InputConfig::default()),
        relay_a: Output::new(peripherals.GPIO19, Level::Low, OutputConfig::default()),
        relay_b: Output::new(peripherals.GPIO20, Level::Low, OutputConfig::default()),
        pump: Output::new(peripherals.GPIO18, Level::Low, OutputConfig::default()),
        status_led: Output::new(peripherals.GPIO23, Level::Low, OutputConfig::default()),
    };

    // Buzzer: LEDC Low-Speed Timer + Kanal (Hardware-PWM)
    let mut ledc = Ledc::new(peripherals.LEDC);
    ledc.set_global_slow_clock(LSGlobalClkSource::APBClk);
    static LEDC: static_cell::StaticCell<Ledc<'static>> = static_cell::StaticCell::new();
    let ledc = &*LEDC.init(ledc);

    let mut buzzer_timer = ledc.timer::<LowSpeed>(BUZZER_TIMER);
    buzzer_timer
        .configure(timer_config(BUZZER_FREQUENCY_HZ))
        .expect("Failed to configure buzzer timer");
    static BUZZER_TIMER_CELL: static_cell::StaticCell<LedcTimer<'static, LowSpeed>> =
        static_cell::StaticCell::new();
    let buzzer_timer = &*BUZZER_TIMER_CELL.init(buzzer_timer);

    let buzzer = BuzzerOutput::new(ledc, buzzer_timer, BUZZER_FREQUENCY_HZ, peripherals.GPIO21)
        .expect("Failed to configure buzzer channel");

    // WiFi Hardware initialisieren
    static RADIO_INIT: static_cell::StaticCell<esp_radio::Controller> =
        static_cell::StaticCell::new();
    let radio_init =
        RADIO_INIT.init(esp_radio::init().expect("Failed to initialize Wi-Fi/BLE controller"));

    let (wifi_controller, wifi_interface) =
        esp_radio::wifi::new(radio_init, peripherals.WIFI, Default::default())
            .expect("Failed to initialize Wi-Fi");

    // Random seed für TCP/IP Stack (von Hardware RNG)
    let rng = Rng::new();
    let seed = (rng.random() as u64) << 32 | rng.random() as u64;

    // Sockets: MQTT (1) + DNS (1) + DHCP (1)
    static RESOURCES: static_cell::StaticCell<StackResources<3>> = static_cell::StaticCell::new();
    let resources = RESOURCES.init(StackResources::new());

    // embassy-net erstellt Stack + Runner (nutzt STA interface für Client-Modus)
    let (stack, runner) = embassy_net::new(
        wifi_interface.sta,
        NetConfig::dhcpv4(Default::default()),
        resources,
        seed,
    );

    // Stack muss 'static sein für Tasks
    static STACK: static_cell::StaticCell<Stack<'static>> = static_cell::StaticCell::new();
    let stack = &*STACK.init(stack);

    // Spawn WiFi Tasks
    spawner
        .spawn(connection_task(wifi_controller, stack))
        .unwrap();
    spawner.spawn(net_task(runner)).unwrap();

    // Spawn Bridge
    spawner.spawn(bridge_task(stack, pins, buzzer)).unwrap();

    // Main-Loop: schläft (alle Arbeit läuft in Tasks)
    loop {
        Timer::after(Duration::from_secs(3600)).await;
    }
}
