// Buzzer über LEDC (Hardware-PWM)
//
// Ein Low-Speed Timer liefert die Frequenz, ein Kanal auf dem Buzzer-Pin
// die Duty. Der Kanal bleibt dauerhaft an den Timer gebunden; ein neuer
// Ton stellt nur den Timer um.

use bridge_core::{Drive, OutputDriver, OutputError};
use defmt::{Debug2Format, warn};
use esp_hal::gpio::DriveMode;
use esp_hal::ledc::channel::{self, ChannelHW, ChannelIFace};
use esp_hal::ledc::timer::{self, TimerIFace};
use esp_hal::ledc::{Ledc, LowSpeed};
use esp_hal::peripherals::GPIO21;
use esp_hal::time::Rate;

/// Hardware-Timer des Buzzers
pub const BUZZER_TIMER: timer::Number = timer::Number::Timer0;

/// 10 Bit reichen bei APB-Takt von ca. 80 Hz bis 78 kHz
const DUTY_RESOLUTION: timer::config::Duty = timer::config::Duty::Duty10Bit;
const DUTY_BITS: u32 = 10;

/// Timer-Konfiguration für eine Ton-Frequenz
pub fn timer_config(frequency_hz: u32) -> timer::config::Config {
    timer::config::Config {
        duty: DUTY_RESOLUTION,
        clock_source: timer::LSClockSource::APBClk,
        frequency: Rate::from_hz(frequency_hz),
    }
}

/// 16-Bit Duty auf die Timer-Auflösung
fn duty_raw(duty: u16) -> u32 {
    u32::from(duty) >> (16 - DUTY_BITS)
}

/// Passiver Buzzer an einem LEDC-Kanal
pub struct BuzzerOutput {
    ledc: &'static Ledc<'static>,
    channel: channel::Channel<'static, LowSpeed>,
    frequency_hz: u32,
}

impl BuzzerOutput {
    /// `timer` muss bereits mit `timer_config(frequency_hz)` konfiguriert sein
    pub fn new(
        ledc: &'static Ledc<'static>,
        timer: &'static timer::Timer<'static, LowSpeed>,
        frequency_hz: u32,
        pin: GPIO21<'static>,
    ) -> Result<Self, channel::Error> {
        let mut channel = ledc.channel(channel::Number::Channel0, pin);
        channel.configure(channel::config::Config {
            timer,
            duty_pct: 0,
            drive_mode: DriveMode::PushPull,
        })?;
        Ok(Self {
            ledc,
            channel,
            frequency_hz,
        })
    }

    /// Stellt den Hardware-Timer auf eine neue Frequenz um
    ///
    /// Zweiter Handle auf denselben Timer; die Duty-Auflösung bleibt gleich,
    /// daher stimmt die Duty-Berechnung des Kanals weiterhin.
    fn retune(&mut self, frequency_hz: u32) -> Result<(), OutputError> {
        if frequency_hz == self.frequency_hz {
            return Ok(());
        }
        let mut timer = self.ledc.timer::<LowSpeed>(BUZZER_TIMER);
        timer.configure(timer_config(frequency_hz)).map_err(|e| {
            warn!("Buzzer: {} Hz not possible: {}", frequency_hz, Debug2Format(&e));
            OutputError::WriteFailed
        })?;
        self.frequency_hz = frequency_hz;
        Ok(())
    }
}

impl OutputDriver for BuzzerOutput {
    fn drive(&mut self, drive: Drive) -> Result<(), OutputError> {
        match drive {
            Drive::Off => self.channel.set_duty_hw(0),
            // Passiver Buzzer braucht ein Rechteck: halbe Duty auf aktueller Frequenz
            Drive::On => self.channel.set_duty_hw(duty_raw(u16::MAX / 2)),
            Drive::Tone { frequency_hz, duty } => {
                // Erst stumm, damit ein fehlgeschlagenes Umstellen nicht weiterpiept
                self.channel.set_duty_hw(0);
                self.retune(frequency_hz)?;
                self.channel.set_duty_hw(duty_raw(duty));
            }
        }
        Ok(())
    }
}
