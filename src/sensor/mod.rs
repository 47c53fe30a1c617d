//! DistanceSensor - Ultrasonic Water-Level Measurement
//!
//! ## Responsibilities
//!
//! - Drive the HC-SR04 rangefinder (trigger pulse, echo timing)
//! - Convert pulse width to distance in centimeters
//! - Provide mock readings when hardware is disabled or unavailable
//!
//! The hardware path is compiled behind the `hardware` cargo feature; the
//! actual GPIO polling is blocking and runs on the blocking pool so the
//! monitoring task never stalls the runtime.

use crate::error::Result;
use rand::Rng;
use std::time::Duration;

/// Upper bound for each echo polling phase. A disconnected or out-of-range
/// sensor never raises the echo line; without this bound a read would hang.
pub const ECHO_TIMEOUT: Duration = Duration::from_millis(100);

/// Mock readings fall in this band (cm)
pub const MOCK_BAND_CM: (f64, f64) = (9.5, 20.5);

/// Ultrasonic distance sensor, or its mock stand-in
pub struct DistanceSensor {
    mode: Mode,
}

enum Mode {
    Mock,
    #[cfg(feature = "hardware")]
    Hardware(std::sync::Arc<std::sync::Mutex<hardware::UltrasonicRanger>>),
}

impl DistanceSensor {
    /// Create the sensor, resolving the mode once.
    ///
    /// Hardware is used only when `mock_mode` is off, the crate was built
    /// with the `hardware` feature, and the GPIO lines can be acquired;
    /// every other case deterministically falls back to mock readings.
    pub fn new(mock_mode: bool) -> Self {
        if mock_mode {
            tracing::info!("distance sensor running in mock mode");
            return Self { mode: Mode::Mock };
        }

        Self {
            mode: resolve_hardware_mode(),
        }
    }

    /// Whether readings come from the mock generator
    pub fn is_mock(&self) -> bool {
        matches!(self.mode, Mode::Mock)
    }

    /// Measure the distance to the water surface in centimeters.
    pub async fn measure_distance(&self) -> Result<f64> {
        match &self.mode {
            Mode::Mock => {
                let distance = rand::thread_rng().gen_range(MOCK_BAND_CM.0..=MOCK_BAND_CM.1);
                tracing::debug!(distance_cm = distance, "mock distance generated");
                Ok(distance)
            }
            #[cfg(feature = "hardware")]
            Mode::Hardware(ranger) => {
                use crate::error::Error;

                let ranger = ranger.clone();
                tokio::task::spawn_blocking(move || {
                    let mut ranger = ranger
                        .lock()
                        .map_err(|_| Error::Gpio("sensor mutex poisoned".to_string()))?;
                    ranger.read_distance_cm()
                })
                .await
                .map_err(|e| Error::SensorTask(e.to_string()))?
            }
        }
    }
}

#[cfg(feature = "hardware")]
fn resolve_hardware_mode() -> Mode {
    match hardware::UltrasonicRanger::new() {
        Ok(ranger) => {
            tracing::info!(
                trigger_pin = hardware::TRIGGER_PIN,
                echo_pin = hardware::ECHO_PIN,
                "ultrasonic sensor initialized"
            );
            Mode::Hardware(std::sync::Arc::new(std::sync::Mutex::new(ranger)))
        }
        Err(e) => {
            tracing::warn!(error = %e, "GPIO unavailable, falling back to mock readings");
            Mode::Mock
        }
    }
}

#[cfg(not(feature = "hardware"))]
fn resolve_hardware_mode() -> Mode {
    tracing::warn!("built without the hardware feature, using mock readings");
    Mode::Mock
}

#[cfg(feature = "hardware")]
mod hardware {
    use super::ECHO_TIMEOUT;
    use crate::error::{EchoPhase, Error, Result};
    use rppal::gpio::{Gpio, InputPin, OutputPin};
    use std::time::{Duration, Instant};

    /// BCM pin driving the HC-SR04 trigger line
    pub const TRIGGER_PIN: u8 = 23;
    /// BCM pin reading the HC-SR04 echo line
    pub const ECHO_PIN: u8 = 24;

    /// Settle time with the trigger held low before each measurement
    const SETTLE: Duration = Duration::from_millis(10);
    /// Width of the trigger pulse
    const TRIGGER_PULSE: Duration = Duration::from_micros(10);
    /// Speed of sound in cm/s; the echo covers the distance twice
    const SPEED_OF_SOUND_CM_S: f64 = 34_300.0;

    /// Owns the two GPIO lines for the process lifetime. Dropping the pins
    /// releases them, so no explicit deinitialization hook is needed.
    pub struct UltrasonicRanger {
        trigger: OutputPin,
        echo: InputPin,
    }

    impl UltrasonicRanger {
        pub fn new() -> Result<Self> {
            let gpio = Gpio::new().map_err(|e| Error::Gpio(e.to_string()))?;
            let mut trigger = gpio
                .get(TRIGGER_PIN)
                .map_err(|e| Error::Gpio(e.to_string()))?
                .into_output();
            let echo = gpio
                .get(ECHO_PIN)
                .map_err(|e| Error::Gpio(e.to_string()))?
                .into_input();

            // Known idle state before the first measurement
            trigger.set_low();

            Ok(Self { trigger, echo })
        }

        /// One trigger/echo cycle. The trigger line is low again before any
        /// polling starts, so it stays low on every exit path.
        pub fn read_distance_cm(&mut self) -> Result<f64> {
            self.trigger.set_low();
            std::thread::sleep(SETTLE);

            self.trigger.set_high();
            let pulse = Instant::now();
            while pulse.elapsed() < TRIGGER_PULSE {
                std::hint::spin_loop();
            }
            self.trigger.set_low();

            let wait_start = Instant::now();
            while self.echo.is_low() {
                if wait_start.elapsed() > ECHO_TIMEOUT {
                    return Err(Error::EchoTimeout(EchoPhase::Rising));
                }
            }

            let pulse_start = Instant::now();
            while self.echo.is_high() {
                if pulse_start.elapsed() > ECHO_TIMEOUT {
                    return Err(Error::EchoTimeout(EchoPhase::Falling));
                }
            }

            let elapsed = pulse_start.elapsed();
            Ok(elapsed.as_secs_f64() * SPEED_OF_SOUND_CM_S / 2.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_values_stay_in_band() {
        let sensor = DistanceSensor::new(true);
        assert!(sensor.is_mock());

        for _ in 0..200 {
            let distance = sensor.measure_distance().await.unwrap();
            assert!(
                (MOCK_BAND_CM.0..=MOCK_BAND_CM.1).contains(&distance),
                "mock reading {} outside band",
                distance
            );
        }
    }

    #[cfg(not(feature = "hardware"))]
    #[test]
    fn test_falls_back_to_mock_without_hardware() {
        let sensor = DistanceSensor::new(false);
        assert!(sensor.is_mock());
    }
}
