//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! Owns the encoder, stepper and status LED drivers and exposes them
//! through [`EncoderPort`], [`MotorPort`] and [`IndicatorPort`].  This is
//! the only module in the system that touches actual hardware.
//!
//! The ports are infallible, so driver errors stop here: they are logged
//! and the encoder reports its last good reading.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::i2c::I2c;
use embedded_hal::pwm::SetDutyCycle;
use log::warn;

use crate::app::ports::{EncoderPort, IndicatorPort, MagnetStatus, MotorPort};
use crate::control::tracker::StepDirection;
use crate::drivers::as5600::As5600;
use crate::drivers::status_led::StatusLed;
use crate::drivers::stepper::Stepper;
use crate::fsm::context::Indicator;

/// Concrete adapter that combines all vent hardware behind port traits.
pub struct HardwareAdapter<I2C, STEP, DIR, EN, D, R, G, B> {
    encoder: As5600<I2C>,
    motor: Stepper<STEP, DIR, EN, D>,
    led: StatusLed<R, G, B>,
    last_angle: u16,
    encoder_errors: u32,
}

impl<I2C, STEP, DIR, EN, D, R, G, B> HardwareAdapter<I2C, STEP, DIR, EN, D, R, G, B>
where
    I2C: I2c,
    STEP: OutputPin,
    DIR: OutputPin,
    EN: OutputPin,
    D: DelayNs,
    R: SetDutyCycle,
    G: SetDutyCycle,
    B: SetDutyCycle,
{
    pub fn new(encoder: As5600<I2C>, motor: Stepper<STEP, DIR, EN, D>, led: StatusLed<R, G, B>) -> Self {
        Self {
            encoder,
            motor,
            led,
            last_angle: 0,
            encoder_errors: 0,
        }
    }

    /// Failed encoder reads since startup.
    pub fn encoder_errors(&self) -> u32 {
        self.encoder_errors
    }
}

// ── EncoderPort implementation ────────────────────────────────

impl<I2C, STEP, DIR, EN, D, R, G, B> EncoderPort for HardwareAdapter<I2C, STEP, DIR, EN, D, R, G, B>
where
    I2C: I2c,
{
    fn read_raw_angle(&mut self) -> u16 {
        match self.encoder.read_raw_angle() {
            Ok(angle) => self.last_angle = angle,
            Err(e) => {
                self.encoder_errors = self.encoder_errors.wrapping_add(1);
                warn!("encoder read failed ({}), holding {}", e, self.last_angle);
            }
        }
        self.last_angle
    }

    fn magnet_status(&mut self) -> MagnetStatus {
        self.encoder.magnet_status().unwrap_or_else(|e| {
            warn!("encoder status read failed: {}", e);
            MagnetStatus::default()
        })
    }
}

// ── MotorPort implementation ──────────────────────────────────

impl<I2C, STEP, DIR, EN, D, R, G, B> MotorPort for HardwareAdapter<I2C, STEP, DIR, EN, D, R, G, B>
where
    STEP: OutputPin,
    DIR: OutputPin,
    EN: OutputPin,
    D: DelayNs,
{
    fn step(&mut self, direction: StepDirection, steps: u32) {
        if let Err(e) = self.motor.step(direction, steps) {
            warn!("stepper {:?} x{} failed: {}", direction, steps, e);
        }
    }

    fn release(&mut self) {
        if let Err(e) = self.motor.release() {
            warn!("stepper release failed: {}", e);
        }
    }
}

// ── IndicatorPort implementation ──────────────────────────────

impl<I2C, STEP, DIR, EN, D, R, G, B> IndicatorPort for HardwareAdapter<I2C, STEP, DIR, EN, D, R, G, B>
where
    R: SetDutyCycle,
    G: SetDutyCycle,
    B: SetDutyCycle,
{
    fn set_indicator(&mut self, indicator: Indicator) {
        let (r, g, b) = indicator.rgb();
        if let Err(e) = self.led.set_colour(r, g, b) {
            warn!("status LED update failed: {}", e);
        }
    }
}
