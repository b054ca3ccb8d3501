//! RGB status LED driver.
//!
//! Three PWM channels drive discrete R/G/B LEDs (or a common-cathode RGB
//! LED).  Generic over `embedded-hal` `SetDutyCycle`, so LEDC channels on
//! the device and plain mocks on the host both work.

use embedded_hal::pwm::SetDutyCycle;

use crate::error::DriverError;

pub struct StatusLed<R, G, B> {
    red: R,
    green: G,
    blue: B,
    current: (u8, u8, u8),
}

impl<R: SetDutyCycle, G: SetDutyCycle, B: SetDutyCycle> StatusLed<R, G, B> {
    pub fn new(red: R, green: G, blue: B) -> Self {
        Self {
            red,
            green,
            blue,
            current: (0, 0, 0),
        }
    }

    pub fn set_colour(&mut self, r: u8, g: u8, b: u8) -> Result<(), DriverError> {
        self.red
            .set_duty_cycle_fraction(u16::from(r), 255)
            .map_err(|_| DriverError::Pwm)?;
        self.green
            .set_duty_cycle_fraction(u16::from(g), 255)
            .map_err(|_| DriverError::Pwm)?;
        self.blue
            .set_duty_cycle_fraction(u16::from(b), 255)
            .map_err(|_| DriverError::Pwm)?;
        self.current = (r, g, b);
        Ok(())
    }

    pub fn off(&mut self) -> Result<(), DriverError> {
        self.set_colour(0, 0, 0)
    }

    pub fn current_colour(&self) -> (u8, u8, u8) {
        self.current
    }
}
