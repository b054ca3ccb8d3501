//! Step/direction stepper driver (A4988 / DRV8825 / TMC2208 class).
//!
//! Three GPIOs: STEP (rising edge = one step), DIR, and an active-low
//! ENABLE that de-energises the coils when released.  Pulse timing comes
//! from an injected `DelayNs`, so moves block for
//! `steps * step_period_us` microseconds.
//!
//! ## Dual-target design
//!
//! Generic over `embedded-hal` 1.0 pins: `esp-idf-hal` `PinDriver`s on the
//! device, recording mocks on the host.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::control::tracker::StepDirection;
use crate::error::DriverError;

pub struct Stepper<STEP, DIR, EN, D> {
    step: STEP,
    dir: DIR,
    enable: EN,
    delay: D,
    half_period_us: u32,
    /// Swap DIR polarity for motors wired the other way round.
    invert_direction: bool,
    energised: bool,
}

impl<STEP, DIR, EN, D> Stepper<STEP, DIR, EN, D>
where
    STEP: OutputPin,
    DIR: OutputPin,
    EN: OutputPin,
    D: DelayNs,
{
    pub fn new(step: STEP, dir: DIR, enable: EN, delay: D, step_period_us: u32) -> Self {
        Self {
            step,
            dir,
            enable,
            delay,
            half_period_us: (step_period_us / 2).max(1),
            invert_direction: false,
            energised: false,
        }
    }

    pub fn with_inverted_direction(mut self, invert: bool) -> Self {
        self.invert_direction = invert;
        self
    }

    /// Issue `steps` pulses in `direction`, energising the coils first.
    pub fn step(&mut self, direction: StepDirection, steps: u32) -> Result<(), DriverError> {
        if steps == 0 {
            return Ok(());
        }
        if !self.energised {
            self.enable.set_low().map_err(|_| DriverError::Gpio)?;
            self.energised = true;
        }
        let high = matches!(direction, StepDirection::Backward) != self.invert_direction;
        if high {
            self.dir.set_high().map_err(|_| DriverError::Gpio)?;
        } else {
            self.dir.set_low().map_err(|_| DriverError::Gpio)?;
        }
        for _ in 0..steps {
            self.step.set_high().map_err(|_| DriverError::Gpio)?;
            self.delay.delay_us(self.half_period_us);
            self.step.set_low().map_err(|_| DriverError::Gpio)?;
            self.delay.delay_us(self.half_period_us);
        }
        Ok(())
    }

    /// De-energise the coils.
    pub fn release(&mut self) -> Result<(), DriverError> {
        self.enable.set_high().map_err(|_| DriverError::Gpio)?;
        self.energised = false;
        Ok(())
    }

    pub fn is_energised(&self) -> bool {
        self.energised
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use embedded_hal::digital::ErrorType;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct Pin(Rc<RefCell<Vec<bool>>>);

    impl Pin {
        fn rising_edges(&self) -> usize {
            self.0.borrow().iter().filter(|level| **level).count()
        }

        fn level(&self) -> Option<bool> {
            self.0.borrow().last().copied()
        }
    }

    impl ErrorType for Pin {
        type Error = Infallible;
    }

    impl OutputPin for Pin {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.0.borrow_mut().push(false);
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.0.borrow_mut().push(true);
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct Delay(Rc<RefCell<u64>>);

    impl DelayNs for Delay {
        fn delay_ns(&mut self, ns: u32) {
            *self.0.borrow_mut() += u64::from(ns);
        }
    }

    fn rig() -> (Pin, Pin, Pin, Delay, Stepper<Pin, Pin, Pin, Delay>) {
        let (s, d, e, delay) = (Pin::default(), Pin::default(), Pin::default(), Delay::default());
        let stepper = Stepper::new(s.clone(), d.clone(), e.clone(), delay.clone(), 2000);
        (s, d, e, delay, stepper)
    }

    #[test]
    fn one_pulse_per_step() {
        let (step, _, _, delay, mut m) = rig();
        m.step(StepDirection::Forward, 25).unwrap();
        assert_eq!(step.rising_edges(), 25);
        assert_eq!(*delay.0.borrow(), 25 * 2_000_000);
    }

    #[test]
    fn backward_drives_dir_high() {
        let (_, dir, _, _, mut m) = rig();
        m.step(StepDirection::Backward, 1).unwrap();
        assert_eq!(dir.level(), Some(true));
        m.step(StepDirection::Forward, 1).unwrap();
        assert_eq!(dir.level(), Some(false));
    }

    #[test]
    fn inverted_direction_flips_dir() {
        let (s, d, e, delay) = (Pin::default(), Pin::default(), Pin::default(), Delay::default());
        let mut m = Stepper::new(s, d.clone(), e, delay, 2000).with_inverted_direction(true);
        m.step(StepDirection::Backward, 1).unwrap();
        assert_eq!(d.level(), Some(false));
    }

    #[test]
    fn enable_is_active_low() {
        let (_, _, en, _, mut m) = rig();
        m.step(StepDirection::Forward, 3).unwrap();
        assert_eq!(en.level(), Some(false));
        assert!(m.is_energised());
        m.release().unwrap();
        assert_eq!(en.level(), Some(true));
        assert!(!m.is_energised());
    }

    #[test]
    fn zero_steps_leaves_coils_alone() {
        let (step, _, en, _, mut m) = rig();
        m.step(StepDirection::Forward, 0).unwrap();
        assert_eq!(step.rising_edges(), 0);
        assert_eq!(en.level(), None);
    }
}
