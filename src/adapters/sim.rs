//! Simulated vent mechanism and clock.
//!
//! Stands in for the AS5600 + stepper when no hardware is attached (host
//! runs, tests).  The shaft angle is tracked on the unwrapped encoder axis
//! between two hard end stops at the calibrated open/closed positions:
//!
//! * one motor step moves `4096 / steps_per_revolution` counts
//! * `Backward` steps close (angle up), `Forward` steps open (angle down)
//! * releasing the coils lets the shaft spring back by a small backlash
//!
//! Handles are cheap clones sharing one mechanism, so a test can keep one
//! handle to play "the human at the stove" while the service owns another.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::app::ports::{Clock, EncoderPort, IndicatorPort, MagnetStatus, MotorPort};
use crate::config::{Calibration, ENCODER_COUNTS};
use crate::control::tracker::StepDirection;
use crate::fsm::context::Indicator;

/// 0.2° of spring-back on release.
const DEFAULT_BACKLASH_COUNTS: f64 = 0.2 / 360.0 * ENCODER_COUNTS as f64;

#[derive(Debug)]
struct Mechanism {
    angle: f64,
    open_stop: f64,
    closed_stop: f64,
    counts_per_step: f64,
    backlash: f64,
    last_direction: StepDirection,
    steps_forward: u64,
    steps_backward: u64,
    releases: u32,
    indicator: Indicator,
    magnet: MagnetStatus,
}

impl Mechanism {
    fn clamp(&mut self) {
        self.angle = self.angle.clamp(self.open_stop, self.closed_stop);
    }
}

/// Simulated vent: implements every hardware port.
#[derive(Debug, Clone)]
pub struct SimulatedVent {
    inner: Rc<RefCell<Mechanism>>,
}

impl SimulatedVent {
    /// A vent resting at the open stop.
    pub fn new(calibration: Calibration, steps_per_revolution: u32) -> Self {
        let open_stop = f64::from(calibration.open_raw_angle);
        Self {
            inner: Rc::new(RefCell::new(Mechanism {
                angle: open_stop,
                open_stop,
                closed_stop: calibration.closed_absolute_angle() as f64,
                counts_per_step: f64::from(ENCODER_COUNTS) / f64::from(steps_per_revolution.max(1)),
                backlash: DEFAULT_BACKLASH_COUNTS,
                last_direction: StepDirection::Forward,
                steps_forward: 0,
                steps_backward: 0,
                releases: 0,
                indicator: Indicator::Off,
                magnet: MagnetStatus {
                    detected: true,
                    too_weak: false,
                    too_strong: false,
                },
            })),
        }
    }

    pub fn with_backlash(self, counts: f64) -> Self {
        self.inner.borrow_mut().backlash = counts;
        self
    }

    /// True fractional position of the mechanism.
    pub fn position(&self) -> f32 {
        let m = self.inner.borrow();
        ((m.angle - m.open_stop) / (m.closed_stop - m.open_stop)) as f32
    }

    /// Move the vent by hand to `position`.
    pub fn set_position(&self, position: f32) {
        let mut m = self.inner.borrow_mut();
        m.angle = m.open_stop + f64::from(position) * (m.closed_stop - m.open_stop);
        m.clamp();
    }

    /// Move the vent by hand by `delta` of full travel.
    pub fn nudge(&self, delta: f32) {
        self.set_position(self.position() + delta);
    }

    pub fn set_magnet(&self, status: MagnetStatus) {
        self.inner.borrow_mut().magnet = status;
    }

    /// Total motor steps issued in `direction`.
    pub fn steps(&self, direction: StepDirection) -> u64 {
        let m = self.inner.borrow();
        match direction {
            StepDirection::Forward => m.steps_forward,
            StepDirection::Backward => m.steps_backward,
        }
    }

    pub fn releases(&self) -> u32 {
        self.inner.borrow().releases
    }

    pub fn indicator(&self) -> Indicator {
        self.inner.borrow().indicator
    }
}

impl EncoderPort for SimulatedVent {
    fn read_raw_angle(&mut self) -> u16 {
        let angle = self.inner.borrow().angle.round() as i64;
        angle.rem_euclid(i64::from(ENCODER_COUNTS)) as u16
    }

    fn magnet_status(&mut self) -> MagnetStatus {
        self.inner.borrow().magnet
    }
}

impl MotorPort for SimulatedVent {
    fn step(&mut self, direction: StepDirection, steps: u32) {
        let mut m = self.inner.borrow_mut();
        let travel = f64::from(steps) * m.counts_per_step;
        match direction {
            StepDirection::Backward => {
                m.angle += travel;
                m.steps_backward += u64::from(steps);
            }
            StepDirection::Forward => {
                m.angle -= travel;
                m.steps_forward += u64::from(steps);
            }
        }
        m.last_direction = direction;
        m.clamp();
    }

    fn release(&mut self) {
        let mut m = self.inner.borrow_mut();
        let backlash = m.backlash;
        match m.last_direction {
            StepDirection::Backward => m.angle -= backlash,
            StepDirection::Forward => m.angle += backlash,
        }
        m.releases += 1;
        m.clamp();
    }
}

impl IndicatorPort for SimulatedVent {
    fn set_indicator(&mut self, indicator: Indicator) {
        self.inner.borrow_mut().indicator = indicator;
    }
}

/// Hand-driven clock for simulation and tests.
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    now: Rc<Cell<f64>>,
}

impl SimClock {
    pub fn new(start_secs: f64) -> Self {
        Self {
            now: Rc::new(Cell::new(start_secs)),
        }
    }

    pub fn advance(&self, secs: f64) {
        self.now.set(self.now.get() + secs);
    }
}

impl Clock for SimClock {
    fn now_secs(&self) -> f64 {
        self.now.get()
    }
}
