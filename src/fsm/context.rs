//! Shared mutable context threaded through every state hook.
//!
//! `VentContext` is the blackboard the states read from and write to: the
//! hardware handle, the position tracker, the closing trajectory, the
//! configuration, and the small amount of state that has to survive a
//! transition (a pending move target, whether the current burn has already
//! reached fully closed).

use log::debug;

use crate::app::ports::{Clock, VentHardware};
use crate::config::SystemConfig;
use crate::control::tracker::{PositionTracker, StepDirection};
use crate::control::trajectory::LinearVentFunction;

use super::self_test::SelfTestRun;

// ---------------------------------------------------------------------------
// Indicator
// ---------------------------------------------------------------------------

/// What the status pixel shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    Off,
    /// Tracking the trajectory, nothing to do this tick.
    Monitoring,
    /// Driving toward the trajectory.
    Closing,
    /// Manual movement detected, waiting for it to settle.
    Override,
    /// Manual movement has opened the vent for a new burn.
    Reopened,
    Closed,
    /// Executing an external move request.
    Moving,
}

impl Indicator {
    /// Status pixel colour (R, G, B).
    pub const fn rgb(self) -> (u8, u8, u8) {
        match self {
            Self::Off => (0, 0, 0),
            Self::Monitoring => (0, 0, 40),
            Self::Closing => (255, 0, 0),
            Self::Override => (0, 255, 0),
            Self::Reopened => (255, 255, 255),
            Self::Closed => (40, 0, 0),
            Self::Moving => (0, 0, 255),
        }
    }
}

// ---------------------------------------------------------------------------
// VentContext
// ---------------------------------------------------------------------------

/// The blackboard shared by every state of the vent controller.
pub struct VentContext {
    pub hardware: Box<dyn VentHardware>,
    pub clock: Box<dyn Clock>,
    pub tracker: PositionTracker,
    pub trajectory: LinearVentFunction,
    pub config: SystemConfig,
    /// Target handed from a move request to the move controller.
    pub pending_target: Option<f32>,
    /// The current burn has reached fully closed at least once.
    pub cycle_closed: bool,
    pub indicator: Indicator,
    /// Bookkeeping shared by the hardware self-test sub-states.
    pub self_test: SelfTestRun,
}

impl VentContext {
    pub fn new(config: SystemConfig, hardware: Box<dyn VentHardware>, clock: Box<dyn Clock>) -> Self {
        let tracker = PositionTracker::new(config.calibration, config.motor.steps_per_revolution);
        let trajectory = LinearVentFunction::new(f64::from(config.closing_duration_secs));
        Self {
            hardware,
            clock,
            tracker,
            trajectory,
            config,
            pending_target: None,
            cycle_closed: false,
            indicator: Indicator::Off,
            self_test: SelfTestRun::default(),
        }
    }

    pub fn now(&self) -> f64 {
        self.clock.now_secs()
    }

    /// Take a fresh encoder sample and return the bounded position.
    pub fn sample_position(&mut self) -> f32 {
        let raw = self.hardware.read_raw_angle();
        self.tracker.update(raw);
        self.tracker.clamped_position()
    }

    /// Step the motor, re-sampling the encoder often enough that the
    /// tracker never misses a revolution, then release the coils.
    pub fn drive(&mut self, direction: StepDirection, steps: u32) {
        if steps == 0 {
            return;
        }
        self.step_held(direction, steps);
        self.hardware.release();
    }

    /// Like [`drive`](Self::drive) but leaves the coils energised.
    pub fn step_held(&mut self, direction: StepDirection, steps: u32) {
        debug!("drive {:?} {} steps", direction, steps);
        let chunk = self.tracker.max_steps_per_sample();
        let mut remaining = steps;
        while remaining > 0 {
            let n = remaining.min(chunk);
            self.hardware.step(direction, n);
            let raw = self.hardware.read_raw_angle();
            self.tracker.update(raw);
            remaining -= n;
        }
    }

    pub fn set_indicator(&mut self, indicator: Indicator) {
        if self.indicator != indicator {
            self.indicator = indicator;
            self.hardware.set_indicator(indicator);
        }
    }
}
