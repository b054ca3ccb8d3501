//! Recording hardware for integration tests.
//!
//! Wraps the simulated vent so the mechanism still moves, and records every
//! motor and indicator call so tests can assert on the command history.

use std::cell::RefCell;
use std::rc::Rc;

use burnie::adapters::sim::SimulatedVent;
use burnie::app::events::AppEvent;
use burnie::app::ports::{
    ConfigError, ConfigPort, EncoderPort, EventSink, IndicatorPort, MagnetStatus, MotorPort,
};
use burnie::config::SystemConfig;
use burnie::control::tracker::StepDirection;
use burnie::fsm::context::Indicator;

// ── Hardware call record ──────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum HwCall {
    Step { direction: StepDirection, steps: u32 },
    Release,
    Indicator(Indicator),
}

// ── RecordingVent ─────────────────────────────────────────────

#[derive(Clone)]
pub struct RecordingVent {
    vent: SimulatedVent,
    calls: Rc<RefCell<Vec<HwCall>>>,
}

#[allow(dead_code)]
impl RecordingVent {
    pub fn new(vent: SimulatedVent) -> Self {
        Self {
            vent,
            calls: Rc::default(),
        }
    }

    pub fn calls(&self) -> Vec<HwCall> {
        self.calls.borrow().clone()
    }

    pub fn last_call(&self) -> Option<HwCall> {
        self.calls.borrow().last().cloned()
    }

    pub fn clear(&self) {
        self.calls.borrow_mut().clear();
    }

    pub fn steps_in(&self, wanted: StepDirection) -> u32 {
        self.calls
            .borrow()
            .iter()
            .filter_map(|c| match c {
                HwCall::Step { direction, steps } if *direction == wanted => Some(*steps),
                _ => None,
            })
            .sum()
    }

    pub fn last_indicator(&self) -> Option<Indicator> {
        self.calls.borrow().iter().rev().find_map(|c| match c {
            HwCall::Indicator(i) => Some(*i),
            _ => None,
        })
    }
}

impl EncoderPort for RecordingVent {
    fn read_raw_angle(&mut self) -> u16 {
        self.vent.read_raw_angle()
    }

    fn magnet_status(&mut self) -> MagnetStatus {
        self.vent.magnet_status()
    }
}

impl MotorPort for RecordingVent {
    fn step(&mut self, direction: StepDirection, steps: u32) {
        self.calls.borrow_mut().push(HwCall::Step { direction, steps });
        self.vent.step(direction, steps);
    }

    fn release(&mut self) {
        self.calls.borrow_mut().push(HwCall::Release);
        self.vent.release();
    }
}

impl IndicatorPort for RecordingVent {
    fn set_indicator(&mut self, indicator: Indicator) {
        self.calls.borrow_mut().push(HwCall::Indicator(indicator));
        self.vent.set_indicator(indicator);
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `to` path of a `StateChanged`, in order.
    pub fn transitions(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::StateChanged { to, .. } => Some(to.as_str().to_owned()),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── MockNvs ───────────────────────────────────────────────────

#[derive(Default)]
pub struct MockNvs {
    pub stored: Option<SystemConfig>,
    pub saves: u32,
    pub fail: bool,
}

impl ConfigPort for MockNvs {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        Ok(self.stored.clone().unwrap_or_default())
    }

    fn save(&mut self, config: &SystemConfig) -> Result<(), ConfigError> {
        if self.fail {
            return Err(ConfigError::IoError);
        }
        self.stored = Some(config.clone());
        self.saves += 1;
        Ok(())
    }
}
