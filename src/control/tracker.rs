//! Encoder-to-position model.
//!
//! The AS5600 reports a 12-bit angle that wraps every shaft revolution,
//! while the vent's travel spans several revolutions.  The tracker unwraps
//! the reading by counting boundary crossings:
//!
//! ```text
//!   raw:   0 ─── 512 ─────────────── 3584 ─── 4095
//!          │ Q1  │                      │ Q4  │
//!          └─────┘                      └─────┘
//!   Q4 → Q1  forward wrap  (closing)   revolution + 1
//!   Q1 → Q4  reverse wrap  (opening)   revolution - 1
//! ```
//!
//! Precondition: consecutive samples must be less than one outer band
//! (512 counts, 1/8 turn) apart, otherwise a wrap can be missed.  Callers
//! that drive the motor must sample at least every
//! [`PositionTracker::max_steps_per_sample`] steps.  The sanity correction
//! in [`PositionTracker::update`] recovers from an occasional missed
//! crossing; it does not make a slower sampling rate safe.

use log::{debug, warn};

use crate::config::{Calibration, ENCODER_COUNTS};

/// Width of the band on either side of the wrap boundary.
pub const QUADRANT_SIZE: u16 = 512;
const MAX_RAW: u16 = (ENCODER_COUNTS - 1) as u16;
const HIGH_BAND_START: u16 = ENCODER_COUNTS as u16 - QUADRANT_SIZE;

/// Fractional-position slack before the revolution count is distrusted.
const SANITY_MARGIN: f32 = 0.05;

/// Motor rotation sense.  `Backward` turns the encoder angle up (closing).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDirection {
    /// Opening: encoder angle decreases.
    Forward,
    /// Closing: encoder angle increases.
    Backward,
}

/// Motor command that takes the vent to a requested position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovePlan {
    pub steps: u32,
    pub direction: StepDirection,
    /// Raw encoder reading expected at the target.
    pub target_raw_angle: u16,
    /// Revolution the target lies in.
    pub target_revolution: u32,
}

/// Revolution-aware vent position from raw encoder samples.
#[derive(Debug, Clone)]
pub struct PositionTracker {
    calibration: Calibration,
    steps_per_revolution: u32,
    current_revolution: u32,
    last_raw_angle: Option<u16>,
}

impl PositionTracker {
    pub fn new(calibration: Calibration, steps_per_revolution: u32) -> Self {
        Self {
            calibration,
            steps_per_revolution,
            current_revolution: 0,
            last_raw_angle: None,
        }
    }

    /// Ingest one encoder sample.  The first sample only seeds the history.
    pub fn update(&mut self, raw_angle: u16) {
        let raw = raw_angle.min(MAX_RAW);

        let Some(last) = self.last_raw_angle else {
            self.last_raw_angle = Some(raw);
            return;
        };
        if raw < QUADRANT_SIZE && last > HIGH_BAND_START {
            self.current_revolution += 1;
            debug!("tracker: forward wrap, revolution {}", self.current_revolution);
        } else if raw > HIGH_BAND_START && last < QUADRANT_SIZE {
            self.current_revolution = self.current_revolution.saturating_sub(1);
            debug!("tracker: reverse wrap, revolution {}", self.current_revolution);
        }
        self.last_raw_angle = Some(raw);
        self.clamp_revolution();

        let position = self.position(None);
        if position < -SANITY_MARGIN
            && self.current_revolution == 0
            && self.calibration.zero_crossing_count > 0
        {
            warn!("tracker: position {:.3} below open stop, assuming missed forward wrap", position);
            self.current_revolution += 1;
        } else if position > 1.0 + SANITY_MARGIN
            && self.current_revolution > 0
            && self.current_revolution < self.calibration.zero_crossing_count
        {
            warn!("tracker: position {:.3} past closed stop, assuming double-counted wrap", position);
            self.current_revolution -= 1;
        }
        self.clamp_revolution();
    }

    fn clamp_revolution(&mut self) {
        self.current_revolution = self
            .current_revolution
            .min(self.calibration.zero_crossing_count);
    }

    /// Fractional position for `raw_angle`, or for the last sample when
    /// `None`.  Unbounded: readings slightly past a stop come out slightly
    /// outside `[0, 1]`.
    pub fn position(&self, raw_angle: Option<u16>) -> f32 {
        let raw = raw_angle.or(self.last_raw_angle).unwrap_or(0).min(MAX_RAW);
        let absolute = self.absolute_angle(raw);
        let open = i64::from(self.calibration.open_raw_angle);
        ((absolute - open) as f64 / self.calibration.span() as f64) as f32
    }

    /// [`position`](Self::position) of the last sample, bounded to `[0, 1]`.
    pub fn clamped_position(&self) -> f32 {
        self.position(None).clamp(0.0, 1.0)
    }

    /// Motor command that reaches `target` (0 = open, 1 = closed).
    pub fn plan_move(&self, target: f32) -> MovePlan {
        let target = if target.is_nan() { 0.0 } else { target.clamp(0.0, 1.0) };
        let open = i64::from(self.calibration.open_raw_angle);
        let target_abs = (open as f64 + f64::from(target) * self.calibration.span() as f64).round() as i64;
        let current_abs = self.absolute_angle(self.last_raw_angle.unwrap_or(0));
        let delta = target_abs - current_abs;

        let direction = if delta > 0 {
            StepDirection::Backward
        } else {
            StepDirection::Forward
        };
        let counts = i64::from(ENCODER_COUNTS);
        MovePlan {
            steps: self.counts_to_steps(delta.unsigned_abs()),
            direction,
            target_raw_angle: target_abs.rem_euclid(counts) as u16,
            target_revolution: target_abs.div_euclid(counts) as u32,
        }
    }

    /// Plan a relative opening move by `amount` of full travel.
    pub fn plan_open(&self, amount: f32) -> MovePlan {
        self.plan_move(self.position(None) - amount)
    }

    /// Plan a relative closing move by `amount` of full travel.
    pub fn plan_close(&self, amount: f32) -> MovePlan {
        self.plan_move(self.position(None) + amount)
    }

    /// Motor steps from the open stop to the closed stop.
    pub fn full_travel_steps(&self) -> u32 {
        self.counts_to_steps(self.calibration.span().unsigned_abs())
    }

    /// Largest motor move that keeps the shaft inside the wrap-detection
    /// band between two samples.  Half the band leaves room for backlash.
    pub fn max_steps_per_sample(&self) -> u32 {
        let steps = u64::from(QUADRANT_SIZE / 2) * u64::from(self.steps_per_revolution)
            / u64::from(ENCODER_COUNTS);
        (steps as u32).max(1)
    }

    pub fn current_revolution(&self) -> u32 {
        self.current_revolution
    }

    pub fn last_raw_angle(&self) -> Option<u16> {
        self.last_raw_angle
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn steps_per_revolution(&self) -> u32 {
        self.steps_per_revolution
    }

    fn absolute_angle(&self, raw: u16) -> i64 {
        i64::from(raw) + i64::from(self.current_revolution) * i64::from(ENCODER_COUNTS)
    }

    fn counts_to_steps(&self, counts: u64) -> u32 {
        let steps = counts as f64 * f64::from(self.steps_per_revolution) / f64::from(ENCODER_COUNTS);
        steps.round() as u32
    }
}
