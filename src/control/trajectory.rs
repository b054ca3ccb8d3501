//! Time-based closing trajectory.
//!
//! ```text
//!  position
//!    1.0 ┤                         ╭──────
//!        │                    ╱
//!        │               ╱
//!     p0 ┤──────────╱
//!        └──────────┬──────────────┬──────▶ adjusted elapsed
//!                   0          time_range
//! ```
//!
//! `adjust` slides the curve along the time axis so it passes through a
//! manually set position *now*, leaving the slope alone.  The elapsed time
//! reported for the combustion cycle is measured from `start` and ignores
//! every adjustment.
//!
//! Time is passed in explicitly (seconds from the injected clock), which
//! keeps the function pure and testable.

use log::{info, warn};

/// Below this much remaining travel the curve has no usable slope.
const DEGENERATE_SPAN: f32 = 1e-4;

/// Shortest accepted closing duration (seconds).
const MIN_TIME_RANGE: f64 = 1.0;

/// Linear open-to-closed trajectory over `time_range` seconds.
#[derive(Debug, Clone)]
pub struct LinearVentFunction {
    time_range: f64,
    start_time: Option<f64>,
    start_position: f32,
    time_adjustment: f64,
}

impl LinearVentFunction {
    pub fn new(time_range_secs: f64) -> Self {
        Self {
            time_range: time_range_secs.max(MIN_TIME_RANGE),
            start_time: None,
            start_position: 0.0,
            time_adjustment: 0.0,
        }
    }

    /// Restart the curve at `position`, now.
    pub fn start(&mut self, now: f64, position: f32) {
        self.start_time = Some(now);
        self.start_position = position.clamp(0.0, 1.0);
        self.time_adjustment = 0.0;
        info!(
            "trajectory: start at {:.3}, {:.0}s to closed",
            self.start_position, self.time_range
        );
    }

    /// Target position at `now`.  Zero until started.
    pub fn position(&self, now: f64) -> f32 {
        let Some(start) = self.start_time else {
            return 0.0;
        };
        let adjusted = now - start + self.time_adjustment;
        let p0 = f64::from(self.start_position);
        let p = p0 + (1.0 - p0) * adjusted / self.time_range;
        (p as f32).clamp(0.0, 1.0)
    }

    /// Adjusted elapsed time at which the curve reaches `position`.
    pub fn inverse(&self, position: f32) -> f64 {
        let remaining = 1.0 - self.start_position;
        if remaining < DEGENERATE_SPAN {
            return 0.0;
        }
        self.time_range * f64::from(position - self.start_position) / f64::from(remaining)
    }

    /// Re-base the curve onto `position` at `now` without changing its slope.
    pub fn adjust(&mut self, now: f64, position: f32) {
        let position = position.clamp(0.0, 1.0);
        let Some(start) = self.start_time else {
            self.start(now, position);
            return;
        };
        if 1.0 - self.start_position < DEGENERATE_SPAN {
            // Started closed: there is no rate to keep.
            self.start(now, position);
            return;
        }
        self.time_adjustment = self.inverse(position) - (now - start);
        info!(
            "trajectory: adjusted to {:.3}, offset {:+.1}s",
            position, self.time_adjustment
        );
    }

    /// Seconds since `start`, ignoring adjustments.  Zero until started.
    pub fn elapsed(&self, now: f64) -> f64 {
        self.start_time.map_or(0.0, |start| (now - start).max(0.0))
    }

    /// Change the closing duration.  Takes effect on the next evaluation.
    pub fn set_time_range(&mut self, secs: f64) {
        if secs < MIN_TIME_RANGE {
            warn!("trajectory: time range {secs}s too short, using {MIN_TIME_RANGE}s");
        }
        self.time_range = secs.max(MIN_TIME_RANGE);
    }

    pub fn time_range(&self) -> f64 {
        self.time_range
    }

    pub fn is_started(&self) -> bool {
        self.start_time.is_some()
    }

    pub fn start_position(&self) -> f32 {
        self.start_position
    }
}
