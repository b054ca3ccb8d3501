//! System configuration parameters
//!
//! All tunable parameters for the Burnie vent controller.  Calibration is
//! supplied once at startup (JSON file, environment, or persisted blob) and
//! is read-only afterwards; the closing duration is the only value the
//! operator changes at runtime.
//!
//! The closer/mover thresholds are field-tuned values, not derived ones.
//! They are exposed here so installs with a different mechanism can retune
//! them without a rebuild.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Raw angle counts per encoder revolution (AS5600, 12 bit).
pub const ENCODER_COUNTS: u32 = 4096;

// ---------------------------------------------------------------------------
// Calibration
// ---------------------------------------------------------------------------

/// Encoder readings at the two mechanical end stops.
///
/// The encoder angle increases as the vent closes.  `closed_raw_angle_base`
/// is the raw reading at the closed stop, `zero_crossing_count` how many
/// times the reading wraps 4095 → 0 on the way from open to closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibration {
    pub open_raw_angle: u16,
    pub closed_raw_angle_base: u16,
    pub zero_crossing_count: u32,
}

impl Calibration {
    /// Closed stop expressed on the revolution-unwrapped angle axis.
    pub const fn closed_absolute_angle(&self) -> i64 {
        self.closed_raw_angle_base as i64 + ENCODER_COUNTS as i64 * self.zero_crossing_count as i64
    }

    /// Encoder counts between the two stops.
    pub const fn span(&self) -> i64 {
        self.closed_absolute_angle() - self.open_raw_angle as i64
    }

    pub fn validate(&self) -> Result<()> {
        if u32::from(self.open_raw_angle) >= ENCODER_COUNTS {
            return Err(Error::Config("open_raw_angle must be 0-4095"));
        }
        if u32::from(self.closed_raw_angle_base) >= ENCODER_COUNTS {
            return Err(Error::Config("closed_raw_angle_base must be 0-4095"));
        }
        if self.span() <= 0 {
            return Err(Error::Config("closed position must lie past the open position"));
        }
        Ok(())
    }
}

impl Default for Calibration {
    fn default() -> Self {
        // Bench unit: a little under 2.5 shaft turns of travel.
        Self {
            open_raw_angle: 1000,
            closed_raw_angle_base: 3000,
            zero_crossing_count: 2,
        }
    }
}

// ---------------------------------------------------------------------------
// Motor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotorConfig {
    /// Motor steps per encoder revolution.  Folds in the gear ratio.
    pub steps_per_revolution: u32,
    /// Pulse period of the step/dir driver (microseconds).
    pub step_period_us: u32,
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            steps_per_revolution: 200, // 1.8° hybrid stepper, direct drive
            step_period_us: 2_000,
        }
    }
}

// ---------------------------------------------------------------------------
// Vent closer tunables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloserConfig {
    /// Displacement (fraction) seen in Monitoring that counts as a manual move.
    pub override_sensitivity: f32,
    /// Displacement (fraction) that restarts the Override settle timer.
    pub settle_sensitivity: f32,
    /// Seconds without motion before an override is resolved.
    pub settle_time_secs: f32,
    /// Step deficit below which the controller leaves the vent alone.
    pub min_steps: u32,
    /// Extra steps added to every closing move to take up backlash.
    pub overshoot_steps: u32,
    /// Upper bound on motor steps per Closing tick.
    pub max_steps_per_tick: u32,
    /// Trajectory target at which the cycle is treated as finished.
    pub closed_threshold: f32,
    /// Position below which the vent counts as reopened for a new burn.
    pub open_threshold: f32,
    /// Drop below the closed baseline that counts as a manual reopen.
    pub closed_drop_threshold: f32,
    /// Padding on the final slam-shut move.
    pub closed_overshoot_steps: u32,
}

impl Default for CloserConfig {
    fn default() -> Self {
        Self {
            override_sensitivity: 0.01,
            settle_sensitivity: 0.005,
            settle_time_secs: 5.0,
            min_steps: 5,
            overshoot_steps: 2,
            max_steps_per_tick: 50,
            closed_threshold: 0.99,
            open_threshold: 0.25,
            closed_drop_threshold: 0.02,
            closed_overshoot_steps: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// Move controller tunables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoverConfig {
    /// Upper bound on motor steps per tick.
    pub chunk_steps: u32,
    pub overshoot_steps: u32,
    /// Remaining distance (steps) treated as "arrived".
    pub min_steps: u32,
    /// Ticks allowed for sub-chunk corrections near the target.
    pub fine_update_budget: u32,
}

impl Default for MoverConfig {
    fn default() -> Self {
        Self {
            chunk_steps: 50,
            overshoot_steps: 1,
            min_steps: 2,
            fine_update_budget: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// Hardware self-test tunables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelfTestConfig {
    /// Moves made in one direction before reversing.
    pub moves_each_direction: u32,
    /// Shaft rotation each move aims for, in degrees.
    pub target_step_angle_deg: f32,
    /// Wait between stopping the motor and reading the encoder.
    pub encoder_delay_secs: f32,
    /// Rest between moves.
    pub pause_secs: f32,
}

impl Default for SelfTestConfig {
    fn default() -> Self {
        Self {
            moves_each_direction: 2,
            target_step_angle_deg: 30.0,
            encoder_delay_secs: 0.05,
            pause_secs: 1.0,
        }
    }
}

// ---------------------------------------------------------------------------
// SystemConfig
// ---------------------------------------------------------------------------

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub calibration: Calibration,
    pub motor: MotorConfig,
    pub closer: CloserConfig,
    pub mover: MoverConfig,
    pub self_test: SelfTestConfig,

    // --- Closing cycle ---
    /// Seconds from fully open to fully closed along the trajectory.
    pub closing_duration_secs: u32,

    // --- Valve reporting ---
    /// Valve positions (steps open) below this are reported as closed.
    pub valve_closed_snap_steps: u32,

    // --- Timing ---
    /// Control loop interval (milliseconds)
    pub control_loop_interval_ms: u32,
    /// Telemetry report interval (seconds)
    pub telemetry_interval_secs: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            calibration: Calibration::default(),
            motor: MotorConfig::default(),
            closer: CloserConfig::default(),
            mover: MoverConfig::default(),
            self_test: SelfTestConfig::default(),

            closing_duration_secs: 30 * 60,

            valve_closed_snap_steps: 3,

            control_loop_interval_ms: 200, // 5 Hz
            telemetry_interval_secs: 10,
        }
    }
}

impl SystemConfig {
    /// Parse a (possibly partial) JSON document over the defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(text).map_err(|_| Error::Config("malformed JSON config"))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply the deployment environment variables on top of this config.
    ///
    /// `lookup` is `std::env::var(..).ok()` in production and a map in tests.
    /// Unparseable values are rejected rather than ignored.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        fn parse<T: core::str::FromStr>(raw: &str, what: &'static str) -> Result<T> {
            raw.trim().parse().map_err(|_| Error::Config(what))
        }

        if let Some(v) = lookup("OPEN_POSITION") {
            self.calibration.open_raw_angle = parse(&v, "OPEN_POSITION is not an integer")?;
        }
        if let Some(v) = lookup("CLOSED_POSITION") {
            self.calibration.closed_raw_angle_base =
                parse(&v, "CLOSED_POSITION is not an integer")?;
        }
        if let Some(v) = lookup("NUM_ZERO_CROSSINGS") {
            self.calibration.zero_crossing_count =
                parse(&v, "NUM_ZERO_CROSSINGS is not an integer")?;
        }
        if let Some(v) = lookup("MOTOR_STEPS_PER_REVOLUTION") {
            self.motor.steps_per_revolution =
                parse(&v, "MOTOR_STEPS_PER_REVOLUTION is not an integer")?;
        }
        if let Some(v) = lookup("CLOSING_DURATION_MINUTES") {
            let minutes: u32 = parse(&v, "CLOSING_DURATION_MINUTES is not an integer")?;
            self.closing_duration_secs = minutes.saturating_mul(60);
        }
        self.validate()
    }

    /// Range-check every field.  Called before the config is used or stored.
    pub fn validate(&self) -> Result<()> {
        self.calibration.validate()?;
        if self.motor.steps_per_revolution == 0 {
            return Err(Error::Config("steps_per_revolution must be non-zero"));
        }
        if self.closing_duration_secs == 0 {
            return Err(Error::Config("closing_duration_secs must be non-zero"));
        }
        let c = &self.closer;
        if !(0.0..1.0).contains(&c.override_sensitivity)
            || !(0.0..1.0).contains(&c.settle_sensitivity)
            || !(0.0..1.0).contains(&c.closed_drop_threshold)
        {
            return Err(Error::Config("closer sensitivities must be fractions"));
        }
        // Written as a positive test so NaN fails it.
        if !(c.open_threshold < c.closed_threshold && c.closed_threshold <= 1.0) {
            return Err(Error::Config("open_threshold must sit below closed_threshold <= 1"));
        }
        if !(c.settle_time_secs.is_finite() && c.settle_time_secs >= 0.0) {
            return Err(Error::Config("settle_time_secs must be finite and not negative"));
        }
        if c.max_steps_per_tick == 0 || self.mover.chunk_steps == 0 {
            return Err(Error::Config("per-tick step limits must be non-zero"));
        }
        let t = &self.self_test;
        if t.moves_each_direction == 0
            || !(t.target_step_angle_deg > 0.0 && t.target_step_angle_deg < 180.0)
            || !(t.encoder_delay_secs.is_finite() && t.encoder_delay_secs >= 0.0)
            || !(t.pause_secs.is_finite() && t.pause_secs >= 0.0)
        {
            return Err(Error::Config("self_test tunables out of range"));
        }
        if !(10..=10_000).contains(&self.control_loop_interval_ms) {
            return Err(Error::Config("control_loop_interval_ms out of range"));
        }
        Ok(())
    }

    /// Serialise for the persisted config blob.
    pub fn to_blob(&self) -> Result<Vec<u8>> {
        postcard::to_allocvec(self).map_err(|_| Error::Config("config does not serialise"))
    }

    pub fn from_blob(bytes: &[u8]) -> Result<Self> {
        let config: Self =
            postcard::from_bytes(bytes).map_err(|_| Error::Config("stored config corrupted"))?;
        config.validate()?;
        Ok(config)
    }
}
