//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (encoder, motor, indicator, clock, event sinks, storage)
//! implement these traits.  The domain core holds them as trait objects and
//! never touches hardware directly.
//!
//! Hardware ports are infallible by contract: adapters log bus errors and
//! report the last good reading, so a flaky I2C line degrades tracking
//! instead of aborting the control loop.

use crate::config::SystemConfig;
use crate::control::tracker::StepDirection;
use crate::fsm::context::Indicator;

// ───────────────────────────────────────────────────────────────
// Encoder port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Magnet field check reported by the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MagnetStatus {
    pub detected: bool,
    pub too_weak: bool,
    pub too_strong: bool,
}

impl MagnetStatus {
    pub fn is_ok(&self) -> bool {
        self.detected && !self.too_weak && !self.too_strong
    }
}

/// Read-side port for the vent shaft encoder.
pub trait EncoderPort {
    /// Current raw angle, 0–4095.
    fn read_raw_angle(&mut self) -> u16;

    fn magnet_status(&mut self) -> MagnetStatus;
}

// ───────────────────────────────────────────────────────────────
// Motor port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port for the vent stepper.
pub trait MotorPort {
    /// Issue `steps` full steps in `direction`.  Blocks until done.
    fn step(&mut self, direction: StepDirection, steps: u32);

    /// De-energise the coils so the vent can be moved by hand.
    fn release(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Indicator port
// ───────────────────────────────────────────────────────────────

/// Status pixel showing what the controller is doing.
pub trait IndicatorPort {
    fn set_indicator(&mut self, indicator: Indicator);
}

/// Everything the controller needs from the vent hardware.
pub trait VentHardware: EncoderPort + MotorPort + IndicatorPort {}

impl<T: EncoderPort + MotorPort + IndicatorPort> VentHardware for T {}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic time source.  Injected so tests can drive time by hand.
pub trait Clock {
    /// Seconds since an arbitrary fixed origin.
    fn now_secs(&self) -> f64;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go (serial log, MQTT,
/// StoveLink, etc.).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// Implementations MUST validate before persisting; invalid values are
/// rejected, not clamped.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`SystemConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&mut self, config: &SystemConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::error::Error for ConfigError {}
