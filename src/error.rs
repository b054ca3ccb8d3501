//! Unified error types for the Burnie firmware.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! control loop's error handling uniform.  All variants are `Copy` so they
//! pass through the state machine engine without allocation.
//!
//! Most runtime faults never reach this type: encoder desynchronisation is
//! corrected by the tracker, out-of-range requests are clamped, and driver
//! I/O failures are logged by the hardware adapter.  What remains are
//! programmer errors (bad state keys) and invalid configuration.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The state machine was asked to do something impossible.
    Fsm(FsmError),
    /// A bus or pin operation inside a driver failed.
    Driver(DriverError),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
    /// A telemetry frame could not be encoded.
    Telemetry(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fsm(e) => write!(f, "fsm: {e}"),
            Self::Driver(e) => write!(f, "driver: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Telemetry(msg) => write!(f, "telemetry: {msg}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// State machine errors
// ---------------------------------------------------------------------------

/// Programmer errors raised by [`Machine`](crate::fsm::Machine).
///
/// Each carries the offending state's name so the failure is loud and
/// attributable at the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsmError {
    /// Transition target was never registered.
    UnknownState(&'static str),
    /// A state with this key is already registered.
    DuplicateState(&'static str),
    /// The suspended-state stack is full.
    StackOverflow(&'static str),
}

impl fmt::Display for FsmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownState(name) => write!(f, "unknown state '{name}'"),
            Self::DuplicateState(name) => write!(f, "state '{name}' registered twice"),
            Self::StackOverflow(name) => write!(f, "state stack full while pushing '{name}'"),
        }
    }
}

impl From<FsmError> for Error {
    fn from(e: FsmError) -> Self {
        Self::Fsm(e)
    }
}

// ---------------------------------------------------------------------------
// Driver errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverError {
    /// I2C transaction with the encoder failed.
    I2c,
    /// GPIO write to the stepper driver failed.
    Gpio,
    /// PWM duty update for the status LED failed.
    Pwm,
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I2c => write!(f, "I2C transaction failed"),
            Self::Gpio => write!(f, "GPIO write failed"),
            Self::Pwm => write!(f, "PWM duty update failed"),
        }
    }
}

impl From<DriverError> for Error {
    fn from(e: DriverError) -> Self {
        Self::Driver(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
