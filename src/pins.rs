//! GPIO / peripheral pin assignments for the vent controller board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.  Change a pin here and it propagates everywhere.

// ---------------------------------------------------------------------------
// AS5600 magnetic encoder (I²C)
// ---------------------------------------------------------------------------

pub const I2C_SDA_GPIO: i32 = 8;
pub const I2C_SCL_GPIO: i32 = 9;
/// Fast-mode I²C; the AS5600 supports up to 1 MHz.
pub const I2C_BAUDRATE_HZ: u32 = 400_000;

// ---------------------------------------------------------------------------
// Stepper driver (A4988 / TMC2208 step-dir interface)
// ---------------------------------------------------------------------------

/// Rising edge = one step.
pub const STEP_GPIO: i32 = 4;
/// HIGH = closing (encoder angle increasing).
pub const DIR_GPIO: i32 = 5;
/// Active LOW: coils energised while LOW.
pub const ENABLE_GPIO: i32 = 6;

// ---------------------------------------------------------------------------
// Status LED (discrete RGB on LEDC)
// ---------------------------------------------------------------------------

pub const LED_R_GPIO: i32 = 11;
pub const LED_G_GPIO: i32 = 12;
pub const LED_B_GPIO: i32 = 13;
/// LEDC frequency for the status LED (1 kHz).
pub const LED_PWM_FREQ_HZ: u32 = 1_000;
