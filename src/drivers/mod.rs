//! Peripheral drivers for the vent hardware.
//!
//! All drivers are generic over `embedded-hal` 1.0 traits; the concrete
//! ESP-IDF peripherals are plugged in by `main`.

pub mod as5600;
pub mod status_led;
pub mod stepper;
