//! Outbound telemetry encodings.

pub mod stovelink;
