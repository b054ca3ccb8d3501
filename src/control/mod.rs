//! Position model and closing trajectory.
//!
//! Pure math over encoder counts and seconds; no hardware access.

pub mod tracker;
pub mod trajectory;
