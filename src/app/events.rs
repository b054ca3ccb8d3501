//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log to serial, publish to Home
//! Assistant, pack into a StoveLink frame.

use super::ports::MagnetStatus;

/// `state` or `state/sub_state`, e.g. `vent_closer/monitoring`.
pub type StatePath = heapless::String<48>;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The application service has started (carries initial state).
    Started(StatePath),

    /// The machine moved between states or sub-states.
    StateChanged { from: StatePath, to: StatePath },

    /// A move request was taken by the running state.
    MoveAccepted(f32),

    /// A move request was refused (e.g. mid-override).
    MoveRejected(f32),

    /// Closing duration changed (seconds).
    ClosingDurationChanged(u32),

    /// Periodic telemetry snapshot.
    Telemetry(TelemetryData),
}

/// A point-in-time telemetry snapshot suitable for logging or transmission.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryData {
    pub state: StatePath,
    /// 0 = open, 1 = closed.
    pub position: f32,
    pub open_percent: f32,
    /// Steps open from closed, as reported to the valve entity.
    pub valve_steps: u32,
    /// Seconds since the current or last burn started, ignoring curve
    /// adjustments.  Zero until the first closing cycle.
    pub combustion_secs: f64,
    pub closing_duration_secs: u32,
    pub cycle_closed: bool,
    /// Encoder magnet check, sampled on each telemetry tick.
    pub magnet: MagnetStatus,
}
