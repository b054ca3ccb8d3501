//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the logger (UART / USB-CDC on the device, stderr on the host).
//! A Home Assistant or StoveLink publisher would implement the same trait.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Telemetry(t) => {
                info!(
                    "TELEM | state={} | pos={:.3} open={:.1}% valve={} | \
                     burn={:.0}s/{}s | closed={} magnet_ok={}",
                    t.state,
                    t.position,
                    t.open_percent,
                    t.valve_steps,
                    t.combustion_secs,
                    t.closing_duration_secs,
                    t.cycle_closed,
                    t.magnet.is_ok(),
                );
            }
            AppEvent::StateChanged { from, to } => {
                info!("STATE | {} -> {}", from, to);
            }
            AppEvent::MoveAccepted(position) => {
                info!("MOVE  | accepted target={:.3}", position);
            }
            AppEvent::MoveRejected(position) => {
                warn!("MOVE  | rejected target={:.3}", position);
            }
            AppEvent::ClosingDurationChanged(secs) => {
                info!("CONF  | closing_duration={}s", secs);
            }
            AppEvent::Started(state) => {
                info!("START | initial_state={}", state);
            }
        }
    }
}
