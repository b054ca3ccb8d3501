//! Application service: the hexagonal core.
//!
//! [`AppService`] owns the state machine and its shared context.  It
//! exposes a clean, hardware-agnostic API.  All I/O flows through the
//! port traits the context was built with, making the entire service
//! testable with the simulated vent.
//!
//! ```text
//!   EncoderPort ──▶ ┌────────────────────────────┐ ──▶ EventSink
//!                   │         AppService          │
//!     MotorPort ◀── │  Machine · Tracker · Curve  │
//!                   └────────────────────────────┘
//! ```

use core::fmt::Write as _;

use log::{debug, info, warn};

use crate::config::SystemConfig;
use crate::error::Result;
use crate::fsm::context::VentContext;
use crate::fsm::states::{build_machine, VentStateId};
use crate::fsm::{Machine, StateKey};

use super::commands::AppCommand;
use super::events::{AppEvent, StatePath, TelemetryData};
use super::ports::{Clock, ConfigPort, EventSink, MagnetStatus, VentHardware};

/// Seconds a config change must sit unsaved before it is flushed.
const AUTO_SAVE_DELAY_SECS: f32 = 5.0;

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct AppService {
    machine: Machine<VentStateId, VentContext>,
    ctx: VentContext,
    /// Seconds per control tick (derived from config).
    tick_secs: f32,
    tick_count: u64,
    config_dirty: bool,
    dirty_since_tick: u64,
    /// Last magnet check, refreshed with each telemetry report.
    magnet: MagnetStatus,
}

impl AppService {
    /// Construct the service from configuration and hardware.
    ///
    /// Does **not** start the machine; call [`start`](Self::start) next.
    pub fn new(config: SystemConfig, hardware: Box<dyn VentHardware>, clock: Box<dyn Clock>) -> Result<Self> {
        config.validate()?;
        let tick_secs = config.control_loop_interval_ms as f32 / 1000.0;
        let machine = build_machine()?;
        let ctx = VentContext::new(config, hardware, clock);
        Ok(Self {
            machine,
            ctx,
            tick_secs,
            tick_count: 0,
            config_dirty: false,
            dirty_since_tick: 0,
            magnet: MagnetStatus::default(),
        })
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Check the magnet, take the first encoder sample and enter Idle.
    pub fn start(&mut self, sink: &mut impl EventSink) -> Result<()> {
        self.magnet = self.ctx.hardware.magnet_status();
        if !self.magnet.is_ok() {
            warn_magnet(self.magnet);
        }
        let position = self.ctx.sample_position();
        self.machine.set_state(VentStateId::Idle, &mut self.ctx)?;
        let path = self.state_path();
        info!("AppService started in {} at {:.3}", path, position);
        sink.emit(&AppEvent::Started(path));
        Ok(())
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one control cycle and report any state change.
    pub fn tick(&mut self, sink: &mut impl EventSink) -> Result<()> {
        self.tick_count += 1;
        let before = self.state_path();
        self.machine.update(&mut self.ctx)?;
        self.emit_if_changed(before, sink);

        if self.tick_count % self.telemetry_every() == 0 {
            self.refresh_magnet();
            sink.emit(&AppEvent::Telemetry(self.build_telemetry()));
        }
        Ok(())
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an external command.
    pub fn handle_command(&mut self, cmd: AppCommand, sink: &mut impl EventSink) -> Result<()> {
        let before = self.state_path();
        match cmd {
            AppCommand::StartClosing => {
                self.machine.clear_stack();
                self.machine.set_state(VentStateId::Closer, &mut self.ctx)?;
            }
            AppCommand::Stop => {
                self.machine.clear_stack();
                self.machine.set_state(VentStateId::Idle, &mut self.ctx)?;
            }
            AppCommand::SelfTest => {
                self.machine.clear_stack();
                self.machine.set_state(VentStateId::SelfTest, &mut self.ctx)?;
            }
            AppCommand::MoveTo(position) => self.request_move(position, sink)?,
            AppCommand::MoveToSteps(steps) => {
                let position = self.steps_to_position(steps);
                debug!("valve {} steps -> position {:.3}", steps, position);
                self.request_move(position, sink)?;
            }
            AppCommand::SetClosingDuration(secs) => {
                self.ctx.trajectory.set_time_range(f64::from(secs));
                // The curve floors tiny ranges; store what it actually uses.
                let applied = self.ctx.trajectory.time_range() as u32;
                self.ctx.config.closing_duration_secs = applied;
                self.mark_config_dirty();
                info!("closing duration set to {} s", applied);
                sink.emit(&AppEvent::ClosingDurationChanged(applied));
            }
        }
        self.emit_if_changed(before, sink);
        Ok(())
    }

    fn request_move(&mut self, position: f32, sink: &mut impl EventSink) -> Result<()> {
        let position = if position.is_nan() { 0.0 } else { position.clamp(0.0, 1.0) };
        if self.machine.handle_move_request(&mut self.ctx, position)? {
            info!("move to {:.3} accepted by {}", position, self.state_path());
            sink.emit(&AppEvent::MoveAccepted(position));
        } else {
            warn!("move to {:.3} rejected in {}", position, self.state_path());
            sink.emit(&AppEvent::MoveRejected(position));
        }
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────

    /// Build a telemetry snapshot from the current context.
    pub fn build_telemetry(&self) -> TelemetryData {
        let position = self.position();
        TelemetryData {
            state: self.state_path(),
            position,
            open_percent: ((1.0 - position) * 100.0).clamp(0.0, 100.0),
            valve_steps: self.valve_steps(),
            combustion_secs: self.ctx.trajectory.elapsed(self.ctx.now()),
            closing_duration_secs: self.ctx.config.closing_duration_secs,
            cycle_closed: self.ctx.cycle_closed,
            magnet: self.magnet,
        }
    }

    /// `state` or `state/sub_state` of the running machine.
    pub fn state_path(&self) -> StatePath {
        let mut path = StatePath::new();
        let Some(state) = self.machine.current_state() else {
            let _ = path.push_str("-");
            return path;
        };
        let _ = match self.machine.current_sub_state() {
            Some(sub) => write!(path, "{}/{}", state.name(), sub),
            None => write!(path, "{}", state.name()),
        };
        path
    }

    pub fn current_state(&self) -> Option<VentStateId> {
        self.machine.current_state()
    }

    /// Last sampled position, bounded to 0..=1.
    pub fn position(&self) -> f32 {
        self.ctx.tracker.clamped_position()
    }

    /// Valve-style position: motor steps open from closed.  Positions
    /// within the snap distance of closed read as exactly closed.
    pub fn valve_steps(&self) -> u32 {
        let full = self.ctx.tracker.full_travel_steps();
        let open = (f64::from(full) * f64::from(1.0 - self.position())).round();
        let steps = open.clamp(0.0, f64::from(full)) as u32;
        if steps < self.ctx.config.valve_closed_snap_steps { 0 } else { steps }
    }

    fn steps_to_position(&self, steps: u32) -> f32 {
        let full = self.ctx.tracker.full_travel_steps();
        if full == 0 {
            return 1.0;
        }
        (1.0 - steps as f32 / full as f32).clamp(0.0, 1.0)
    }

    /// Total control ticks executed since startup.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn config(&self) -> &SystemConfig {
        &self.ctx.config
    }

    pub fn context(&self) -> &VentContext {
        &self.ctx
    }

    // ── Internal ──────────────────────────────────────────────

    fn emit_if_changed(&self, before: StatePath, sink: &mut impl EventSink) {
        let after = self.state_path();
        if after != before {
            sink.emit(&AppEvent::StateChanged {
                from: before,
                to: after,
            });
        }
    }

    /// Re-read the magnet check, logging when it goes bad or recovers.
    fn refresh_magnet(&mut self) {
        let magnet = self.ctx.hardware.magnet_status();
        if magnet != self.magnet {
            if magnet.is_ok() {
                info!("encoder magnet ok again");
            } else {
                warn_magnet(magnet);
            }
        }
        self.magnet = magnet;
    }

    fn telemetry_every(&self) -> u64 {
        let interval_ms = u64::from(self.ctx.config.telemetry_interval_secs) * 1000;
        (interval_ms / u64::from(self.ctx.config.control_loop_interval_ms.max(1))).max(1)
    }

    // ── Config dirty-flag management ──────────────────────────

    /// Mark the config as modified.
    pub fn mark_config_dirty(&mut self) {
        if !self.config_dirty {
            self.config_dirty = true;
            self.dirty_since_tick = self.tick_count;
        }
    }

    /// Flush the config once it has been dirty for a few seconds.
    /// Returns `true` if the config was saved.
    pub fn auto_save_if_needed(&mut self, storage: &mut impl ConfigPort) -> bool {
        if !self.config_dirty {
            return false;
        }
        let ticks_since_dirty = self.tick_count.saturating_sub(self.dirty_since_tick);
        if (ticks_since_dirty as f32 * self.tick_secs) < AUTO_SAVE_DELAY_SECS {
            return false;
        }
        match storage.save(&self.ctx.config) {
            Ok(()) => {
                self.config_dirty = false;
                info!("config auto-saved");
                true
            }
            Err(e) => {
                warn!("config auto-save failed: {}", e);
                false
            }
        }
    }

    /// Force-save if dirty (call before shutting down).
    pub fn force_save_if_dirty(&mut self, storage: &mut impl ConfigPort) {
        if !self.config_dirty {
            return;
        }
        match storage.save(&self.ctx.config) {
            Ok(()) => {
                self.config_dirty = false;
                info!("config force-saved before shutdown");
            }
            Err(e) => warn!("config force-save failed: {}", e),
        }
    }

    /// Whether the config has unsaved changes.
    pub fn is_config_dirty(&self) -> bool {
        self.config_dirty
    }
}

fn warn_magnet(magnet: MagnetStatus) {
    warn!(
        "encoder magnet not ok (detected={}, weak={}, strong={}); position may be unreliable",
        magnet.detected, magnet.too_weak, magnet.too_strong
    );
}
