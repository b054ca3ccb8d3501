//! Vent closing controller.
//!
//! One state of the top-level machine that owns a private child machine:
//!
//! ```text
//!                 ┌──────────────[displacement]─────────────┐
//!                 │                                         ▼
//!  enter ──▶ MONITORING ──[behind trajectory]──▶ CLOSING   OVERRIDE
//!                 ▲   ▲                             │  │      │
//!                 │   └──────[caught up]────────────┘  │      │
//!                 │                       [target ≥ closed]   │
//!                 │                                    ▼      │
//!                 ├────────[reopened slowly]──────── CLOSED   │
//!                 │                                    │      │
//!                 │                            [dropped]      │
//!                 │                                    ▼      │
//!                 └────────────[settled]────────── OVERRIDE ◀─┘
//! ```
//!
//! Monitoring and Closed accept external move requests; the outer state
//! then pushes the move controller over itself.  Closing and Override
//! reject them: the former is mid-move, the latter is waiting for a human
//! to let go of the handle.

use log::info;

use super::context::{Indicator, VentContext};
use super::states::VentStateId;
use super::{Machine, MoveResponse, State, StateKey, Transition};
use crate::control::tracker::StepDirection;
use crate::error::Result;

/// Sub-states of the closing controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloserStateId {
    Monitoring,
    Override,
    Closing,
    Closed,
}

impl StateKey for CloserStateId {
    fn name(self) -> &'static str {
        match self {
            Self::Monitoring => "monitoring",
            Self::Override => "override",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }
}

/// Re-synchronise the trajectory with the vent after it was moved by
/// something other than the closing controller.
///
/// A closed vent opened past the open threshold starts a new burn; any
/// other move keeps the cycle's closing rate.
fn rebase_trajectory(ctx: &mut VentContext, position: f32) {
    let now = ctx.now();
    if ctx.cycle_closed && position < ctx.config.closer.open_threshold {
        info!("closer: vent reopened to {:.3}, new combustion cycle", position);
        ctx.trajectory.start(now, position);
        ctx.cycle_closed = false;
    } else {
        ctx.trajectory.adjust(now, position);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  Outer state
// ═══════════════════════════════════════════════════════════════════════════

/// Closes the vent along the trajectory, yielding to manual adjustments.
pub struct VentCloser {
    machine: Machine<CloserStateId, VentContext>,
}

impl VentCloser {
    pub fn new() -> Result<Self> {
        let mut machine = Machine::new("closer");
        machine.add_state(CloserStateId::Monitoring, Box::new(Monitoring::default()))?;
        machine.add_state(CloserStateId::Override, Box::new(Override::default()))?;
        machine.add_state(CloserStateId::Closing, Box::new(Closing::default()))?;
        machine.add_state(CloserStateId::Closed, Box::new(Closed::default()))?;
        Ok(Self { machine })
    }

    pub fn current(&self) -> Option<CloserStateId> {
        self.machine.current_state()
    }
}

impl State<VentStateId, VentContext> for VentCloser {
    fn enter(&mut self, ctx: &mut VentContext) -> Result<()> {
        let position = ctx.sample_position();
        let now = ctx.now();
        ctx.trajectory.start(now, position);
        ctx.cycle_closed = false;
        self.machine.set_state(CloserStateId::Monitoring, ctx)
    }

    fn exit(&mut self, ctx: &mut VentContext) {
        self.machine.stop(ctx);
    }

    /// Continue the running cycle after an interruption.  The interrupting
    /// move is folded into the trajectory so Monitoring does not mistake it
    /// for a manual override.
    fn resume(&mut self, ctx: &mut VentContext) -> Result<()> {
        let position = ctx.sample_position();
        rebase_trajectory(ctx, position);
        self.machine.set_state(CloserStateId::Monitoring, ctx)
    }

    fn update(&mut self, ctx: &mut VentContext) -> Result<Option<Transition<VentStateId>>> {
        self.machine.update(ctx)?;
        Ok(None)
    }

    fn handle_move_request(
        &mut self,
        ctx: &mut VentContext,
        position: f32,
    ) -> Result<MoveResponse<VentStateId>> {
        if self.machine.handle_move_request(ctx, position)? {
            ctx.pending_target = Some(position);
            Ok(MoveResponse::AcceptedWith(Transition::Push(VentStateId::MoveVent)))
        } else {
            Ok(MoveResponse::Rejected)
        }
    }

    fn sub_state(&self) -> Option<&'static str> {
        self.machine.current_state().map(StateKey::name)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  MONITORING
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct Monitoring {
    snapshot: f32,
}

impl State<CloserStateId, VentContext> for Monitoring {
    fn enter(&mut self, ctx: &mut VentContext) -> Result<()> {
        self.snapshot = ctx.sample_position();
        ctx.set_indicator(Indicator::Monitoring);
        Ok(())
    }

    fn update(&mut self, ctx: &mut VentContext) -> Result<Option<Transition<CloserStateId>>> {
        let cfg = ctx.config.closer;
        let position = ctx.sample_position();
        if (position - self.snapshot).abs() > cfg.override_sensitivity {
            info!(
                "closer: manual movement {:.3} -> {:.3}",
                self.snapshot, position
            );
            return Ok(Some(Transition::Set(CloserStateId::Override)));
        }

        let target = ctx.trajectory.position(ctx.now());
        let plan = ctx.tracker.plan_move(target);
        if plan.steps > cfg.min_steps || target >= cfg.closed_threshold {
            return Ok(Some(Transition::Set(CloserStateId::Closing)));
        }
        Ok(None)
    }

    fn handle_move_request(
        &mut self,
        _ctx: &mut VentContext,
        _position: f32,
    ) -> Result<MoveResponse<CloserStateId>> {
        Ok(MoveResponse::Accepted)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  OVERRIDE
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct Override {
    snapshot: f32,
    last_motion: f64,
}

impl Override {
    fn show(ctx: &mut VentContext, position: f32) {
        let indicator = if position < ctx.config.closer.open_threshold {
            Indicator::Reopened
        } else {
            Indicator::Override
        };
        ctx.set_indicator(indicator);
    }
}

impl State<CloserStateId, VentContext> for Override {
    fn enter(&mut self, ctx: &mut VentContext) -> Result<()> {
        self.snapshot = ctx.sample_position();
        self.last_motion = ctx.now();
        Self::show(ctx, self.snapshot);
        Ok(())
    }

    fn update(&mut self, ctx: &mut VentContext) -> Result<Option<Transition<CloserStateId>>> {
        let cfg = ctx.config.closer;
        let position = ctx.sample_position();
        let now = ctx.now();

        if (position - self.snapshot).abs() > cfg.settle_sensitivity {
            self.snapshot = position;
            self.last_motion = now;
            Self::show(ctx, position);
            return Ok(None);
        }

        if now - self.last_motion >= f64::from(cfg.settle_time_secs) {
            info!("closer: override settled at {:.3}", position);
            rebase_trajectory(ctx, position);
            return Ok(Some(Transition::Set(CloserStateId::Monitoring)));
        }
        Ok(None)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  CLOSING
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct Closing {
    target: f32,
}

impl State<CloserStateId, VentContext> for Closing {
    fn enter(&mut self, ctx: &mut VentContext) -> Result<()> {
        self.target = ctx.trajectory.position(ctx.now());
        ctx.set_indicator(Indicator::Closing);
        Ok(())
    }

    fn update(&mut self, ctx: &mut VentContext) -> Result<Option<Transition<CloserStateId>>> {
        let cfg = ctx.config.closer;
        if self.target >= cfg.closed_threshold {
            return Ok(Some(Transition::Set(CloserStateId::Closed)));
        }

        ctx.sample_position();
        let plan = ctx.tracker.plan_move(self.target);
        if plan.steps <= cfg.min_steps {
            return Ok(Some(Transition::Set(CloserStateId::Monitoring)));
        }
        let steps = plan.steps.min(cfg.max_steps_per_tick) + cfg.overshoot_steps;
        ctx.drive(plan.direction, steps);
        Ok(None)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  CLOSED
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct Closed {
    baseline: f32,
}

impl State<CloserStateId, VentContext> for Closed {
    fn enter(&mut self, ctx: &mut VentContext) -> Result<()> {
        let cfg = ctx.config.closer;
        ctx.sample_position();
        let plan = ctx.tracker.plan_move(1.0);
        // Always push into the closed stop, even if the tracker already
        // reads closed, so backlash ends up on a known side.
        let remaining = match plan.direction {
            StepDirection::Backward => plan.steps,
            StepDirection::Forward => 0,
        };
        ctx.drive(StepDirection::Backward, remaining + cfg.closed_overshoot_steps);

        self.baseline = ctx.sample_position();
        ctx.cycle_closed = true;
        ctx.set_indicator(Indicator::Closed);
        info!("closer: vent closed at {:.3}", self.baseline);
        Ok(())
    }

    fn update(&mut self, ctx: &mut VentContext) -> Result<Option<Transition<CloserStateId>>> {
        let cfg = ctx.config.closer;
        let position = ctx.sample_position();
        if self.baseline - position > cfg.closed_drop_threshold {
            info!(
                "closer: closed vent opened by hand ({:.3} -> {:.3})",
                self.baseline, position
            );
            return Ok(Some(Transition::Set(CloserStateId::Override)));
        }
        self.baseline = position;

        if position < cfg.open_threshold {
            let now = ctx.now();
            ctx.trajectory.start(now, position);
            ctx.cycle_closed = false;
            return Ok(Some(Transition::Set(CloserStateId::Monitoring)));
        }
        Ok(None)
    }

    fn handle_move_request(
        &mut self,
        _ctx: &mut VentContext,
        _position: f32,
    ) -> Result<MoveResponse<CloserStateId>> {
        Ok(MoveResponse::Accepted)
    }
}
