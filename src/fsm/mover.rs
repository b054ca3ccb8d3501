//! Interruptible move controller.
//!
//! Pushed over whatever is running when an external move request is
//! accepted, and pops itself once the vent is at the target.  Motion is
//! issued in bounded chunks so each tick returns quickly.  Corrections
//! smaller than a chunk draw on a small budget, which stops the controller
//! hunting forever around a target that encoder noise makes unreachable.

use log::info;

use super::context::{Indicator, VentContext};
use super::states::VentStateId;
use super::{MoveResponse, State, Transition};
use crate::error::Result;

#[derive(Default)]
pub struct MoveVent {
    target: f32,
    fine_updates_left: u32,
}

impl MoveVent {
    pub fn target(&self) -> f32 {
        self.target
    }

    /// Sub-chunk corrections still allowed before giving up.
    pub fn fine_updates_left(&self) -> u32 {
        self.fine_updates_left
    }
}

impl State<VentStateId, VentContext> for MoveVent {
    fn enter(&mut self, ctx: &mut VentContext) -> Result<()> {
        let target = match ctx.pending_target.take() {
            Some(target) => target,
            // Nothing requested: hold where we are and pop on the next tick.
            None => ctx.sample_position(),
        };
        self.target = target.clamp(0.0, 1.0);
        self.fine_updates_left = ctx.config.mover.fine_update_budget;
        ctx.set_indicator(Indicator::Moving);
        info!("mover: moving to {:.3}", self.target);
        Ok(())
    }

    fn update(&mut self, ctx: &mut VentContext) -> Result<Option<Transition<VentStateId>>> {
        let cfg = ctx.config.mover;
        ctx.sample_position();
        let plan = ctx.tracker.plan_move(self.target);

        if plan.steps > cfg.min_steps && self.fine_updates_left > 0 {
            let chunk = plan.steps.min(cfg.chunk_steps);
            ctx.drive(plan.direction, chunk + cfg.overshoot_steps);
            if plan.steps < cfg.chunk_steps {
                self.fine_updates_left -= 1;
            }
            return Ok(None);
        }

        info!(
            "mover: done at {:.3} (target {:.3})",
            ctx.tracker.clamped_position(),
            self.target
        );
        Ok(Some(Transition::Pop))
    }

    /// Always accepted: a new target replaces the old one mid-move.  The
    /// fine-correction budget carries over.
    fn handle_move_request(
        &mut self,
        _ctx: &mut VentContext,
        position: f32,
    ) -> Result<MoveResponse<VentStateId>> {
        self.target = position.clamp(0.0, 1.0);
        info!("mover: target updated to {:.3}", self.target);
        Ok(MoveResponse::Accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sim::{SimClock, SimulatedVent};
    use crate::config::SystemConfig;
    use crate::control::tracker::StepDirection;

    fn rig() -> (SimulatedVent, VentContext) {
        let config = SystemConfig::default();
        let vent = SimulatedVent::new(config.calibration, config.motor.steps_per_revolution)
            .with_backlash(0.0);
        let mut ctx = VentContext::new(config, Box::new(vent.clone()), Box::new(SimClock::new(0.0)));
        ctx.sample_position();
        (vent, ctx)
    }

    fn run(mover: &mut MoveVent, ctx: &mut VentContext) -> usize {
        for tick in 1..=200 {
            if mover.update(ctx).unwrap() == Some(Transition::Pop) {
                return tick;
            }
        }
        panic!("mover never finished");
    }

    #[test]
    fn takes_pending_target_on_entry() {
        let (_vent, mut ctx) = rig();
        ctx.pending_target = Some(0.6);
        let mut mover = MoveVent::default();
        mover.enter(&mut ctx).unwrap();
        assert_eq!(mover.target(), 0.6);
        assert_eq!(ctx.pending_target, None);
        assert_eq!(ctx.indicator, Indicator::Moving);
    }

    #[test]
    fn reaches_target_in_bounded_chunks() {
        let (vent, mut ctx) = rig();
        ctx.pending_target = Some(0.5);
        let mut mover = MoveVent::default();
        mover.enter(&mut ctx).unwrap();

        mover.update(&mut ctx).unwrap();
        let cfg = ctx.config.mover;
        assert_eq!(
            vent.steps(StepDirection::Backward),
            u64::from(cfg.chunk_steps + cfg.overshoot_steps)
        );

        run(&mut mover, &mut ctx);
        assert!((vent.position() - 0.5).abs() < 0.01);
    }

    #[test]
    fn opens_with_forward_steps() {
        let (vent, mut ctx) = rig();
        vent.set_position(0.3);
        ctx.sample_position();
        ctx.pending_target = Some(0.1);
        let mut mover = MoveVent::default();
        mover.enter(&mut ctx).unwrap();
        run(&mut mover, &mut ctx);
        assert!(vent.steps(StepDirection::Forward) > 0);
        assert!((vent.position() - 0.1).abs() < 0.01);
    }

    #[test]
    fn out_of_range_request_is_clamped() {
        let (_vent, mut ctx) = rig();
        let mut mover = MoveVent::default();
        mover.enter(&mut ctx).unwrap();
        mover.handle_move_request(&mut ctx, 3.0).unwrap();
        assert_eq!(mover.target(), 1.0);
    }

    #[test]
    fn without_target_pops_immediately() {
        let (vent, mut ctx) = rig();
        let mut mover = MoveVent::default();
        mover.enter(&mut ctx).unwrap();
        assert_eq!(run(&mut mover, &mut ctx), 1);
        assert_eq!(vent.steps(StepDirection::Backward), 0);
    }

    #[test]
    fn new_request_mid_move_retargets() {
        let (vent, mut ctx) = rig();
        ctx.pending_target = Some(0.9);
        let mut mover = MoveVent::default();
        mover.enter(&mut ctx).unwrap();
        mover.update(&mut ctx).unwrap();

        let response = mover.handle_move_request(&mut ctx, 0.2).unwrap();
        assert_eq!(response, MoveResponse::Accepted);
        run(&mut mover, &mut ctx);
        assert!((vent.position() - 0.2).abs() < 0.01);
    }

    #[test]
    fn fine_budget_stops_hunting() {
        let (vent, mut ctx) = rig();
        // A huge overshoot means every correction misses the target.
        ctx.config.mover.overshoot_steps = 20;
        ctx.pending_target = Some(0.3);
        let mut mover = MoveVent::default();
        mover.enter(&mut ctx).unwrap();
        let ticks = run(&mut mover, &mut ctx);
        let budget = ctx.config.mover.fine_update_budget as usize;
        let coarse = 3; // ~150 steps of travel at 50 per tick
        assert!(ticks <= coarse + budget + 1, "took {ticks} ticks");
        assert!(vent.releases() > 0);
    }

    #[test]
    fn retarget_keeps_remaining_fine_budget() {
        let (_vent, mut ctx) = rig();
        ctx.config.mover.overshoot_steps = 20;
        ctx.pending_target = Some(0.3);
        let mut mover = MoveVent::default();
        mover.enter(&mut ctx).unwrap();
        let budget = ctx.config.mover.fine_update_budget;
        assert_eq!(mover.fine_updates_left(), budget);

        for _ in 0..20 {
            if mover.fine_updates_left() < budget {
                break;
            }
            mover.update(&mut ctx).unwrap();
        }
        let left = mover.fine_updates_left();
        assert!(left < budget);

        mover.handle_move_request(&mut ctx, 0.31).unwrap();
        assert_eq!(mover.target(), 0.31);
        assert_eq!(mover.fine_updates_left(), left);

        // A fresh entry starts with the full budget again.
        mover.enter(&mut ctx).unwrap();
        assert_eq!(mover.fine_updates_left(), budget);
    }
}
