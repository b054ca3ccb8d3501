//! Top-level states and machine builder.
//!
//! ```text
//!            [StartClosing]                [move request accepted]
//!  IDLE ───────────────────▶ VENT_CLOSER ───────────push──────────▶ MOVE_VENT
//!   ▲ │                        (child machine)  ◀───pop (resume)──────┘
//!   │ └──────────push──────────────────────────────────────────────▶ MOVE_VENT
//!   │                                                                  │
//!   └──────────────────────────pop (resume)────────────────────────────┘
//!
//!  Any state ──[Stop]──▶ IDLE  (stack cleared)
//!  Any state ──[SelfTest]──▶ SELF_TEST  (stack cleared, runs until Stop)
//! ```

use log::info;

use super::closer::VentCloser;
use super::context::{Indicator, VentContext};
use super::mover::MoveVent;
use super::self_test::SelfTest;
use super::{Machine, MoveResponse, State, StateKey, Transition};
use crate::error::Result;

/// States of the top-level machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VentStateId {
    Idle,
    Closer,
    MoveVent,
    SelfTest,
}

impl StateKey for VentStateId {
    fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Closer => "vent_closer",
            Self::MoveVent => "move_vent",
            Self::SelfTest => "self_test",
        }
    }
}

/// Build the top-level machine.  Called once at startup; the machine has
/// no current state until the service sets one.
pub fn build_machine() -> Result<Machine<VentStateId, VentContext>> {
    let mut machine = Machine::new("vent");
    machine.add_state(VentStateId::Idle, Box::new(Idle))?;
    machine.add_state(VentStateId::Closer, Box::new(VentCloser::new()?))?;
    machine.add_state(VentStateId::MoveVent, Box::new(MoveVent::default()))?;
    machine.add_state(VentStateId::SelfTest, Box::new(SelfTest::new()?))?;
    Ok(machine)
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE state
// ═══════════════════════════════════════════════════════════════════════════

/// Motor released, vent free to move by hand.  Position is still tracked.
struct Idle;

impl State<VentStateId, VentContext> for Idle {
    fn enter(&mut self, ctx: &mut VentContext) -> Result<()> {
        ctx.hardware.release();
        ctx.set_indicator(Indicator::Off);
        info!("idle at {:.3}", ctx.sample_position());
        Ok(())
    }

    fn update(&mut self, ctx: &mut VentContext) -> Result<Option<Transition<VentStateId>>> {
        ctx.sample_position();
        Ok(None)
    }

    fn handle_move_request(
        &mut self,
        ctx: &mut VentContext,
        position: f32,
    ) -> Result<MoveResponse<VentStateId>> {
        ctx.pending_target = Some(position);
        Ok(MoveResponse::AcceptedWith(Transition::Push(VentStateId::MoveVent)))
    }
}
