//! Hierarchical, interruptible state machine engine.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │  Machine<K, C>                                            │
//! │  ┌──────────────┬────────────────────────────────────┐    │
//! │  │ key K        │ Box<dyn State<K, C>>               │    │
//! │  ├──────────────┼────────────────────────────────────┤    │
//! │  │ Idle         │ enter · exit · update · resume     │    │
//! │  │ VentCloser ──┼──▶ owns a child Machine<..>        │    │
//! │  │ MoveVent     │ handle_move_request                │    │
//! │  └──────────────┴────────────────────────────────────┘    │
//! │  current ─ previous ─ stack [suspended keys, LIFO]        │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick the engine calls `update` on the **current** state.  The state
//! answers with an optional [`Transition`] which the engine applies:
//!
//! * `Set(k)`  exit current, enter `k`, stack untouched
//! * `Push(k)` suspend current on the stack, then `Set(k)`
//! * `Pop`     exit current, return to the suspended state via `resume`
//!
//! The key type is a closed enum per machine, so a bad key is usually a
//! compile error; keys that were never registered are still caught at
//! runtime and reported as [`FsmError::UnknownState`].
//!
//! The context `C` is the typed blackboard every hook receives.  A state can
//! own a private child `Machine` over the same context and delegate to it;
//! that is how the vent closer nests its four sub-states.

pub mod closer;
pub mod context;
pub mod mover;
pub mod states;

use core::fmt::Debug;

use heapless::Vec as StackVec;
use log::{info, warn};

use crate::error::{FsmError, Result};

/// Depth of the suspended-state stack.
pub const STACK_DEPTH: usize = 8;

// ---------------------------------------------------------------------------
// Keys, transitions, responses
// ---------------------------------------------------------------------------

/// Identity of a state inside one machine.
pub trait StateKey: Copy + Eq + Debug + 'static {
    /// Stable name for logs and status publication.
    fn name(self) -> &'static str;
}

/// Transition requested by a state hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition<K> {
    Set(K),
    Push(K),
    Pop,
}

/// A state's answer to an external move request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveResponse<K> {
    Rejected,
    Accepted,
    /// Accepted, and the machine must apply this transition to act on it.
    AcceptedWith(Transition<K>),
}

impl<K> MoveResponse<K> {
    pub fn is_accepted(&self) -> bool {
        !matches!(self, Self::Rejected)
    }
}

// ---------------------------------------------------------------------------
// State trait
// ---------------------------------------------------------------------------

/// Lifecycle hooks of one state.
pub trait State<K: StateKey, C> {
    /// First entry, via `set_state` or `push_state`.
    fn enter(&mut self, ctx: &mut C) -> Result<()>;

    fn exit(&mut self, _ctx: &mut C) {}

    /// Re-entry after a state pushed over this one was popped.
    fn resume(&mut self, ctx: &mut C) -> Result<()> {
        self.enter(ctx)
    }

    fn update(&mut self, ctx: &mut C) -> Result<Option<Transition<K>>>;

    /// External request to move the vent to `position`.
    fn handle_move_request(&mut self, _ctx: &mut C, _position: f32) -> Result<MoveResponse<K>> {
        Ok(MoveResponse::Rejected)
    }

    /// Name of the active state of an owned child machine, if any.
    fn sub_state(&self) -> Option<&'static str> {
        None
    }
}

// ---------------------------------------------------------------------------
// Machine
// ---------------------------------------------------------------------------

type Entry<K, C> = (K, Box<dyn State<K, C>>);

/// The state machine engine.
pub struct Machine<K: StateKey, C> {
    label: &'static str,
    states: Vec<Entry<K, C>>,
    current: Option<K>,
    previous: Option<K>,
    stack: StackVec<K, STACK_DEPTH>,
    /// Monotonically increasing tick counter.
    tick_count: u64,
    /// Tick at which the current state was entered.
    state_entry_tick: u64,
}

impl<K: StateKey, C> Machine<K, C> {
    /// An empty machine.  `label` prefixes its log lines.
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            states: Vec::new(),
            current: None,
            previous: None,
            stack: StackVec::new(),
            tick_count: 0,
            state_entry_tick: 0,
        }
    }

    /// Register `state` under `key`.  Each key may be registered once.
    pub fn add_state(&mut self, key: K, state: Box<dyn State<K, C>>) -> Result<()> {
        if self.contains(key) {
            return Err(FsmError::DuplicateState(key.name()).into());
        }
        self.states.push((key, state));
        Ok(())
    }

    pub fn contains(&self, key: K) -> bool {
        self.states.iter().any(|(k, _)| *k == key)
    }

    /// Exit the current state and enter `key`.  The stack is not touched.
    pub fn set_state(&mut self, key: K, ctx: &mut C) -> Result<()> {
        let idx = self.index_of(key)?;
        info!(
            "{}: {} -> {}",
            self.label,
            self.current.map_or("-", StateKey::name),
            key.name()
        );
        self.exit_current(ctx);
        self.make_current(key);
        self.states[idx].1.enter(ctx)
    }

    /// Suspend the current state and enter `key`.
    pub fn push_state(&mut self, key: K, ctx: &mut C) -> Result<()> {
        self.index_of(key)?;
        if let Some(current) = self.current {
            self.stack
                .push(current)
                .map_err(|_| FsmError::StackOverflow(key.name()))?;
        }
        self.set_state(key, ctx)
    }

    /// Return to the most recently suspended state through its `resume`
    /// hook.  With an empty stack this logs and stays put.
    pub fn pop_state(&mut self, ctx: &mut C) -> Result<()> {
        let Some(key) = self.stack.pop() else {
            warn!(
                "{}: pop with empty stack, staying in {}",
                self.label,
                self.current.map_or("-", StateKey::name)
            );
            return Ok(());
        };
        let idx = self.index_of(key)?;
        info!(
            "{}: {} -> {} (resume)",
            self.label,
            self.current.map_or("-", StateKey::name),
            key.name()
        );
        self.exit_current(ctx);
        self.make_current(key);
        self.states[idx].1.resume(ctx)
    }

    /// Drop every suspended state without resuming any of them.
    pub fn clear_stack(&mut self) {
        if !self.stack.is_empty() {
            info!("{}: discarding {} suspended state(s)", self.label, self.stack.len());
        }
        self.stack.clear();
    }

    /// Exit the current state and leave the machine with no current state.
    pub fn stop(&mut self, ctx: &mut C) {
        self.exit_current(ctx);
        self.previous = self.current.take();
        self.stack.clear();
    }

    /// Run the current state's update hook once and apply its transition.
    pub fn update(&mut self, ctx: &mut C) -> Result<()> {
        self.tick_count += 1;
        let Some(key) = self.current else {
            return Ok(());
        };
        let idx = self.index_of(key)?;
        match self.states[idx].1.update(ctx)? {
            Some(transition) => self.apply(transition, ctx),
            None => Ok(()),
        }
    }

    /// Offer a move request to the current state.  Returns whether it was
    /// accepted.
    pub fn handle_move_request(&mut self, ctx: &mut C, position: f32) -> Result<bool> {
        let Some(key) = self.current else {
            return Ok(false);
        };
        let idx = self.index_of(key)?;
        let response = self.states[idx].1.handle_move_request(ctx, position)?;
        if let MoveResponse::AcceptedWith(transition) = response {
            self.apply(transition, ctx)?;
        }
        Ok(response.is_accepted())
    }

    pub fn apply(&mut self, transition: Transition<K>, ctx: &mut C) -> Result<()> {
        match transition {
            Transition::Set(key) => self.set_state(key, ctx),
            Transition::Push(key) => self.push_state(key, ctx),
            Transition::Pop => self.pop_state(ctx),
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn current_state(&self) -> Option<K> {
        self.current
    }

    pub fn previous_state(&self) -> Option<K> {
        self.previous
    }

    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    /// Child-machine state of the current state, if it has one.
    pub fn current_sub_state(&self) -> Option<&'static str> {
        let key = self.current?;
        self.states
            .iter()
            .find(|(k, _)| *k == key)
            .and_then(|(_, s)| s.sub_state())
    }

    /// How many ticks the machine has been in the current state.
    pub fn ticks_in_current_state(&self) -> u64 {
        self.tick_count - self.state_entry_tick
    }

    // ── Internal ──────────────────────────────────────────────

    fn index_of(&self, key: K) -> Result<usize> {
        self.states
            .iter()
            .position(|(k, _)| *k == key)
            .ok_or_else(|| FsmError::UnknownState(key.name()).into())
    }

    fn exit_current(&mut self, ctx: &mut C) {
        let Some(current) = self.current else {
            return;
        };
        if let Some((_, state)) = self.states.iter_mut().find(|(k, _)| *k == current) {
            state.exit(ctx);
        }
    }

    fn make_current(&mut self, key: K) {
        self.previous = self.current;
        self.current = Some(key);
        self.state_entry_tick = self.tick_count;
    }
}
