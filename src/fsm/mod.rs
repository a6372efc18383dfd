//! Function-pointer finite state machine engine.
//!
//! Classic embedded FSM pattern, driven by events instead of ticks:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  StateTable                                                      │
//! │  ┌────────────────────┬──────────┬─────────┬──────────────────┐  │
//! │  │ StateId            │ on_enter │ on_exit │ on_event         │  │
//! │  ├────────────────────┼──────────┼─────────┼──────────────────┤  │
//! │  │ Idle               │ fn(ctx)  │ -       │ fn(ctx,ev)->Opt  │  │
//! │  │ AwaitingConnection │ fn(ctx)  │ -       │ fn(ctx,ev)->Opt  │  │
//! │  │ Operational        │ fn(ctx)  │ fn(ctx) │ fn(ctx,ev)->Opt  │  │
//! │  │ ShuttingDown       │ fn(ctx)  │ -       │ fn(ctx,ev)->Opt  │  │
//! │  └────────────────────┴──────────┴─────────┴──────────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! For each event the engine calls `on_event` for the **current** state.
//! If it returns `Some(next_id)`, the engine runs `on_exit` for the
//! current state, then `on_enter` for the next, and updates the current
//! pointer.  All functions receive `&mut CoreContext`; they record side
//! effects in its outbox and never perform I/O themselves.
//!
//! `ShuttingDown` is terminal: once entered, no transition leaves it.

pub mod context;
pub mod states;

use context::CoreContext;
use log::{info, warn};

use crate::events::Event;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Lifecycle states of the control core.
/// Must stay in sync with the table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StateId {
    Idle = 0,
    AwaitingConnection = 1,
    Operational = 2,
    ShuttingDown = 3,
}

impl StateId {
    /// Total number of states, used to size the table array.
    pub const COUNT: usize = 4;

    /// Convert a table index back to `StateId`.  Panics on out-of-range in
    /// debug builds; returns `ShuttingDown` in release.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Idle,
            1 => Self::AwaitingConnection,
            2 => Self::Operational,
            3 => Self::ShuttingDown,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::ShuttingDown
            }
        }
    }

    pub fn is_terminal(self) -> bool {
        self == Self::ShuttingDown
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
pub type StateActionFn = fn(&mut CoreContext);

/// Signature for the per-event handler.
/// Returns `Some(next)` to trigger a transition, or `None` to stay.
pub type StateEventFn = fn(&mut CoreContext, &Event) -> Option<StateId>;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

pub struct StateDescriptor {
    pub id: StateId,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_event: StateEventFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

/// The finite state machine engine.
pub struct Fsm {
    /// Fixed-size table indexed by `StateId as usize`.
    table: [StateDescriptor; StateId::COUNT],
    /// Index of the currently active state.
    current: usize,
    /// Events dispatched since start.
    event_count: u64,
    /// Event count at which the current state was entered.
    state_entry_event: u64,
}

impl Fsm {
    /// Construct a new FSM with the given state table, starting in `initial`.
    pub fn new(table: [StateDescriptor; StateId::COUNT], initial: StateId) -> Self {
        Self {
            table,
            current: initial as usize,
            event_count: 0,
            state_entry_event: 0,
        }
    }

    /// Run the initial `on_enter` for the starting state.
    /// Call once after construction, before the first `dispatch()`.
    pub fn start(&mut self, ctx: &mut CoreContext) {
        info!("FSM starting in state: {}", self.table[self.current].name);
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Hand one event to the current state and follow the transition it
    /// asks for, if any.
    pub fn dispatch(&mut self, event: &Event, ctx: &mut CoreContext) {
        self.event_count += 1;

        let next = (self.table[self.current].on_event)(ctx, event);

        if let Some(next_id) = next {
            self.transition(next_id, ctx);
        }
    }

    /// Force an immediate transition, bypassing `on_event`.
    pub fn force_transition(&mut self, next: StateId, ctx: &mut CoreContext) {
        self.transition(next, ctx);
    }

    /// The current state's identity.
    pub fn current_state(&self) -> StateId {
        StateId::from_index(self.current)
    }

    /// How many events the FSM has handled in the current state.
    pub fn events_in_current_state(&self) -> u64 {
        self.event_count - self.state_entry_event
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next_id: StateId, ctx: &mut CoreContext) {
        let next_idx = next_id as usize;
        if next_idx == self.current {
            return;
        }
        if self.current_state().is_terminal() {
            warn!(
                "FSM: ignoring transition {} -> {} (terminal)",
                self.table[self.current].name, self.table[next_idx].name
            );
            return;
        }

        info!(
            "FSM transition: {} -> {} (after {} events)",
            self.table[self.current].name,
            self.table[next_idx].name,
            self.events_in_current_state()
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;
        self.state_entry_event = self.event_count;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
