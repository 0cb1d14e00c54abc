//! Connectivity and registration lifecycle.
//!
//! Table-driven state machine: one [`StateDescriptor`] row per state with
//! plain `fn` pointers for enter, exit and update.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  StateTable                                                      │
//! │  ┌──────────────────────┬──────────┬─────────┬─────────────────┐ │
//! │  │ LinkState            │ on_enter │ on_exit │ on_update       │ │
//! │  ├──────────────────────┼──────────┼─────────┼─────────────────┤ │
//! │  │ Disconnected         │ –        │ –       │ ssid set?       │ │
//! │  │ ConnectingStation    │ reset    │ –       │ got address?    │ │
//! │  │ StationConnected     │ time     │ –       │ need config?    │ │
//! │  │ AwaitingMasterConfig │ flag     │ flag    │ pull / outcome  │ │
//! │  │ AwaitingRegistration │ flag     │ flag    │ register / ack  │ │
//! │  │ Registered           │ log      │ –       │ –               │ │
//! │  └──────────────────────┴──────────┴─────────┴─────────────────┘ │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Handlers only read and write the [`LinkContext`]; network I/O is
//! requested through [`LinkRequests`] and performed by the poll loop,
//! which feeds the outcome back before the next tick.

pub mod context;
pub mod states;

pub use context::{LinkContext, LinkRequests, PullOutcome};
use log::info;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Must stay in sync with [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LinkState {
    Disconnected = 0,
    ConnectingStation = 1,
    StationConnected = 2,
    AwaitingMasterConfig = 3,
    AwaitingRegistration = 4,
    Registered = 5,
}

impl LinkState {
    pub const COUNT: usize = 6;

    /// Convert an index back to a state.  Out-of-range indices map to
    /// `Disconnected`.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Disconnected,
            1 => Self::ConnectingStation,
            2 => Self::StationConnected,
            3 => Self::AwaitingMasterConfig,
            4 => Self::AwaitingRegistration,
            5 => Self::Registered,
            _ => {
                debug_assert!(false, "invalid link state index: {idx}");
                Self::Disconnected
            }
        }
    }

    /// The station holds an address in this state.
    pub fn is_connected(self) -> bool {
        !matches!(self, Self::Disconnected | Self::ConnectingStation)
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

pub type StateActionFn = fn(&mut LinkContext);

/// Returns `Some(next)` to transition, `None` to stay.
pub type StateUpdateFn = fn(&mut LinkContext) -> Option<LinkState>;

pub struct StateDescriptor {
    pub id: LinkState,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct LinkMachine {
    table: [StateDescriptor; LinkState::COUNT],
    current: usize,
    tick_count: u64,
    state_entry_tick: u64,
}

impl LinkMachine {
    pub fn new() -> Self {
        Self::with_table(states::build_state_table(), LinkState::Disconnected)
    }

    pub fn with_table(table: [StateDescriptor; LinkState::COUNT], initial: LinkState) -> Self {
        Self {
            table,
            current: initial as usize,
            tick_count: 0,
            state_entry_tick: 0,
        }
    }

    /// Run the initial `on_enter`.  Call once before the first `tick()`.
    pub fn start(&mut self, ctx: &mut LinkContext) {
        info!("Link FSM starting in state: {}", self.table[self.current].name);
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Advance by one tick.  Returns the transition taken, if any.
    pub fn tick(&mut self, ctx: &mut LinkContext) -> Option<(LinkState, LinkState)> {
        self.tick_count += 1;
        ctx.ticks_in_state = self.tick_count - self.state_entry_tick;
        ctx.total_ticks = self.tick_count;

        let from = self.current_state();
        let next = (self.table[self.current].on_update)(ctx)?;
        if next == from {
            return None;
        }
        self.transition(next, ctx);
        Some((from, next))
    }

    /// Jump to `next` regardless of what `on_update` would decide.
    /// Forcing the current state is a no-op.
    pub fn force_transition(&mut self, next: LinkState, ctx: &mut LinkContext) -> Option<(LinkState, LinkState)> {
        let from = self.current_state();
        if next == from {
            return None;
        }
        self.transition(next, ctx);
        Some((from, next))
    }

    pub fn current_state(&self) -> LinkState {
        LinkState::from_index(self.current)
    }

    pub fn ticks_in_current_state(&self) -> u64 {
        self.tick_count - self.state_entry_tick
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next: LinkState, ctx: &mut LinkContext) {
        let next_idx = next as usize;

        info!(
            "Link FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;
        self.state_entry_tick = self.tick_count;
        ctx.ticks_in_state = 0;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}

impl Default for LinkMachine {
    fn default() -> Self {
        Self::new()
    }
}
