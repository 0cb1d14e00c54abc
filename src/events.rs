//! Inbound events from the platform.
//!
//! WiFi, OTA transport and time-sync callbacks run on driver tasks.  They
//! never touch agent state directly; they push an [`Event`] here and the
//! poll loop drains the queue once per cycle.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ WiFi driver │────▶│              │     │              │
//! │ OTA server  │────▶│  EventQueue  │────▶│  Poll loop   │
//! │ SNTP        │────▶│  (bounded)   │     │  (consumer)  │
//! └─────────────┘     └──────────────┘     └──────────────┘
//! ```

use core::cell::Cell;
use core::net::Ipv4Addr;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::warn;

/// Pending events beyond this are dropped.
pub const EVENT_QUEUE_DEPTH: usize = 16;

/// Why the OTA transport gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtaFailure {
    Auth,
    Begin,
    Connect,
    Receive,
    End,
}

impl core::fmt::Display for OtaFailure {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Auth => write!(f, "auth failed"),
            Self::Begin => write!(f, "begin failed"),
            Self::Connect => write!(f, "connect failed"),
            Self::Receive => write!(f, "receive failed"),
            Self::End => write!(f, "end failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // ── Network ───────────────────────────────────────────
    /// The station obtained an address.
    GotAddress { ip: Ipv4Addr },
    /// The station lost its association.
    Disconnected,

    // ── OTA transport ─────────────────────────────────────
    OtaStarted,
    OtaProgress { done: u32, total: u32 },
    OtaError(OtaFailure),
    OtaEnd,

    // ── Time sync ─────────────────────────────────────────
    TimeSynced { unix_secs: i64 },
    TimeSyncFailed,
}

impl Event {
    /// Ends an OTA transfer.  Losing one would leave the agent in OTA mode.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::OtaEnd | Self::OtaError(_))
    }
}

/// Bounded multi-producer queue drained by the poll loop.
///
/// A terminal OTA event that finds the channel full parks in a reserved
/// slot and is handed out once the channel is drained.  While the slot is
/// taken, other overflowing events are dropped as usual.
pub struct EventQueue {
    channel: Channel<CriticalSectionRawMutex, Event, EVENT_QUEUE_DEPTH>,
    terminal: Mutex<CriticalSectionRawMutex, Cell<Option<Event>>>,
}

impl EventQueue {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
            terminal: Mutex::new(Cell::new(None)),
        }
    }

    /// Enqueue without blocking.  Returns `false` if the queue was full and
    /// the event was dropped.
    pub fn push(&self, event: Event) -> bool {
        let parked = self.terminal.lock(|slot| slot.get().is_some());
        if !parked && self.channel.try_send(event).is_ok() {
            return true;
        }
        if event.is_terminal() {
            if let Some(previous) = self.terminal.lock(|slot| slot.replace(Some(event))) {
                warn!("Event queue full, {:?} replaced by {:?}", previous, event);
            }
            return true;
        }
        warn!("Event queue full, dropping {:?}", event);
        false
    }

    pub fn pop(&self) -> Option<Event> {
        self.channel
            .try_receive()
            .ok()
            .or_else(|| self.terminal.lock(|slot| slot.take()))
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty() && self.terminal.lock(|slot| slot.get().is_none())
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
