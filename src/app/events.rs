//! Outbound application events.
//!
//! The [`AgentService`](super::service::AgentService) emits these through
//! the [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them (serial log, test recorder, …).

use crate::connectivity::LinkState;
use crate::delivery::MessageKind;
use crate::events::OtaFailure;
use crate::ota::OtaState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// The service has started (carries the initial link state).
    Started(LinkState),

    /// The connectivity machine transitioned.
    LinkChanged { from: LinkState, to: LinkState },

    /// Outcome of a config pull.
    GotConfig(bool),

    /// Outcome of a registration attempt.
    Registered(bool),

    /// Outcome of a refresh push.
    Refreshed(bool),

    /// Wall clock became valid.
    ClockSet { unix_secs: i64 },

    OtaStateChanged(OtaState),
    OtaProgress(u8),
    OtaFailed(OtaFailure),

    /// A message reached the backend.
    MessageDelivered { kind: MessageKind, attempts: u8 },

    /// A message was dropped after exhausting its retries.
    MessageDropped { kind: MessageKind, attempts: u8 },

    /// A message was refused because the queue was full.
    MessageLost { lost: u32 },

    /// A reboot is about to be issued.
    Restarting,
}
