//! Blackboard threaded through every connectivity handler.
//!
//! The poll loop writes network facts and round-trip outcomes into
//! [`LinkContext`] before each tick and reads [`LinkRequests`] back after
//! it.  Handlers never perform I/O themselves.

use core::net::Ipv4Addr;

use crate::config::AgentConfig;

// ---------------------------------------------------------------------------
// Round-trip outcomes (written by the poll loop, consumed by handlers)
// ---------------------------------------------------------------------------

/// Result of a master config pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullOutcome {
    /// Config received.  `credentials_changed` means new AP credentials
    /// were stored and the station must reconnect with them.
    Success { credentials_changed: bool },
    Failed,
}

// ---------------------------------------------------------------------------
// Requests (written by handlers, executed by the poll loop)
// ---------------------------------------------------------------------------

/// I/O the handlers want performed after this tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkRequests {
    /// (Re)start the station with the configured SSID.
    pub connect_station: bool,
    /// `GET /api/config` on the master.
    pub pull_config: bool,
    /// `POST /api/register` on the master.
    pub register: bool,
    /// Start a public time sync (autonomous devices).
    pub sync_time: bool,
}

impl LinkRequests {
    pub fn any(&self) -> bool {
        self.connect_station || self.pull_config || self.register || self.sync_time
    }
}

// ---------------------------------------------------------------------------
// LinkContext
// ---------------------------------------------------------------------------

pub struct LinkContext {
    // -- Timing --
    /// Monotonic milliseconds, updated before each tick.
    pub now_ms: u64,
    pub ticks_in_state: u64,
    pub total_ticks: u64,

    // -- Device facts --
    pub autonomous: bool,
    /// Master AP password differs from the factory default.
    pub provisioned: bool,
    /// A station SSID is configured.
    pub has_station_ssid: bool,

    // -- Network facts --
    /// Address from the last "address acquired" event; cleared on reconnect.
    pub local_ip: Option<Ipv4Addr>,

    // -- In-flight flags --
    pub awaiting_config: bool,
    pub awaiting_registration: bool,
    /// A config pull succeeded since the station last connected.
    pub config_pulled: bool,

    // -- Outcomes --
    pub config_outcome: Option<PullOutcome>,
    pub register_outcome: Option<bool>,

    // -- Polling gates --
    pub last_config_attempt_ms: Option<u64>,
    pub last_register_attempt_ms: Option<u64>,
    /// When the current join attempt was requested.
    pub last_join_attempt_ms: Option<u64>,
    pub config_pull_interval_ms: u32,
    pub register_interval_ms: u32,

    // -- Output --
    pub requests: LinkRequests,
}

impl LinkContext {
    pub fn new(config: &AgentConfig) -> Self {
        Self {
            now_ms: 0,
            ticks_in_state: 0,
            total_ticks: 0,
            autonomous: false,
            provisioned: false,
            has_station_ssid: false,
            local_ip: None,
            awaiting_config: false,
            awaiting_registration: false,
            config_pulled: false,
            config_outcome: None,
            register_outcome: None,
            last_config_attempt_ms: None,
            last_register_attempt_ms: None,
            last_join_attempt_ms: None,
            config_pull_interval_ms: config.config_pull_interval_ms,
            register_interval_ms: config.register_interval_ms,
            requests: LinkRequests::default(),
        }
    }

    /// Station has an address.
    pub fn is_online(&self) -> bool {
        self.local_ip.is_some()
    }

    /// Drop every in-flight flag, pending outcome and polling gate.
    pub fn reset_in_flight(&mut self) {
        self.awaiting_config = false;
        self.awaiting_registration = false;
        self.config_pulled = false;
        self.config_outcome = None;
        self.register_outcome = None;
        self.last_config_attempt_ms = None;
        self.last_register_attempt_ms = None;
        self.requests.pull_config = false;
        self.requests.register = false;
    }

    /// Hand the pending requests to the caller, clearing them.
    pub fn take_requests(&mut self) -> LinkRequests {
        core::mem::take(&mut self.requests)
    }

    pub(super) fn due(last: Option<u64>, interval_ms: u32, now_ms: u64) -> bool {
        last.is_none_or(|t| now_ms.saturating_sub(t) >= u64::from(interval_ms))
    }
}
