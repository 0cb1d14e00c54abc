//! Connectivity state handlers and table builder.
//!
//! ```text
//!  DISCONNECTED ──[ssid set]──▶ CONNECTING_STATION ──[address]──▶ STATION_CONNECTED
//!                                      ▲                               │
//!                                      │                     [non-autonomous, not pulled]
//!                         [AP credentials changed]                     ▼
//!                                      └─────────────────────── AWAITING_MASTER_CONFIG
//!                                                                      │
//!                                          [pulled, provisioned]  [pulled, factory AP]
//!                                                  ▼                   └──▶ STATION_CONNECTED
//!                                       AWAITING_REGISTRATION
//!                                                  │ [registered]
//!                                                  ▼
//!                                             REGISTERED
//!
//!  Any connected state ──[disconnected]──▶ CONNECTING_STATION   (forced by the poll loop)
//! ```

use log::{debug, info, warn};

use super::context::{LinkContext, PullOutcome};
use super::{LinkState, StateDescriptor};

/// A join that produced no address by now is re-issued.
pub const JOIN_RETRY_MS: u32 = 15_000;

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

pub fn build_state_table() -> [StateDescriptor; LinkState::COUNT] {
    [
        // Index 0 — Disconnected
        StateDescriptor {
            id: LinkState::Disconnected,
            name: "Disconnected",
            on_enter: None,
            on_exit: None,
            on_update: disconnected_update,
        },
        // Index 1 — ConnectingStation
        StateDescriptor {
            id: LinkState::ConnectingStation,
            name: "ConnectingStation",
            on_enter: Some(connecting_enter),
            on_exit: None,
            on_update: connecting_update,
        },
        // Index 2 — StationConnected
        StateDescriptor {
            id: LinkState::StationConnected,
            name: "StationConnected",
            on_enter: Some(station_connected_enter),
            on_exit: None,
            on_update: station_connected_update,
        },
        // Index 3 — AwaitingMasterConfig
        StateDescriptor {
            id: LinkState::AwaitingMasterConfig,
            name: "AwaitingMasterConfig",
            on_enter: Some(awaiting_config_enter),
            on_exit: Some(awaiting_config_exit),
            on_update: awaiting_config_update,
        },
        // Index 4 — AwaitingRegistration
        StateDescriptor {
            id: LinkState::AwaitingRegistration,
            name: "AwaitingRegistration",
            on_enter: Some(awaiting_registration_enter),
            on_exit: Some(awaiting_registration_exit),
            on_update: awaiting_registration_update,
        },
        // Index 5 — Registered
        StateDescriptor {
            id: LinkState::Registered,
            name: "Registered",
            on_enter: Some(registered_enter),
            on_exit: None,
            on_update: registered_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  DISCONNECTED
// ═══════════════════════════════════════════════════════════════════════════

fn disconnected_update(ctx: &mut LinkContext) -> Option<LinkState> {
    // Without an SSID there is nothing to join.
    ctx.has_station_ssid.then_some(LinkState::ConnectingStation)
}

// ═══════════════════════════════════════════════════════════════════════════
//  CONNECTING_STATION
// ═══════════════════════════════════════════════════════════════════════════

fn connecting_enter(ctx: &mut LinkContext) {
    ctx.reset_in_flight();
    ctx.local_ip = None;
    ctx.requests.connect_station = true;
    ctx.last_join_attempt_ms = Some(ctx.now_ms);
    info!("LINK: joining station network");
}

fn connecting_update(ctx: &mut LinkContext) -> Option<LinkState> {
    if ctx.local_ip.is_some() {
        return Some(LinkState::StationConnected);
    }
    if LinkContext::due(ctx.last_join_attempt_ms, JOIN_RETRY_MS, ctx.now_ms) {
        warn!("LINK: no address after {} ms, joining again", JOIN_RETRY_MS);
        ctx.requests.connect_station = true;
        ctx.last_join_attempt_ms = Some(ctx.now_ms);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  STATION_CONNECTED
// ═══════════════════════════════════════════════════════════════════════════

fn station_connected_enter(ctx: &mut LinkContext) {
    if let Some(ip) = ctx.local_ip {
        info!("LINK: station up, address {}", ip);
    }
    if ctx.autonomous {
        ctx.requests.sync_time = true;
    }
}

fn station_connected_update(ctx: &mut LinkContext) -> Option<LinkState> {
    if ctx.autonomous || ctx.config_pulled {
        return None;
    }
    Some(LinkState::AwaitingMasterConfig)
}

// ═══════════════════════════════════════════════════════════════════════════
//  AWAITING_MASTER_CONFIG
// ═══════════════════════════════════════════════════════════════════════════

fn awaiting_config_enter(ctx: &mut LinkContext) {
    ctx.awaiting_config = true;
}

fn awaiting_config_exit(ctx: &mut LinkContext) {
    ctx.awaiting_config = false;
}

fn awaiting_config_update(ctx: &mut LinkContext) -> Option<LinkState> {
    match ctx.config_outcome.take() {
        Some(PullOutcome::Success {
            credentials_changed: true,
        }) => {
            info!("LINK: master AP credentials changed, reconnecting");
            return Some(LinkState::ConnectingStation);
        }
        Some(PullOutcome::Success { .. }) => {
            ctx.config_pulled = true;
            return if ctx.provisioned {
                Some(LinkState::AwaitingRegistration)
            } else {
                debug!("LINK: master AP still on factory password, not registering");
                Some(LinkState::StationConnected)
            };
        }
        Some(PullOutcome::Failed) => {
            warn!("LINK: config pull failed, retrying in {} ms", ctx.config_pull_interval_ms);
        }
        None => {}
    }

    if LinkContext::due(ctx.last_config_attempt_ms, ctx.config_pull_interval_ms, ctx.now_ms) {
        ctx.last_config_attempt_ms = Some(ctx.now_ms);
        ctx.requests.pull_config = true;
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  AWAITING_REGISTRATION
// ═══════════════════════════════════════════════════════════════════════════

fn awaiting_registration_enter(ctx: &mut LinkContext) {
    ctx.awaiting_registration = true;
}

fn awaiting_registration_exit(ctx: &mut LinkContext) {
    ctx.awaiting_registration = false;
}

fn awaiting_registration_update(ctx: &mut LinkContext) -> Option<LinkState> {
    match ctx.register_outcome.take() {
        Some(true) => return Some(LinkState::Registered),
        Some(false) => warn!("LINK: registration refused, retrying in {} ms", ctx.register_interval_ms),
        None => {}
    }

    if LinkContext::due(ctx.last_register_attempt_ms, ctx.register_interval_ms, ctx.now_ms) {
        ctx.last_register_attempt_ms = Some(ctx.now_ms);
        ctx.requests.register = true;
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  REGISTERED
// ═══════════════════════════════════════════════════════════════════════════

fn registered_enter(_ctx: &mut LinkContext) {
    info!("LINK: registered with master");
}

fn registered_update(_ctx: &mut LinkContext) -> Option<LinkState> {
    None
}
