//! Firmware-update lifecycle.
//!
//! ```text
//!  Idle ──[start, guard ok]──▶ WaitingForConnection ──[OtaStarted]──▶ UpdateInProgress
//!   ▲            │                  │   ▲                                  │    │
//!   └─[guard ✗]──┘        [timeout] │   └──────────[OtaError]──────────────┘    │
//!                                   ▼                                           ▼
//!                             Reboot (once)                       [OtaEnd] Reboot (once)
//! ```
//!
//! A failed transfer goes back to waiting with a fresh timer, so the
//! device either gets another image or reboots.
//!
//! The transfer itself belongs to the platform's OTA server; this module
//! only tracks where the device is in the lifecycle so the poll loop can
//! suppress everything else, and guarantees a device never waits forever.
//! A successful transfer ends in a reboot issued by the poll loop, which
//! resets this machine implicitly.

use log::{info, warn};

use crate::events::{Event, OtaFailure};

/// Status returned by [`OtaMachine::start`] when the update may proceed.
pub const OTA_ACCEPTED: u16 = 200;
/// Status returned by [`OtaMachine::start`] when the application refuses.
pub const OTA_REJECTED: u16 = 403;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtaState {
    Idle,
    WaitingForConnection { since_ms: u64 },
    UpdateInProgress,
}

/// Something the poll loop must act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtaAction {
    /// Waited too long for the update to begin; reboot now.
    Reboot,
}

/// Observable effect of an OTA transport event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtaSignal {
    Started,
    /// Whole percent, emitted only when it changes.
    Progress(u8),
    Failed(OtaFailure),
    Finished,
}

pub struct OtaMachine {
    state: OtaState,
    timeout_ms: u64,
    reboot_issued: bool,
    last_percent: Option<u8>,
}

impl OtaMachine {
    pub fn new(timeout_secs: u32) -> Self {
        Self {
            state: OtaState::Idle,
            timeout_ms: u64::from(timeout_secs) * 1_000,
            reboot_issued: false,
            last_percent: None,
        }
    }

    pub fn state(&self) -> OtaState {
        self.state
    }

    /// Waiting for or running an update; the poll loop suppresses every
    /// other component while this holds.
    pub fn is_active(&self) -> bool {
        self.state != OtaState::Idle
    }

    /// Enter the waiting state if the application allows it.  Returns
    /// [`OTA_ACCEPTED`] or [`OTA_REJECTED`].  Calling again while already
    /// active keeps the current state and timer.
    pub fn start(&mut self, allowed: bool, now_ms: u64) -> u16 {
        if self.is_active() {
            info!("OTA: already active ({:?})", self.state);
            return OTA_ACCEPTED;
        }
        if !allowed {
            warn!("OTA: refused by application");
            return OTA_REJECTED;
        }
        info!("OTA: waiting up to {} s for an update", self.timeout_ms / 1_000);
        self.state = OtaState::WaitingForConnection { since_ms: now_ms };
        self.reboot_issued = false;
        self.last_percent = None;
        OTA_ACCEPTED
    }

    /// Advance timers.  Returns [`OtaAction::Reboot`] exactly once when the
    /// wait window expires without the update starting.
    pub fn tick(&mut self, now_ms: u64) -> Option<OtaAction> {
        let OtaState::WaitingForConnection { since_ms } = self.state else {
            return None;
        };
        if self.reboot_issued || now_ms.saturating_sub(since_ms) < self.timeout_ms {
            return None;
        }
        warn!("OTA: no update within {} s, rebooting", self.timeout_ms / 1_000);
        self.reboot_issued = true;
        Some(OtaAction::Reboot)
    }

    /// Feed an OTA transport event.  Non-OTA events are ignored.
    pub fn on_event(&mut self, event: &Event, now_ms: u64) -> Option<OtaSignal> {
        match *event {
            Event::OtaStarted => match self.state {
                OtaState::WaitingForConnection { .. } => {
                    info!("OTA transition: WaitingForConnection -> UpdateInProgress");
                    self.state = OtaState::UpdateInProgress;
                    Some(OtaSignal::Started)
                }
                OtaState::UpdateInProgress => None,
                OtaState::Idle => {
                    warn!("OTA: transfer started while idle, ignored");
                    None
                }
            },
            Event::OtaProgress { done, total } if self.state == OtaState::UpdateInProgress => {
                let pct = progress_percent(done, total);
                if self.last_percent == Some(pct) {
                    return None;
                }
                self.last_percent = Some(pct);
                Some(OtaSignal::Progress(pct))
            }
            Event::OtaError(failure) if self.is_active() => {
                warn!("OTA: transport error: {}", failure);
                if self.state == OtaState::UpdateInProgress && !self.reboot_issued {
                    info!("OTA transition: UpdateInProgress -> WaitingForConnection");
                    self.state = OtaState::WaitingForConnection { since_ms: now_ms };
                    self.last_percent = None;
                }
                Some(OtaSignal::Failed(failure))
            }
            Event::OtaEnd if self.state == OtaState::UpdateInProgress && !self.reboot_issued => {
                info!("OTA: transfer complete");
                self.reboot_issued = true;
                Some(OtaSignal::Finished)
            }
            _ => None,
        }
    }
}

/// Whole percent of `done` over `total`, clamped to 100.
pub fn progress_percent(done: u32, total: u32) -> u8 {
    let pct = if total >= 100 {
        done / (total / 100)
    } else if total > 0 {
        done.saturating_mul(100) / total
    } else {
        0
    };
    pct.min(100) as u8
}

/// Confirm the running image at boot so the bootloader does not roll back.
#[cfg(target_os = "espidf")]
pub fn check_rollback() {
    match esp_ota::mark_app_valid() {
        Ok(()) => info!("OTA: firmware marked valid (rollback cancelled)"),
        Err(e) => warn!("OTA: mark_app_valid failed: {:?}", e),
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn check_rollback() {
    info!("OTA rollback check (simulation): skipped");
}

// ── Tests ─────────────────────────────────────────────────────
