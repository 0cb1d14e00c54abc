//! Millisecond timer engine.
//!
//! The poll loop owns one [`Scheduler`] and ticks it every cycle.  When a
//! schedule is due the scheduler notifies a [`SchedulerDelegate`] with the
//! schedule's [`Trigger`]; it knows nothing about what the trigger does.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │  Scheduler                                           │
//! │  ┌──────────────┐  ┌──────────────┐  ┌────────────┐  │
//! │  │ Ping         │  │ MasterRefresh│  │ Restart    │  │
//! │  │ periodic 5m  │  │ periodic 5s  │  │ one-shot   │  │
//! │  └──────┬───────┘  └──────┬───────┘  └─────┬──────┘  │
//! │         └─────────────────┼────────────────┘         │
//! │                           ▼                          │
//! │                  SchedulerDelegate                   │
//! └──────────────────────────────────────────────────────┘
//! ```

use crate::app::ports::{ScheduleFiredKind, SchedulerDelegate};
use log::{debug, info};

// ═══════════════════════════════════════════════════════════════
//  Schedule types
// ═══════════════════════════════════════════════════════════════

/// What a schedule is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Enqueue a health ping.
    Ping,
    /// Retry a pending refresh push to the master.
    MasterRefresh,
    /// Reboot after an `/api/restart` answer has been flushed.
    Restart,
}

#[derive(Debug, Clone)]
pub struct Schedule {
    pub label: &'static str,
    pub trigger: Trigger,
    pub kind: ScheduleKind,
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleKind {
    /// Fire every `interval_ms`.
    Periodic { interval_ms: u32 },
    /// Fire once after `delay_ms`, then free the slot.
    OneShot { delay_ms: u32 },
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler engine
// ═══════════════════════════════════════════════════════════════

/// Maximum number of concurrent schedules (stack-allocated).
const MAX_SCHEDULES: usize = 4;

pub struct Scheduler {
    schedules: [Option<ScheduleEntry>; MAX_SCHEDULES],
    enabled: bool,
}

#[derive(Debug, Clone)]
struct ScheduleEntry {
    schedule: Schedule,
    /// When the schedule was added or last fired.
    anchor_ms: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            schedules: [None, None, None, None],
            enabled: true,
        }
    }

    /// Add a schedule, counting from `now_ms`.  Returns the slot index, or
    /// `None` if full.
    pub fn add(&mut self, schedule: Schedule, now_ms: u64) -> Option<usize> {
        for (i, slot) in self.schedules.iter_mut().enumerate() {
            if slot.is_none() {
                info!("Scheduler: added '{}' at slot {}", schedule.label, i);
                *slot = Some(ScheduleEntry {
                    schedule,
                    anchor_ms: now_ms,
                });
                return Some(i);
            }
        }
        None
    }

    pub fn remove(&mut self, slot: usize) {
        if slot < MAX_SCHEDULES {
            if let Some(entry) = &self.schedules[slot] {
                info!("Scheduler: removed '{}' from slot {}", entry.schedule.label, slot);
            }
            self.schedules[slot] = None;
        }
    }

    /// Slot of the first schedule with this trigger.
    pub fn find(&self, trigger: Trigger) -> Option<usize> {
        self.schedules
            .iter()
            .position(|s| s.as_ref().is_some_and(|e| e.schedule.trigger == trigger))
    }

    pub fn contains(&self, trigger: Trigger) -> bool {
        self.find(trigger).is_some()
    }

    /// Enable or disable the entire scheduler.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Fire every due schedule through `delegate`.  One-shot schedules free
    /// their slot after firing.
    pub fn tick(&mut self, now_ms: u64, delegate: &mut dyn SchedulerDelegate) {
        if !self.enabled {
            return;
        }

        for slot in &mut self.schedules {
            let Some(entry) = slot.as_mut().filter(|e| e.schedule.enabled) else {
                continue;
            };
            let elapsed = now_ms.saturating_sub(entry.anchor_ms);
            let kind = entry.schedule.kind;

            match kind {
                ScheduleKind::Periodic { interval_ms } => {
                    if elapsed >= u64::from(interval_ms) {
                        debug!("Scheduler: '{}' periodic fire", entry.schedule.label);
                        entry.anchor_ms = now_ms;
                        delegate.on_schedule_fired(entry.schedule.trigger, ScheduleFiredKind::Periodic);
                    }
                }
                ScheduleKind::OneShot { delay_ms } => {
                    if elapsed >= u64::from(delay_ms) {
                        info!("Scheduler: '{}' one-shot fire", entry.schedule.label);
                        let trigger = entry.schedule.trigger;
                        *slot = None;
                        delegate.on_schedule_fired(trigger, ScheduleFiredKind::OneShot);
                    }
                }
            }
        }
    }

    /// Number of occupied slots.
    pub fn active_count(&self) -> usize {
        self.schedules.iter().filter(|s| s.is_some()).count()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────
