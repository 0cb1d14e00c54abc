//! Bounded FIFO with per-message retry and linear backoff.
//!
//! ```text
//!  enqueue ──▶ [ m0 | m1 | m2 | … ] ──▶ tick: attempt m0
//!                                            │
//!                  ┌── 200 ─────────────────┤ pop, delay = base
//!                  ├── fail, tries < max ───┤ keep, delay += step (≤ ceiling)
//!                  └── fail, tries == max ──┘ pop, failed += 1
//! ```
//!
//! Only the head is ever in flight.  Counters report totals since the
//! queue was last empty and reset when it drains.

use log::{debug, info, warn};

use super::message::{Message, MessageKind};
use crate::config::AgentConfig;
use crate::error::TransportError;

/// Default number of queued messages.
pub const DEFAULT_CAPACITY: usize = 20;

/// Something that can deliver the head message.
pub trait MessageSender {
    /// Delivery preconditions hold (backend configured, link up, …).
    fn ready(&self) -> bool;

    /// Attempt delivery; returns the HTTP status.
    fn send(&mut self, message: &Message) -> Result<u16, TransportError>;
}

/// Retry limits and linear backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retry: u8,
    pub base_delay_ms: u32,
    pub step_ms: u32,
    pub max_delay_ms: u32,
}

impl RetryPolicy {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            max_retry: config.max_retry.max(1),
            base_delay_ms: config.base_delay_ms,
            step_ms: config.delay_step_ms,
            max_delay_ms: config.max_delay_ms.max(config.base_delay_ms),
        }
    }

    fn next_delay(&self, current: u32) -> u32 {
        current.saturating_add(self.step_ms).min(self.max_delay_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&AgentConfig::default())
    }
}

/// Since-last-drain health counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryCounters {
    /// Dropped at enqueue because the queue was full.
    pub lost: u32,
    /// Dropped after exhausting retries.
    pub failed: u32,
    /// Attempts beyond the first.
    pub retried: u32,
}

/// Result of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered {
        kind: MessageKind,
        attempts: u8,
    },
    Retrying {
        kind: MessageKind,
        attempts: u8,
        next_delay_ms: u32,
    },
    Dropped {
        kind: MessageKind,
        attempts: u8,
    },
}

/// The delivery queue.  Capacity is fixed at compile time.
pub struct DeliveryQueue<const N: usize = DEFAULT_CAPACITY> {
    messages: heapless::Deque<Message, N>,
    counters: DeliveryCounters,
    policy: RetryPolicy,
    current_delay_ms: u32,
    last_attempt_ms: Option<u64>,
}

impl<const N: usize> DeliveryQueue<N> {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            messages: heapless::Deque::new(),
            counters: DeliveryCounters::default(),
            policy,
            current_delay_ms: policy.base_delay_ms,
            last_attempt_ms: None,
        }
    }

    /// Append a message.  A full queue discards it and bumps `lost`;
    /// returns whether the message was accepted.
    pub fn enqueue(&mut self, kind: MessageKind, body: String, now_ms: u64) -> bool {
        match self.messages.push_back(Message::new(kind, body, now_ms)) {
            Ok(()) => {
                debug!("Queue: enqueued ({}/{})", self.messages.len(), N);
                true
            }
            Err(rejected) => {
                self.counters.lost = self.counters.lost.saturating_add(1);
                warn!(
                    "Queue: full, dropping {} message (lost={})",
                    rejected.kind().collection(),
                    self.counters.lost
                );
                false
            }
        }
    }

    /// Attempt the head message if preconditions hold and the backoff
    /// delay has elapsed.  Returns `None` when nothing was attempted.
    pub fn tick(&mut self, now_ms: u64, sender: &mut impl MessageSender) -> Option<DeliveryOutcome> {
        if self.messages.is_empty() || !sender.ready() {
            return None;
        }
        if let Some(last) = self.last_attempt_ms {
            if now_ms.saturating_sub(last) < u64::from(self.current_delay_ms) {
                return None;
            }
        }

        let policy = self.policy;
        let head = self.messages.front_mut()?;
        let attempts = head.record_attempt();
        self.last_attempt_ms = Some(now_ms);

        let result = sender.send(head);
        let kind = head.kind().clone();

        let outcome = match result {
            Ok(200) => {
                self.messages.pop_front();
                self.current_delay_ms = policy.base_delay_ms;
                info!("Queue: delivered {} after {} attempt(s)", kind.collection(), attempts);
                DeliveryOutcome::Delivered { kind, attempts }
            }
            other => {
                match other {
                    Ok(status) => warn!("Queue: {} rejected with HTTP {}", kind.collection(), status),
                    Err(e) => warn!("Queue: {} not sent: {}", kind.collection(), e),
                }
                if attempts >= policy.max_retry {
                    self.messages.pop_front();
                    self.counters.failed = self.counters.failed.saturating_add(1);
                    self.current_delay_ms = policy.base_delay_ms;
                    warn!(
                        "Queue: giving up on {} after {} attempts (failed={})",
                        kind.collection(),
                        attempts,
                        self.counters.failed
                    );
                    DeliveryOutcome::Dropped { kind, attempts }
                } else {
                    self.counters.retried = self.counters.retried.saturating_add(1);
                    self.current_delay_ms = policy.next_delay(self.current_delay_ms);
                    DeliveryOutcome::Retrying {
                        kind,
                        attempts,
                        next_delay_ms: self.current_delay_ms,
                    }
                }
            }
        };

        if self.messages.is_empty() {
            self.counters = DeliveryCounters::default();
        }
        Some(outcome)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn capacity(&self) -> usize {
        N
    }

    pub fn counters(&self) -> DeliveryCounters {
        self.counters
    }

    /// Delay that must elapse after the last attempt before the next one.
    pub fn current_delay_ms(&self) -> u32 {
        self.current_delay_ms
    }

    /// Head message, if any.
    pub fn peek(&self) -> Option<&Message> {
        self.messages.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }
}

impl<const N: usize> Default for DeliveryQueue<N> {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}
