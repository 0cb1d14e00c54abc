//! Reliable, bounded delivery of outbound telemetry.
//!
//! ```text
//!   application ──▶ Outbox ──▶ DeliveryQueue ──tick──▶ BackendSender ──▶ HttpTransport
//! ```
//!
//! Bodies are composed when a message is enqueued, so the queue only ever
//! stores finished JSON.  Loss is expected under sustained outage and is
//! counted rather than reported as an error.

pub mod backend;
pub mod message;
pub mod queue;

pub use backend::{BackendSender, CommonFields};
pub use message::{Message, MessageKind};
pub use queue::{DEFAULT_CAPACITY, DeliveryCounters, DeliveryOutcome, DeliveryQueue, MessageSender, RetryPolicy};

use serde_json::{Map, Value};

/// Handle through which application code defers telemetry.
///
/// Every method composes the body immediately and enqueues it; the
/// return value says whether the queue accepted it.
pub struct Outbox<'a, const N: usize = DEFAULT_CAPACITY> {
    queue: &'a mut DeliveryQueue<N>,
    common: CommonFields<'a>,
    now_ms: u64,
}

impl<'a, const N: usize> Outbox<'a, N> {
    pub fn new(queue: &'a mut DeliveryQueue<N>, common: CommonFields<'a>, now_ms: u64) -> Self {
        Self { queue, common, now_ms }
    }

    pub fn log(&mut self, message: &str) -> bool {
        let body = backend::text_body(&self.common, message);
        self.queue.enqueue(MessageKind::Log, body, self.now_ms)
    }

    pub fn alert(&mut self, message: &str) -> bool {
        let body = backend::text_body(&self.common, message);
        self.queue.enqueue(MessageKind::Alert, body, self.now_ms)
    }

    /// Health ping with the current queue counters.
    pub fn ping(&mut self) -> bool {
        let body = backend::ping_body(&self.common, self.queue.counters());
        self.queue.enqueue(MessageKind::Ping, body, self.now_ms)
    }

    /// Append to an application collection.
    pub fn custom_event(&mut self, collection: &str, fields: Map<String, Value>) -> bool {
        self.custom(collection, None, fields)
    }

    /// Overwrite a keyed document in an application collection.
    pub fn custom_record(&mut self, collection: &str, id: &str, fields: Map<String, Value>) -> bool {
        self.custom(collection, Some(id), fields)
    }

    fn custom(&mut self, collection: &str, id: Option<&str>, fields: Map<String, Value>) -> bool {
        let Ok(collection) = heapless::String::try_from(collection) else {
            log::warn!("Outbox: collection name too long: {}", collection);
            return false;
        };
        let record_id = match id.map(heapless::String::try_from) {
            None => None,
            Some(Ok(id)) => Some(id),
            Some(Err(())) => {
                log::warn!("Outbox: record id too long for {}", collection);
                return false;
            }
        };
        let body = backend::custom_body(&self.common, fields);
        self.queue
            .enqueue(MessageKind::Custom { collection, record_id }, body, self.now_ms)
    }

    /// Messages currently waiting.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}
