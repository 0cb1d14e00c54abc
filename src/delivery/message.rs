//! The unit of outbound telemetry.

/// Backend collection names.
pub const PING_COLLECTION: &str = "ping";
pub const LOG_COLLECTION: &str = "log";
pub const ALERT_COLLECTION: &str = "alert";
pub const MODULE_COLLECTION: &str = "module";

/// What a message is, which decides where it is delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    Ping,
    Log,
    Alert,
    /// This device's module record, keyed by its MAC.
    ModuleRecord,
    /// Application-defined event (no id) or record (with id).
    Custom {
        collection: heapless::String<24>,
        record_id: Option<heapless::String<32>>,
    },
}

impl MessageKind {
    /// Backend collection this kind is stored under.
    pub fn collection(&self) -> &str {
        match self {
            Self::Ping => PING_COLLECTION,
            Self::Log => LOG_COLLECTION,
            Self::Alert => ALERT_COLLECTION,
            Self::ModuleRecord => MODULE_COLLECTION,
            Self::Custom { collection, .. } => collection,
        }
    }

    /// Records overwrite a keyed document; everything else appends.
    pub fn is_record(&self) -> bool {
        matches!(
            self,
            Self::ModuleRecord
                | Self::Custom {
                    record_id: Some(_),
                    ..
                }
        )
    }
}

/// A serialized payload waiting in the delivery queue.
///
/// The body is fixed at construction; only the retry count changes while
/// the message sits in the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    kind: MessageKind,
    body: String,
    retry_count: u8,
    enqueued_at_ms: u64,
}

impl Message {
    pub fn new(kind: MessageKind, body: String, enqueued_at_ms: u64) -> Self {
        Self {
            kind,
            body,
            retry_count: 0,
            enqueued_at_ms,
        }
    }

    pub fn kind(&self) -> &MessageKind {
        &self.kind
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Delivery attempts made so far.
    pub fn retry_count(&self) -> u8 {
        self.retry_count
    }

    pub fn enqueued_at_ms(&self) -> u64 {
        self.enqueued_at_ms
    }

    pub(super) fn record_attempt(&mut self) -> u8 {
        self.retry_count = self.retry_count.saturating_add(1);
        self.retry_count
    }
}
