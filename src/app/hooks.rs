//! Capability interface for device-specific behaviour.
//!
//! Every agent build supplies one [`AgentHooks`] implementation.  All
//! methods have defaults, so a device only overrides what it needs.

use core::net::Ipv4Addr;

use serde_json::{Map, Value};

use crate::delivery::Outbox;

/// Answer of the application's data handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataReply {
    pub status: u16,
    /// Raw JSON body.  `None` answers with the device snapshot instead.
    pub body: Option<String>,
}

impl DataReply {
    pub fn ok() -> Self {
        Self {
            status: 200,
            body: None,
        }
    }

    pub fn with_body(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: Some(body.into()),
        }
    }
}

pub trait AgentHooks {
    /// Opaque payload placed in the snapshot's `custom` field.
    fn custom_data(&self) -> Option<String> {
        None
    }

    /// Short status string placed in the snapshot's `globalStatus` field.
    fn global_status(&self) -> Option<String> {
        None
    }

    /// Handle a local `PUT|POST /api/data` body.
    fn use_data(&mut self, body: &str) -> DataReply {
        let _ = body;
        DataReply::ok()
    }

    /// Handle an inbound SMS.  `true` answers with the snapshot, `false`
    /// with an empty 500.
    fn process_sms(&mut self, phone_number: &str, is_admin: bool, message: &str) -> bool {
        let _ = (phone_number, is_admin, message);
        false
    }

    /// Last word before entering the OTA wait state.
    fn before_ota(&mut self) -> bool {
        true
    }

    fn on_registered(&mut self, ok: bool) {
        let _ = ok;
    }

    fn on_got_config(&mut self, ok: bool) {
        let _ = ok;
    }

    fn on_got_address(&mut self, ip: Ipv4Addr) {
        let _ = ip;
    }

    /// Extra fields merged into the module record.
    fn module_record_fields(&self, fields: &mut Map<String, Value>) {
        let _ = fields;
    }

    /// Called once per poll cycle when no OTA is active.
    fn custom_loop(&mut self, now_ms: u64, outbox: &mut Outbox<'_>) {
        let _ = (now_ms, outbox);
    }
}

/// A device with no custom behaviour.
pub struct NoHooks;

impl AgentHooks for NoHooks {}
