//! JSON envelopes exchanged with the master and with peer agents.
//!
//! Field names follow the wire format (`MAC`, `uiClassName`, `APPwd`, …);
//! the Rust side uses snake_case through `serde(rename)`.

use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Replaces a custom payload at or above the size cap.
pub const CUSTOM_DATA_TOO_BIG: &str = "CUSTOM_DATA_TOO_BIG_REMOVED";

/// Replaces a global status at or above the size cap.
pub const GLOBAL_STATUS_TOO_BIG: &str = "GLOBAL_STATUS_TOO_BIG";

/// Body of every "here I am" message: ping/data answers, register, refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    pub name: String,
    pub ip: String,
    #[serde(rename = "MAC")]
    pub mac: String,
    #[serde(rename = "uiClassName")]
    pub ui_class_name: String,
    pub heap: u32,
    #[serde(rename = "canSleep")]
    pub can_sleep: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<String>,
    #[serde(rename = "globalStatus", default, skip_serializing_if = "Option::is_none")]
    pub global_status: Option<String>,
}

/// Size caps applied when building a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotLimits {
    pub max_custom_len: usize,
    pub max_global_status_len: usize,
}

impl DeviceSnapshot {
    /// Apply the size caps, swapping oversized payloads for their sentinel.
    #[must_use]
    pub fn capped(mut self, limits: SnapshotLimits) -> Self {
        if self.custom.as_ref().is_some_and(|c| c.len() >= limits.max_custom_len) {
            warn!("Snapshot: custom data too big, removed");
            self.custom = Some(CUSTOM_DATA_TOO_BIG.to_owned());
        }
        if self
            .global_status
            .as_ref()
            .is_some_and(|s| s.len() >= limits.max_global_status_len)
        {
            self.global_status = Some(GLOBAL_STATUS_TOO_BIG.to_owned());
        }
        self
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}

/// Answer to `GET /api/config` on the master.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterConfig {
    #[serde(rename = "timeInitialized", default)]
    pub time_initialized: bool,
    /// Unix seconds, meaningful only when `time_initialized`.
    #[serde(default)]
    pub timestamp: i64,
    #[serde(rename = "APInitialized", default)]
    pub ap_initialized: bool,
    #[serde(rename = "APSsid", default)]
    pub ap_ssid: String,
    #[serde(rename = "APPwd", default)]
    pub ap_password: String,
}

/// `POST /api/rename`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RenameRequest {
    pub name: String,
}

/// `POST /api/ota`.  Both fields are optional; an empty body means "stay
/// on the current network".
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OtaRequest {
    #[serde(default)]
    pub ssid: Option<String>,
    #[serde(default)]
    pub pwd: Option<String>,
}

/// `POST /api/sms`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SmsRequest {
    pub message: String,
    #[serde(rename = "phoneNumber")]
    pub phone_number: String,
    #[serde(rename = "isAdmin", default)]
    pub is_admin: bool,
}

/// Parse an inbound body.  Anything that does not deserialize cleanly is
/// rejected as a whole.
pub fn parse<T: DeserializeOwned>(body: &str) -> Result<T, ProtocolError> {
    serde_json::from_str(body).map_err(|e| {
        warn!("Protocol: rejected body ({})", e);
        ProtocolError::Malformed
    })
}
