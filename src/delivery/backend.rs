//! Telemetry backend: URL mapping and body composition.
//!
//! Events append to a collection, records overwrite a keyed document:
//!
//! ```text
//!   Ping / Log / Alert / Custom{id: None}  →  POST <url>/<collection>.json
//!   ModuleRecord                           →  PUT  <url>/module/<mac>.json
//!   Custom{id: Some(id)}                   →  PUT  <url>/<collection>/<id>.json
//! ```
//!
//! `?auth=<secret>` is appended whenever the endpoint carries a secret.

use std::borrow::Cow;

use serde_json::{Map, Value};

use super::message::{Message, MessageKind};
use super::queue::{DeliveryCounters, MessageSender};
use crate::config::{BackendEndpoint, DeviceConfig};
use crate::transport::{HttpRequest, HttpTransport, Method, RequestBudget, TransportError};

/// Date format used in every telemetry body.
pub const DATE_FORMAT: &str = "%Y/%m/%dT%H:%M:%S";

/// Push tokens shorter than this are treated as unset.
const MIN_PUSH_TOKEN_LEN: usize = 10;

/// Format a unix timestamp the way the backend expects.
pub fn format_date(unix_secs: i64) -> Option<String> {
    chrono::DateTime::from_timestamp(unix_secs, 0).map(|dt| dt.format(DATE_FORMAT).to_string())
}

/// Build the target URL for a message.
pub fn target_url(endpoint: &BackendEndpoint, kind: &MessageKind, mac: &str) -> String {
    let mut url = match kind {
        MessageKind::ModuleRecord => format!("{}/{}/{}.json", endpoint.url, kind.collection(), mac),
        MessageKind::Custom {
            collection,
            record_id: Some(id),
        } => format!("{}/{}/{}.json", endpoint.url, collection, id),
        _ => format!("{}/{}.json", endpoint.url, kind.collection()),
    };
    if let Some(secret) = &endpoint.secret {
        url.push_str("?auth=");
        url.push_str(secret);
    }
    url
}

/// Fields every telemetry body starts with.
#[derive(Debug, Clone, Copy)]
pub struct CommonFields<'a> {
    pub lang: &'a str,
    pub name: &'a str,
    pub mac: &'a str,
    /// Wall clock, `None` until it has been set.  The body then carries an
    /// empty `date`, filled in by [`BackendSender`] at delivery.
    pub unix_secs: Option<i64>,
    pub heap: u32,
}

impl CommonFields<'_> {
    fn object(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("lang".into(), Value::from(self.lang));
        map.insert("name".into(), Value::from(self.name));
        map.insert("mac".into(), Value::from(self.mac));
        let date = self.unix_secs.and_then(format_date).unwrap_or_default();
        map.insert("date".into(), Value::from(date));
        map.insert("heap".into(), Value::from(self.heap));
        map
    }
}

/// Health ping carrying the queue counters.
pub fn ping_body(common: &CommonFields<'_>, counters: DeliveryCounters) -> String {
    let mut map = common.object();
    map.insert("lost".into(), Value::from(counters.lost));
    map.insert("failed".into(), Value::from(counters.failed));
    map.insert("retried".into(), Value::from(counters.retried));
    Value::Object(map).to_string()
}

/// Log line or alert.
pub fn text_body(common: &CommonFields<'_>, message: &str) -> String {
    let mut map = common.object();
    map.insert("message".into(), Value::from(message));
    Value::Object(map).to_string()
}

/// The module record.  `extra` comes from the application hook and is
/// applied last.
pub fn module_record_body(common: &CommonFields<'_>, device: &DeviceConfig, extra: Map<String, Value>) -> String {
    let mut map = common.object();
    map.insert("type".into(), Value::from(device.module_type.as_str()));
    if device.send_ping
        && device.push_user.len() > MIN_PUSH_TOKEN_LEN
        && device.push_token.len() > MIN_PUSH_TOKEN_LEN
    {
        map.insert("tu".into(), Value::from(device.push_user.as_str()));
        map.insert("ta".into(), Value::from(device.push_token.as_str()));
    }
    map.extend(extra);
    Value::Object(map).to_string()
}

/// Application-defined event or record.
pub fn custom_body(common: &CommonFields<'_>, fields: Map<String, Value>) -> String {
    let mut map = common.object();
    map.extend(fields);
    Value::Object(map).to_string()
}

/// Fill in a `date` left empty because the clock was unset when the body
/// was composed.  Any other body is passed through untouched.
pub fn stamp_date(body: &str, unix_secs: Option<i64>) -> Cow<'_, str> {
    const UNDATED: &str = "\"date\":\"\"";
    let Some(date) = unix_secs.and_then(format_date) else {
        return Cow::Borrowed(body);
    };
    if !body.contains(UNDATED) {
        return Cow::Borrowed(body);
    }
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(mut map)) if map.get("date").and_then(Value::as_str) == Some("") => {
            map.insert("date".into(), Value::from(date));
            Cow::Owned(Value::Object(map).to_string())
        }
        _ => Cow::Borrowed(body),
    }
}

// ── Sender ─────────────────────────────────────────────────────

/// Delivers queued messages to the configured backend.
pub struct BackendSender<'a, T: HttpTransport + ?Sized> {
    endpoint: Option<&'a BackendEndpoint>,
    transport: &'a mut T,
    mac: &'a str,
    /// Station up and wall clock valid.
    online: bool,
    unix_secs: Option<i64>,
    budget: RequestBudget,
}

impl<'a, T: HttpTransport + ?Sized> BackendSender<'a, T> {
    pub fn new(
        endpoint: Option<&'a BackendEndpoint>,
        transport: &'a mut T,
        mac: &'a str,
        online: bool,
        unix_secs: Option<i64>,
        budget: RequestBudget,
    ) -> Self {
        Self {
            endpoint,
            transport,
            mac,
            online,
            unix_secs,
            budget,
        }
    }
}

impl<T: HttpTransport + ?Sized> MessageSender for BackendSender<'_, T> {
    fn ready(&self) -> bool {
        self.online && self.endpoint.is_some()
    }

    fn send(&mut self, message: &Message) -> Result<u16, TransportError> {
        let endpoint = self.endpoint.ok_or(TransportError::InvalidUrl)?;
        let url = target_url(endpoint, message.kind(), self.mac);
        let method = if message.kind().is_record() { Method::Put } else { Method::Post };
        let body = stamp_date(message.body(), self.unix_secs);
        let request = HttpRequest::with_body(method, &url, &body, self.budget);
        Ok(self.transport.execute(&request)?.status)
    }
}
