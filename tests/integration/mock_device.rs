//! Mock platform for integration tests.
//!
//! [`MockDevice`] stands in for every driven port at once: it records each
//! HTTP request and station join, answers from scripted routes, and lets
//! tests move the clocks by hand.  [`Harness`] wires it to an
//! [`AgentService`] with an in-memory store and a recording sink.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::net::Ipv4Addr;

use xiotagent::adapters::nvs::validate_config;
use xiotagent::app::events::AppEvent;
use xiotagent::app::hooks::{AgentHooks, DataReply};
use xiotagent::app::ports::{ClockPort, ConfigError, ConfigPort, EventSink, StationPort, SystemPort};
use xiotagent::app::service::AgentService;
use xiotagent::config::{AgentConfig, BackendEndpoint, DeviceConfig};
use xiotagent::connectivity::LinkState;
use xiotagent::delivery::Outbox;
use xiotagent::error::StationError;
use xiotagent::events::{Event, EventQueue};
use xiotagent::protocol::api::{ApiRequest, ApiResponse};
use xiotagent::transport::{HttpRequest, HttpResponse, HttpTransport, Method, TransportError};

pub const GATEWAY: Ipv4Addr = Ipv4Addr::new(192, 168, 4, 1);
pub const LOCAL_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 4, 23);
pub const MAC: [u8; 6] = [0x24, 0x0A, 0xC4, 0x12, 0x34, 0x56];
pub const MAC_STR: &str = "24:0a:c4:12:34:56";
pub const MASTER_PASSWORD: &str = "masterpass1";
pub const MASTER_TIME: i64 = 1_700_000_000;
pub const BACKEND_URL: &str = "https://db.example.com";

// ── Recorded traffic ──────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub method: Method,
    pub url: String,
    pub body: Option<String>,
}

// ── MockDevice ────────────────────────────────────────────────

pub struct MockDevice {
    /// Requests in the order they were executed.
    pub sent: Vec<Sent>,
    /// `(url fragment, answer)`; the most recently added match wins.
    routes: Vec<(String, Result<HttpResponse, TransportError>)>,

    pub joins: Vec<(String, String)>,
    pub join_result: Result<(), StationError>,
    pub gateway: Option<Ipv4Addr>,

    pub now_ms: u64,
    pub unix: Option<i64>,
    pub syncs: Vec<(String, i16)>,

    pub heap: u32,
    pub restarts: u32,
}

impl MockDevice {
    pub fn new() -> Self {
        Self {
            sent: Vec::new(),
            routes: Vec::new(),
            joins: Vec::new(),
            join_result: Ok(()),
            gateway: Some(GATEWAY),
            now_ms: 0,
            unix: None,
            syncs: Vec::new(),
            heap: 120_000,
            restarts: 0,
        }
    }

    pub fn respond(&mut self, url_fragment: &str, status: u16, body: &str) {
        self.routes.insert(
            0,
            (
                url_fragment.to_owned(),
                Ok(HttpResponse {
                    status,
                    body: body.to_owned(),
                }),
            ),
        );
    }

    pub fn fail(&mut self, url_fragment: &str, error: TransportError) {
        self.routes.insert(0, (url_fragment.to_owned(), Err(error)));
    }

    pub fn sent_to(&self, url_fragment: &str) -> Vec<&Sent> {
        self.sent.iter().filter(|s| s.url.contains(url_fragment)).collect()
    }

    pub fn clear_sent(&mut self) {
        self.sent.clear();
    }
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport for MockDevice {
    fn execute(&mut self, request: &HttpRequest<'_>) -> Result<HttpResponse, TransportError> {
        self.sent.push(Sent {
            method: request.method,
            url: request.url.to_owned(),
            body: request.body.map(str::to_owned),
        });
        self.routes
            .iter()
            .find(|(fragment, _)| request.url.contains(fragment.as_str()))
            .map(|(_, answer)| answer.clone())
            .unwrap_or(Err(TransportError::Connect))
    }
}

impl StationPort for MockDevice {
    fn begin(&mut self, ssid: &str, password: &str) -> Result<(), StationError> {
        self.joins.push((ssid.to_owned(), password.to_owned()));
        self.join_result
    }

    fn gateway(&self) -> Option<Ipv4Addr> {
        self.gateway
    }
}

impl ClockPort for MockDevice {
    fn now_ms(&self) -> u64 {
        self.now_ms
    }

    fn unix_time(&self) -> Option<i64> {
        self.unix
    }

    fn set_unix_time(&mut self, unix_secs: i64) {
        self.unix = Some(unix_secs);
    }

    fn start_sync(&mut self, ntp_host: &str, offset_minutes: i16) {
        self.syncs.push((ntp_host.to_owned(), offset_minutes));
    }
}

impl SystemPort for MockDevice {
    fn free_heap(&self) -> u32 {
        self.heap
    }

    fn mac_address(&self) -> [u8; 6] {
        MAC
    }

    fn restart(&mut self) {
        self.restarts += 1;
    }
}

// ── MemStore ──────────────────────────────────────────────────

#[derive(Default)]
pub struct MemStore {
    pub stored: RefCell<Option<DeviceConfig>>,
    pub saves: Cell<u32>,
    pub resets: Cell<u32>,
    pub fail_writes: Cell<bool>,
}

impl ConfigPort for MemStore {
    fn load(&self) -> Result<DeviceConfig, ConfigError> {
        Ok(self.stored.borrow().clone().unwrap_or_default())
    }

    fn save(&self, config: &DeviceConfig) -> Result<(), ConfigError> {
        validate_config(config)?;
        if self.fail_writes.get() {
            return Err(ConfigError::IoError);
        }
        self.saves.set(self.saves.get() + 1);
        *self.stored.borrow_mut() = Some(config.clone());
        Ok(())
    }

    fn reset(&self) -> Result<(), ConfigError> {
        if self.fail_writes.get() {
            return Err(ConfigError::IoError);
        }
        self.resets.set(self.resets.get() + 1);
        *self.stored.borrow_mut() = None;
        Ok(())
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

impl RecordingSink {
    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── RecordingHooks ────────────────────────────────────────────

pub struct RecordingHooks {
    pub custom: Option<String>,
    pub status: Option<String>,
    pub data_reply: DataReply,
    pub data_bodies: Vec<String>,
    pub accept_sms: bool,
    pub sms: Vec<(String, bool, String)>,
    pub allow_ota: bool,
    pub registered: Vec<bool>,
    pub got_config: Vec<bool>,
    pub addresses: Vec<Ipv4Addr>,
    /// Logged through the outbox on the next loop call, then cleared.
    pub pending_logs: Vec<String>,
    pub loop_calls: u32,
}

impl Default for RecordingHooks {
    fn default() -> Self {
        Self {
            custom: None,
            status: None,
            data_reply: DataReply::ok(),
            data_bodies: Vec::new(),
            accept_sms: false,
            sms: Vec::new(),
            allow_ota: true,
            registered: Vec::new(),
            got_config: Vec::new(),
            addresses: Vec::new(),
            pending_logs: Vec::new(),
            loop_calls: 0,
        }
    }
}

impl AgentHooks for RecordingHooks {
    fn custom_data(&self) -> Option<String> {
        self.custom.clone()
    }

    fn global_status(&self) -> Option<String> {
        self.status.clone()
    }

    fn use_data(&mut self, body: &str) -> DataReply {
        self.data_bodies.push(body.to_owned());
        self.data_reply.clone()
    }

    fn process_sms(&mut self, phone_number: &str, is_admin: bool, message: &str) -> bool {
        self.sms.push((phone_number.to_owned(), is_admin, message.to_owned()));
        self.accept_sms
    }

    fn before_ota(&mut self) -> bool {
        self.allow_ota
    }

    fn on_registered(&mut self, ok: bool) {
        self.registered.push(ok);
    }

    fn on_got_config(&mut self, ok: bool) {
        self.got_config.push(ok);
    }

    fn on_got_address(&mut self, ip: Ipv4Addr) {
        self.addresses.push(ip);
    }

    fn custom_loop(&mut self, _now_ms: u64, outbox: &mut Outbox<'_>) {
        self.loop_calls += 1;
        for line in self.pending_logs.drain(..) {
            outbox.log(&line);
        }
    }
}

// ── Fixtures ──────────────────────────────────────────────────

/// A device whose master AP password was customised (so it registers).
pub fn provisioned_device() -> DeviceConfig {
    let mut device = DeviceConfig::default();
    device.set_name("kitchen").unwrap();
    device.set_ap_credentials("iotinator", MASTER_PASSWORD).unwrap();
    device
}

pub fn with_backend(mut device: DeviceConfig) -> DeviceConfig {
    device.backend = Some(BackendEndpoint::new(BACKEND_URL, Some("secret-token")));
    device
}

pub fn master_config(password: &str, time: Option<i64>) -> String {
    serde_json::json!({
        "timeInitialized": time.is_some(),
        "timestamp": time.unwrap_or(0),
        "APInitialized": true,
        "APSsid": "iotinator",
        "APPwd": password,
    })
    .to_string()
}

// ── Harness ───────────────────────────────────────────────────

pub struct Harness<H: AgentHooks = RecordingHooks> {
    pub agent: AgentService<H>,
    pub dev: MockDevice,
    pub store: MemStore,
    pub sink: RecordingSink,
    /// Leaked so driver-side adapters can hold it like the firmware's static.
    pub events: &'static EventQueue,
}

impl Harness<RecordingHooks> {
    pub fn new(device: DeviceConfig) -> Self {
        Self::with_hooks(device, RecordingHooks::default())
    }
}

impl<H: AgentHooks> Harness<H> {
    pub fn with_hooks(device: DeviceConfig, hooks: H) -> Self {
        Self::with_config(AgentConfig::default(), device, hooks)
    }

    pub fn with_config(config: AgentConfig, device: DeviceConfig, hooks: H) -> Self {
        let mut dev = MockDevice::new();
        dev.respond("/api/config", 200, &master_config(MASTER_PASSWORD, Some(MASTER_TIME)));
        dev.respond("/api/register", 200, "{}");
        dev.respond("/api/refresh", 200, "{}");
        dev.respond(BACKEND_URL, 200, "{\"name\":\"-N1\"}");

        let mut sink = RecordingSink::default();
        let mut agent = AgentService::new(config, device, MAC, hooks);
        agent.start(dev.now_ms, &mut sink);
        Self {
            agent,
            dev,
            store: MemStore::default(),
            sink,
            events: Box::leak(Box::new(EventQueue::new())),
        }
    }

    pub fn poll(&mut self) {
        self.agent.poll(&mut self.dev, &self.store, &mut self.sink, self.events);
    }

    pub fn poll_n(&mut self, n: usize) {
        for _ in 0..n {
            self.poll();
        }
    }

    pub fn advance(&mut self, ms: u64) {
        self.dev.now_ms += ms;
    }

    /// Advance by `ms` and poll once.
    pub fn step(&mut self, ms: u64) {
        self.advance(ms);
        self.poll();
    }

    pub fn push(&self, event: Event) {
        assert!(self.events.push(event));
    }

    /// Poll until the link reaches `state`; `false` if it never does.
    pub fn run_until(&mut self, state: LinkState, max_polls: usize) -> bool {
        for _ in 0..max_polls {
            if self.agent.link_state() == state {
                return true;
            }
            self.poll();
        }
        self.agent.link_state() == state
    }

    /// Join the station and report an address.
    pub fn bring_up(&mut self) {
        assert!(self.run_until(LinkState::ConnectingStation, 4));
        self.push(Event::GotAddress { ip: LOCAL_IP });
        assert!(self.run_until(LinkState::StationConnected, 4));
    }

    pub fn request(&mut self, method: Method, path: &str, body: &str) -> ApiResponse {
        self.forwarded(method, path, body, None)
    }

    pub fn forwarded(&mut self, method: Method, path: &str, body: &str, forward_to: Option<&str>) -> ApiResponse {
        let request = ApiRequest {
            method,
            path,
            forward_to,
            body,
        };
        self.agent.handle_request(&request, &mut self.dev, &self.store, &mut self.sink)
    }
}
