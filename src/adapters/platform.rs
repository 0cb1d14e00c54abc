//! Platform adapter — bundles the concrete adapters behind the port traits
//! the poll loop drives.
//!
//! Owns the HTTP client, the WiFi station, the clock and the system
//! adapter, and satisfies [`DevicePorts`](crate::app::ports::DevicePorts)
//! by delegation.  This is the single value `main` hands to the agent.

use core::net::Ipv4Addr;

use super::http_client::HttpClient;
use super::system::SystemAdapter;
use super::time::ClockAdapter;
use super::wifi::WifiAdapter;
use crate::app::ports::{ClockPort, StationPort, SystemPort};
use crate::error::StationError;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, TransportError};

pub struct Platform {
    pub http: HttpClient,
    pub wifi: WifiAdapter,
    pub clock: ClockAdapter,
    pub system: SystemAdapter,
}

impl Platform {
    pub fn new(http: HttpClient, wifi: WifiAdapter, clock: ClockAdapter, system: SystemAdapter) -> Self {
        Self {
            http,
            wifi,
            clock,
            system,
        }
    }
}

// ── HttpTransport ─────────────────────────────────────────────

impl HttpTransport for Platform {
    fn execute(&mut self, request: &HttpRequest<'_>) -> Result<HttpResponse, TransportError> {
        self.http.execute(request)
    }
}

// ── StationPort ───────────────────────────────────────────────

impl StationPort for Platform {
    fn begin(&mut self, ssid: &str, password: &str) -> Result<(), StationError> {
        self.wifi.begin(ssid, password)
    }

    fn gateway(&self) -> Option<Ipv4Addr> {
        self.wifi.gateway()
    }
}

// ── ClockPort ─────────────────────────────────────────────────

impl ClockPort for Platform {
    fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    fn unix_time(&self) -> Option<i64> {
        self.clock.unix_time()
    }

    fn set_unix_time(&mut self, unix_secs: i64) {
        self.clock.set_unix_time(unix_secs);
    }

    fn start_sync(&mut self, ntp_host: &str, offset_minutes: i16) {
        self.clock.start_sync(ntp_host, offset_minutes);
    }
}

// ── SystemPort ────────────────────────────────────────────────

impl SystemPort for Platform {
    fn free_heap(&self) -> u32 {
        self.system.free_heap()
    }

    fn mac_address(&self) -> [u8; 6] {
        self.system.mac_address()
    }

    fn restart(&mut self) {
        self.system.restart();
    }
}
