//! XIOT agent firmware — main entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  Platform          LogEventSink   NvsAdapter   HttpServer      │
//! │  (HTTP client,     (EventSink)    (Config)     (inbound API,   │
//! │   WiFi, clock,                                  OTA upload)    │
//! │   system)                                                      │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AgentService (pure logic)                 │    │
//! │  │  Link FSM · OTA · Delivery queue · Master protocol     │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  EventQueue (driver callbacks ──▶ poll loop)                   │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::Result;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use log::{info, warn};

use xiotagent::adapters::http_client::HttpClient;
use xiotagent::adapters::http_server::{ApiHandler, HttpServer};
use xiotagent::adapters::log_sink::LogEventSink;
use xiotagent::adapters::nvs::NvsAdapter;
use xiotagent::adapters::ota_receiver::OtaReceiver;
use xiotagent::adapters::platform::Platform;
use xiotagent::adapters::system::SystemAdapter;
use xiotagent::adapters::time::ClockAdapter;
use xiotagent::adapters::wifi::WifiAdapter;
use xiotagent::app::hooks::NoHooks;
use xiotagent::app::ports::{ClockPort, ConfigPort, SystemPort};
use xiotagent::app::service::AgentService;
use xiotagent::config::{AgentConfig, DeviceConfig};
use xiotagent::events::EventQueue;
use xiotagent::ota::{self, OtaState};
use xiotagent::protocol::api::{ApiRequest, ApiResponse};

/// Poll cadence of the main loop.
const POLL_PERIOD_MS: u64 = 10;

/// Driver callbacks (WiFi, SNTP, OTA upload) ──▶ poll loop.
static EVENTS: EventQueue = EventQueue::new();

// ── Runtime ───────────────────────────────────────────────────
//
// Everything the agent needs per call, behind one mutex shared by the
// poll loop and the HTTP server task.

struct Runtime {
    agent: AgentService<NoHooks>,
    platform: Platform,
    store: NvsAdapter,
    sink: LogEventSink,
}

impl Runtime {
    fn poll(&mut self) {
        self.agent.poll(&mut self.platform, &self.store, &mut self.sink, &EVENTS);
    }
}

impl ApiHandler for Runtime {
    fn handle(&mut self, request: &ApiRequest<'_>) -> ApiResponse {
        self.agent.handle_request(request, &mut self.platform, &self.store, &mut self.sink)
    }

    fn ota_state(&self) -> OtaState {
        self.agent.ota_state()
    }
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("XIOT agent v{}", env!("CARGO_PKG_VERSION"));

    // ── 1b. Confirm this image so the bootloader keeps it ─────
    ota::check_rollback();

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let store = match NvsAdapter::new() {
        Ok(n) => n,
        Err(e) => {
            warn!("NVS init failed ({}), running without persistence", e);
            NvsAdapter::default()
        }
    };
    let device = match store.load() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            DeviceConfig::default()
        }
    };

    // ── 3. Platform adapters ──────────────────────────────────
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;

    let wifi = WifiAdapter::new(peripherals.modem, sysloop, Some(nvs_partition), &EVENTS)
        .map_err(|e| anyhow::anyhow!("WiFi init failed: {}", e))?;
    let platform = Platform::new(HttpClient::new(), wifi, ClockAdapter::new(&EVENTS), SystemAdapter::new());

    // ── 4. Agent ──────────────────────────────────────────────
    let mut sink = LogEventSink::new();
    let mut agent = AgentService::new(AgentConfig::default(), device, platform.mac_address(), NoHooks);
    agent.start(platform.now_ms(), &mut sink);

    let runtime = Arc::new(Mutex::new(Runtime {
        agent,
        platform,
        store,
        sink,
    }));

    // ── 5. Inbound HTTP ───────────────────────────────────────
    let ota_receiver = Arc::new(Mutex::new(OtaReceiver::new(&EVENTS)));
    let _server = HttpServer::start(runtime.clone(), ota_receiver)?;

    // ── 6. Poll loop ──────────────────────────────────────────
    info!("Entering poll loop ({} ms)", POLL_PERIOD_MS);
    loop {
        runtime.lock().unwrap_or_else(PoisonError::into_inner).poll();
        std::thread::sleep(Duration::from_millis(POLL_PERIOD_MS));
    }
}
