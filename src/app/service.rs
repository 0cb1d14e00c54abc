//! Agent service — the poll scheduler at the centre of the hexagon.
//!
//! [`AgentService`] owns the connectivity machine, the OTA machine, the
//! delivery queue and the timer engine.  The host calls [`poll`] over and
//! over; every call advances each component once, in priority order:
//!
//! ```text
//!  1. drain platform events (network, OTA transport, time sync)
//!  2. OTA active?  ── yes ──▶ OTA timeout check, nothing else
//!  3. timers (restart, ping, refresh retry)
//!  4. connectivity machine + the I/O it requested
//!  5. refresh push to the master
//!  6. wall-clock watch (module record)
//!  7. delivery queue
//!  8. application loop hook
//! ```
//!
//! All I/O flows through port traits passed in at the call site, so the
//! whole service runs against mocks on the host.
//!
//! [`poll`]: AgentService::poll

use core::net::Ipv4Addr;

use log::{info, warn};
use serde_json::Map;

use crate::config::{AgentConfig, DeviceConfig};
use crate::connectivity::{LinkContext, LinkMachine, LinkRequests, LinkState, PullOutcome};
use crate::delivery::{
    BackendSender, CommonFields, DeliveryOutcome, DeliveryQueue, MessageKind, Outbox, RetryPolicy, backend,
};
use crate::events::{Event, EventQueue};
use crate::ota::{OTA_ACCEPTED, OtaAction, OtaMachine, OtaSignal};
use crate::protocol::{DeviceSnapshot, MasterClient, SnapshotLimits};
use crate::scheduler::{Schedule, ScheduleKind, Scheduler, Trigger};
use crate::transport::RequestBudget;

use super::events::AppEvent;
use super::hooks::AgentHooks;
use super::ports::{ConfigPort, DevicePorts, EventSink, ScheduleFiredKind, SchedulerDelegate};

// ───────────────────────────────────────────────────────────────
// Fired-trigger collector
// ───────────────────────────────────────────────────────────────

/// Collects scheduler fires so they can be handled after the scheduler
/// borrow ends.
#[derive(Default)]
struct FiredTriggers(heapless::Vec<Trigger, 4>);

impl SchedulerDelegate for FiredTriggers {
    fn on_schedule_fired(&mut self, trigger: Trigger, _kind: ScheduleFiredKind) {
        if self.0.push(trigger).is_err() {
            warn!("Scheduler: dropped {:?} fire", trigger);
        }
    }
}

// ───────────────────────────────────────────────────────────────
// AgentService
// ───────────────────────────────────────────────────────────────

pub struct AgentService<H: AgentHooks> {
    pub(super) config: AgentConfig,
    pub(super) device: DeviceConfig,
    pub(super) hooks: H,
    pub(super) link: LinkMachine,
    pub(super) link_ctx: LinkContext,
    pub(super) ota: OtaMachine,
    pub(super) queue: DeliveryQueue,
    pub(super) scheduler: Scheduler,
    /// Lower-case colon-separated MAC.
    pub(super) mac: heapless::String<17>,
    /// Local state changed; push a refresh to the master.
    pub(super) refresh_needed: bool,
    /// The refresh timer fired since the last push attempt.
    refresh_due: bool,
    module_record_sent: bool,
}

impl<H: AgentHooks> AgentService<H> {
    /// Construct the service.  Call [`start`](Self::start) before polling.
    pub fn new(config: AgentConfig, device: DeviceConfig, mac: [u8; 6], hooks: H) -> Self {
        let link_ctx = LinkContext::new(&config);
        let ota = OtaMachine::new(config.ota_wait_timeout_secs);
        let queue = DeliveryQueue::new(RetryPolicy::from_config(&config));
        Self {
            config,
            device,
            hooks,
            link: LinkMachine::new(),
            link_ctx,
            ota,
            queue,
            scheduler: Scheduler::new(),
            mac: format_mac(&mac),
            refresh_needed: false,
            refresh_due: false,
            module_record_sent: false,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    pub fn start(&mut self, now_ms: u64, sink: &mut impl EventSink) {
        self.sync_link_facts(now_ms);
        self.link.start(&mut self.link_ctx);

        if self.device.send_ping {
            self.scheduler.add(
                Schedule {
                    label: "ping",
                    trigger: Trigger::Ping,
                    kind: ScheduleKind::Periodic {
                        interval_ms: self.config.ping_period_ms,
                    },
                    enabled: true,
                },
                now_ms,
            );
        }
        self.scheduler.add(
            Schedule {
                label: "master refresh",
                trigger: Trigger::MasterRefresh,
                kind: ScheduleKind::Periodic {
                    interval_ms: self.config.refresh_interval_ms,
                },
                enabled: true,
            },
            now_ms,
        );

        sink.emit(&AppEvent::Started(self.link.current_state()));
        info!(
            "AgentService started as '{}' ({}, {})",
            self.device.name,
            self.mac,
            if self.device.autonomous { "autonomous" } else { "master-managed" }
        );
    }

    // ── Per-cycle orchestration ───────────────────────────────

    /// Run one poll cycle.
    pub fn poll(
        &mut self,
        dev: &mut impl DevicePorts,
        store: &impl ConfigPort,
        sink: &mut impl EventSink,
        events: &EventQueue,
    ) {
        let now = dev.now_ms();

        // 1. Platform events
        while let Some(event) = events.pop() {
            self.handle_event(event, dev, sink);
        }

        // 2. OTA preempts everything else
        if self.ota.is_active() {
            if let Some(OtaAction::Reboot) = self.ota.tick(now) {
                sink.emit(&AppEvent::Restarting);
                dev.restart();
            }
            return;
        }

        // 3. Timers
        let mut fired = FiredTriggers::default();
        self.scheduler.tick(now, &mut fired);
        for trigger in fired.0 {
            match trigger {
                Trigger::Restart => {
                    info!("Restarting on request");
                    sink.emit(&AppEvent::Restarting);
                    dev.restart();
                    return;
                }
                Trigger::Ping => self.enqueue_ping(dev, sink),
                Trigger::MasterRefresh => self.refresh_due = true,
            }
        }

        // 4. Connectivity
        self.step_link(now, dev, store, sink);

        // 5. Refresh push
        if self.refresh_due {
            self.refresh_due = false;
            self.push_refresh(dev, sink);
        }

        // 6. Wall clock
        self.watch_clock(now, dev, sink);

        // 7. Delivery
        self.drain_queue(now, dev, sink);

        // 8. Application loop
        let lost_before = self.queue.counters().lost;
        let heap = dev.free_heap();
        let common = common_fields(&self.config, &self.device, &self.mac, dev.unix_time(), heap);
        let mut outbox = Outbox::new(&mut self.queue, common, now);
        self.hooks.custom_loop(now, &mut outbox);
        self.report_lost(lost_before, sink);
    }

    // ── Events ────────────────────────────────────────────────

    fn handle_event(&mut self, event: Event, dev: &mut impl DevicePorts, sink: &mut impl EventSink) {
        match event {
            Event::GotAddress { ip } => {
                info!("Station got address {}", ip);
                self.link_ctx.local_ip = Some(ip);
                self.hooks.on_got_address(ip);
            }
            Event::Disconnected => {
                if self.link.current_state().is_connected() {
                    warn!("Station disconnected, reconnecting");
                    if let Some((from, to)) = self.link.force_transition(LinkState::ConnectingStation, &mut self.link_ctx) {
                        sink.emit(&AppEvent::LinkChanged { from, to });
                    }
                    // connect request is executed on the next link step
                }
            }
            Event::TimeSynced { unix_secs } => {
                info!("Time sync complete");
                dev.set_unix_time(unix_secs);
            }
            Event::TimeSyncFailed => warn!("Time sync failed"),
            Event::OtaStarted | Event::OtaProgress { .. } | Event::OtaError(_) | Event::OtaEnd => {
                let before = self.ota.state();
                match self.ota.on_event(&event, dev.now_ms()) {
                    Some(OtaSignal::Started) => sink.emit(&AppEvent::OtaStateChanged(self.ota.state())),
                    Some(OtaSignal::Progress(pct)) => sink.emit(&AppEvent::OtaProgress(pct)),
                    Some(OtaSignal::Failed(f)) => {
                        sink.emit(&AppEvent::OtaFailed(f));
                        if self.ota.state() != before {
                            sink.emit(&AppEvent::OtaStateChanged(self.ota.state()));
                        }
                    }
                    Some(OtaSignal::Finished) => {
                        info!("OTA: new image staged, rebooting");
                        sink.emit(&AppEvent::Restarting);
                        dev.restart();
                    }
                    None => {}
                }
            }
        }
    }

    // ── Connectivity ──────────────────────────────────────────

    fn sync_link_facts(&mut self, now_ms: u64) {
        let ctx = &mut self.link_ctx;
        ctx.now_ms = now_ms;
        ctx.autonomous = self.device.autonomous;
        ctx.provisioned = self.device.is_provisioned();
        ctx.has_station_ssid = !self.device.station_ssid().is_empty();
    }

    fn step_link(&mut self, now: u64, dev: &mut impl DevicePorts, store: &impl ConfigPort, sink: &mut impl EventSink) {
        self.sync_link_facts(now);
        if let Some((from, to)) = self.link.tick(&mut self.link_ctx) {
            sink.emit(&AppEvent::LinkChanged { from, to });
        }

        let LinkRequests {
            connect_station,
            pull_config,
            register,
            sync_time,
        } = self.link_ctx.take_requests();

        if connect_station {
            if let Err(e) = dev.begin(self.device.station_ssid(), self.device.station_password()) {
                warn!("Station start failed: {}", e);
            }
        }
        if sync_time {
            dev.start_sync(&self.device.ntp_host, self.device.time_offset_minutes);
        }
        if pull_config {
            let outcome = self.pull_config(dev, store, sink);
            self.link_ctx.config_outcome = Some(outcome);
        }
        if register {
            let ok = self.register(dev, sink);
            self.link_ctx.register_outcome = Some(ok);
        }
    }

    fn pull_config(&mut self, dev: &mut impl DevicePorts, store: &impl ConfigPort, sink: &mut impl EventSink) -> PullOutcome {
        let result = match dev.gateway() {
            Some(gw) => self.master(gw).fetch_config(dev),
            None => Err(crate::error::ProtocolError::NoMaster.into()),
        };
        let cfg = match result {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!("Config pull failed: {}", e);
                self.hooks.on_got_config(false);
                sink.emit(&AppEvent::GotConfig(false));
                return PullOutcome::Failed;
            }
        };

        self.hooks.on_got_config(true);
        sink.emit(&AppEvent::GotConfig(true));

        if cfg.time_initialized {
            dev.set_unix_time(cfg.timestamp);
        }

        let mut credentials_changed = false;
        if cfg.ap_initialized && cfg.ap_password != self.device.ap_password.as_str() {
            let mut updated = self.device.clone();
            let stored = updated
                .set_ap_credentials(&cfg.ap_ssid, &cfg.ap_password)
                .map_err(crate::app::ports::ConfigError::ValidationFailed)
                .and_then(|()| store.save(&updated));
            match stored {
                Ok(()) => {
                    info!("Master AP credentials updated to '{}'", updated.ap_ssid);
                    self.device = updated;
                    credentials_changed = true;
                }
                Err(e) => warn!("Master AP credentials rejected: {}", e),
            }
        }
        PullOutcome::Success { credentials_changed }
    }

    fn register(&mut self, dev: &mut impl DevicePorts, sink: &mut impl EventSink) -> bool {
        let snapshot = self.snapshot(&*dev);
        let result = match dev.gateway() {
            Some(gw) => self.master(gw).register(dev, &snapshot),
            None => Err(crate::error::ProtocolError::NoMaster.into()),
        };
        let ok = match result {
            Ok(()) => true,
            Err(e) => {
                warn!("Registration failed: {}", e);
                false
            }
        };
        self.hooks.on_registered(ok);
        sink.emit(&AppEvent::Registered(ok));
        ok
    }

    fn push_refresh(&mut self, dev: &mut impl DevicePorts, sink: &mut impl EventSink) {
        if !self.refresh_needed || self.device.autonomous || !self.link_ctx.is_online() {
            return;
        }
        let Some(gw) = dev.gateway() else {
            return;
        };
        let snapshot = self.snapshot(&*dev);
        match self.master(gw).refresh(dev, &snapshot) {
            Ok(()) => {
                self.refresh_needed = false;
                sink.emit(&AppEvent::Refreshed(true));
            }
            Err(e) => {
                warn!("Refresh failed: {}", e);
                sink.emit(&AppEvent::Refreshed(false));
            }
        }
    }

    fn master(&self, gateway: Ipv4Addr) -> MasterClient {
        MasterClient::new(gateway, self.budget())
    }

    // ── Telemetry ─────────────────────────────────────────────

    fn watch_clock(&mut self, now: u64, dev: &mut impl DevicePorts, sink: &mut impl EventSink) {
        if self.module_record_sent {
            return;
        }
        let Some(unix_secs) = dev.unix_time() else {
            return;
        };
        self.module_record_sent = true;
        sink.emit(&AppEvent::ClockSet { unix_secs });

        if self.device.backend.is_none() {
            return;
        }
        let mut extra = Map::new();
        self.hooks.module_record_fields(&mut extra);
        let common = common_fields(&self.config, &self.device, &self.mac, Some(unix_secs), dev.free_heap());
        let body = backend::module_record_body(&common, &self.device, extra);
        let lost_before = self.queue.counters().lost;
        self.queue.enqueue(MessageKind::ModuleRecord, body, now);
        self.report_lost(lost_before, sink);
    }

    fn enqueue_ping(&mut self, dev: &mut impl DevicePorts, sink: &mut impl EventSink) {
        if !self.device.send_ping || self.device.backend.is_none() {
            return;
        }
        let lost_before = self.queue.counters().lost;
        let common = common_fields(&self.config, &self.device, &self.mac, dev.unix_time(), dev.free_heap());
        Outbox::new(&mut self.queue, common, dev.now_ms()).ping();
        self.report_lost(lost_before, sink);
    }

    fn drain_queue(&mut self, now: u64, dev: &mut impl DevicePorts, sink: &mut impl EventSink) {
        let unix_secs = dev.unix_time();
        let online = self.link_ctx.is_online() && unix_secs.is_some();
        let budget = self.budget();
        let mut sender =
            BackendSender::new(self.device.backend.as_ref(), &mut *dev, &self.mac, online, unix_secs, budget);
        match self.queue.tick(now, &mut sender) {
            Some(DeliveryOutcome::Delivered { kind, attempts }) => {
                sink.emit(&AppEvent::MessageDelivered { kind, attempts });
            }
            Some(DeliveryOutcome::Dropped { kind, attempts }) => {
                sink.emit(&AppEvent::MessageDropped { kind, attempts });
            }
            Some(DeliveryOutcome::Retrying { .. }) | None => {}
        }
    }

    fn report_lost(&self, lost_before: u32, sink: &mut impl EventSink) {
        let lost = self.queue.counters().lost;
        if lost > lost_before {
            sink.emit(&AppEvent::MessageLost { lost });
        }
    }

    // ── Helpers ───────────────────────────────────────────────

    pub(super) fn budget(&self) -> RequestBudget {
        RequestBudget {
            buffer_size: self.config.http_buffer_size,
            timeout_ms: self.config.http_timeout_ms,
        }
    }

    /// Build the device snapshot sent to the master and returned by
    /// `/api/ping` and `/api/data`.
    pub fn snapshot(&self, dev: &impl DevicePorts) -> DeviceSnapshot {
        DeviceSnapshot {
            name: self.device.name.as_str().to_owned(),
            ip: self.link_ctx.local_ip.map(|ip| ip.to_string()).unwrap_or_default(),
            mac: self.mac.as_str().to_owned(),
            ui_class_name: self.device.ui_class_name.as_str().to_owned(),
            heap: dev.free_heap(),
            can_sleep: false,
            custom: self.hooks.custom_data(),
            global_status: self.hooks.global_status(),
        }
        .capped(SnapshotLimits {
            max_custom_len: self.config.max_custom_data_len,
            max_global_status_len: self.config.max_global_status_len,
        })
    }

    /// Defer telemetry from application code outside the poll loop.
    pub fn outbox<'a>(&'a mut self, dev: &impl DevicePorts) -> Outbox<'a> {
        let common = common_fields(&self.config, &self.device, &self.mac, dev.unix_time(), dev.free_heap());
        Outbox::new(&mut self.queue, common, dev.now_ms())
    }

    /// Enter the OTA wait state if the application allows it.  Returns the
    /// HTTP status to answer with.
    pub(super) fn start_ota(
        &mut self,
        network: Option<(&str, &str)>,
        dev: &mut impl DevicePorts,
        sink: &mut impl EventSink,
    ) -> u16 {
        let was_active = self.ota.is_active();
        let allowed = self.hooks.before_ota();
        let code = self.ota.start(allowed, dev.now_ms());
        if code == OTA_ACCEPTED && !was_active {
            sink.emit(&AppEvent::OtaStateChanged(self.ota.state()));
            if let Some((ssid, password)) = network.filter(|(ssid, _)| !ssid.is_empty()) {
                info!("OTA: joining '{}' for the update", ssid);
                if let Err(e) = dev.begin(ssid, password) {
                    warn!("OTA: could not join '{}': {}", ssid, e);
                }
            }
        }
        code
    }

    /// Schedule a reboot once the current answer has been flushed.
    pub(super) fn schedule_restart(&mut self, now_ms: u64) {
        if self.scheduler.contains(Trigger::Restart) {
            return;
        }
        let added = self.scheduler.add(
            Schedule {
                label: "restart",
                trigger: Trigger::Restart,
                kind: ScheduleKind::OneShot {
                    delay_ms: self.config.restart_delay_ms,
                },
                enabled: true,
            },
            now_ms,
        );
        if added.is_none() {
            warn!("Scheduler full, restart not scheduled");
        }
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn link_state(&self) -> LinkState {
        self.link.current_state()
    }

    /// `(awaiting_config, awaiting_registration)` in-flight flags.
    pub fn in_flight(&self) -> (bool, bool) {
        (self.link_ctx.awaiting_config, self.link_ctx.awaiting_registration)
    }

    pub fn local_ip(&self) -> Option<Ipv4Addr> {
        self.link_ctx.local_ip
    }

    pub fn ota_state(&self) -> crate::ota::OtaState {
        self.ota.state()
    }

    pub fn queue(&self) -> &DeliveryQueue {
        &self.queue
    }

    pub fn device(&self) -> &DeviceConfig {
        &self.device
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn mac(&self) -> &str {
        &self.mac
    }

    pub fn refresh_needed(&self) -> bool {
        self.refresh_needed
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }
}

fn common_fields<'a>(
    config: &'a AgentConfig,
    device: &'a DeviceConfig,
    mac: &'a str,
    unix_secs: Option<i64>,
    heap: u32,
) -> CommonFields<'a> {
    CommonFields {
        lang: &config.lang,
        name: &device.name,
        mac,
        unix_secs,
        heap,
    }
}

/// `aa:bb:cc:dd:ee:ff`
pub fn format_mac(mac: &[u8; 6]) -> heapless::String<17> {
    use core::fmt::Write;
    let mut s = heapless::String::new();
    let _ = write!(
        s,
        "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    );
    s
}
