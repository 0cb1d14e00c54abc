//! Poll-loop orchestration: telemetry delivery, refresh pushes, timers
//! and the application loop hook.

use crate::mock_device::{
    BACKEND_URL, GATEWAY, Harness, MAC_STR, MASTER_PASSWORD, MASTER_TIME, master_config, provisioned_device,
    with_backend,
};

use xiotagent::app::events::AppEvent;
use xiotagent::connectivity::LinkState;
use xiotagent::delivery::MessageKind;
use xiotagent::transport::{Method, TransportError};

/// Registered, with the backend configured and no wall clock yet.
fn registered_without_clock(send_ping: bool) -> Harness {
    let mut device = with_backend(provisioned_device());
    device.send_ping = send_ping;
    let mut h = Harness::new(device);
    h.dev.respond("/api/config", 200, &master_config(MASTER_PASSWORD, None));
    h.bring_up();
    assert!(h.run_until(LinkState::Registered, 10));
    h
}

// ── Module record ─────────────────────────────────────────────

#[test]
fn module_record_is_put_once_clock_is_valid() {
    let mut h = Harness::new(with_backend(provisioned_device()));
    h.bring_up();
    assert!(h.run_until(LinkState::Registered, 10));
    h.poll_n(5);

    let puts = h.dev.sent_to(BACKEND_URL);
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].method, Method::Put);
    assert_eq!(
        puts[0].url,
        format!("{}/module/{}.json?auth=secret-token", BACKEND_URL, MAC_STR)
    );

    let body: serde_json::Value = serde_json::from_str(puts[0].body.as_deref().unwrap()).unwrap();
    assert_eq!(body["type"], "generic");
    assert_eq!(body["name"], "kitchen");
    assert_eq!(body["mac"], MAC_STR);
    assert_eq!(body["date"], "2023/11/14T22:13:20");

    assert_eq!(
        h.sink.count(|e| matches!(
            e,
            AppEvent::MessageDelivered {
                kind: MessageKind::ModuleRecord,
                attempts: 1
            }
        )),
        1
    );
    assert!(h.agent.queue().is_empty());
}

#[test]
fn clock_without_backend_sends_nothing() {
    let mut device = provisioned_device();
    device.send_ping = true;
    let mut h = Harness::new(device);
    h.bring_up();
    assert!(h.run_until(LinkState::Registered, 10));

    h.step(u64::from(h.agent.config().ping_period_ms));
    h.poll_n(3);

    assert_eq!(h.sink.count(|e| matches!(e, AppEvent::ClockSet { .. })), 1);
    assert!(h.agent.queue().is_empty());
    assert!(h.dev.sent.iter().all(|s| s.url.contains(&GATEWAY.to_string())));
}

// ── Ping ──────────────────────────────────────────────────────

#[test]
fn ping_waits_for_the_clock() {
    let mut h = registered_without_clock(true);

    h.step(u64::from(h.agent.config().ping_period_ms));
    assert_eq!(h.agent.queue().len(), 1);
    assert!(h.dev.sent_to(BACKEND_URL).is_empty());

    // Clock arrives: the ping goes out first, the module record queues
    // behind it.
    h.dev.unix = Some(MASTER_TIME);
    h.poll();
    let sent = h.dev.sent_to(BACKEND_URL);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].method, Method::Post);
    assert_eq!(sent[0].url, format!("{}/ping.json?auth=secret-token", BACKEND_URL));
    let body: serde_json::Value = serde_json::from_str(sent[0].body.as_deref().unwrap()).unwrap();
    assert_eq!(body["lost"], 0);
    assert_eq!(body["failed"], 0);
    assert_eq!(body["retried"], 0);
    assert_eq!(h.agent.queue().len(), 1);

    h.step(u64::from(h.agent.config().base_delay_ms));
    assert!(h.agent.queue().is_empty());
    assert_eq!(h.dev.sent_to("/module/").len(), 1);
}

#[test]
fn ping_disabled_never_enqueues() {
    let mut h = registered_without_clock(false);
    h.dev.unix = Some(MASTER_TIME);
    h.poll();
    h.dev.clear_sent();

    h.step(u64::from(h.agent.config().ping_period_ms) * 3);
    assert!(h.dev.sent_to("/ping.json").is_empty());
}

// ── Retry and loss ────────────────────────────────────────────

#[test]
fn undeliverable_message_is_dropped_after_max_retry() {
    let mut h = Harness::new(with_backend(provisioned_device()));
    h.dev.fail(BACKEND_URL, TransportError::Connect);
    h.bring_up();
    assert!(h.run_until(LinkState::Registered, 10));
    assert_eq!(h.dev.sent_to(BACKEND_URL).len(), 1);

    let max_retry = usize::from(h.agent.config().max_retry);
    let ceiling = u64::from(h.agent.config().max_delay_ms);
    for _ in 0..max_retry + 2 {
        h.step(ceiling);
    }

    assert_eq!(h.dev.sent_to(BACKEND_URL).len(), max_retry);
    assert!(h.agent.queue().is_empty());
    assert!(h.sink.events.contains(&AppEvent::MessageDropped {
        kind: MessageKind::ModuleRecord,
        attempts: h.agent.config().max_retry,
    }));
}

#[test]
fn rejected_status_counts_as_failure() {
    let mut h = Harness::new(with_backend(provisioned_device()));
    h.dev.respond(BACKEND_URL, 401, "{\"error\":\"Permission denied\"}");
    h.bring_up();
    assert!(h.run_until(LinkState::Registered, 10));

    assert_eq!(h.agent.queue().len(), 1);
    assert_eq!(h.agent.queue().peek().unwrap().retry_count(), 1);
    assert_eq!(h.agent.queue().counters().retried, 1);
}

#[test]
fn full_queue_reports_lost_messages() {
    let mut h = registered_without_clock(false);
    let capacity = h.agent.queue().capacity();
    h.agent.hooks_mut().pending_logs = (0..capacity + 5).map(|i| format!("line {i}")).collect();
    h.poll();

    assert_eq!(h.agent.queue().len(), capacity);
    assert_eq!(h.agent.queue().counters().lost, 5);
    assert!(h.sink.events.contains(&AppEvent::MessageLost { lost: 5 }));
}

#[test]
fn outbox_defers_application_telemetry() {
    let mut h = registered_without_clock(false);
    assert!(h.agent.outbox(&h.dev).alert("door open"));
    assert_eq!(h.agent.queue().len(), 1);

    h.dev.unix = Some(MASTER_TIME);
    h.poll();
    let alerts = h.dev.sent_to("/alert.json");
    assert_eq!(alerts.len(), 1);
    let body: serde_json::Value = serde_json::from_str(alerts[0].body.as_deref().unwrap()).unwrap();
    assert_eq!(body["message"], "door open");
    // composed before the clock was set, dated when sent
    assert_eq!(body["date"], "2023/11/14T22:13:20");
}

// ── Refresh ───────────────────────────────────────────────────

#[test]
fn local_change_is_pushed_on_the_refresh_timer() {
    let mut h = Harness::new(provisioned_device());
    h.bring_up();
    assert!(h.run_until(LinkState::Registered, 10));

    h.request(Method::Post, "/api/data", "{\"on\":true}");
    assert!(h.agent.refresh_needed());
    h.poll();
    assert!(h.dev.sent_to("/api/refresh").is_empty());

    h.step(u64::from(h.agent.config().refresh_interval_ms));
    let refresh = h.dev.sent_to("/api/refresh");
    assert_eq!(refresh.len(), 1);
    assert_eq!(refresh[0].url, format!("http://{}/api/refresh", GATEWAY));
    assert!(!h.agent.refresh_needed());
    assert!(h.sink.events.contains(&AppEvent::Refreshed(true)));

    h.step(u64::from(h.agent.config().refresh_interval_ms));
    assert_eq!(h.dev.sent_to("/api/refresh").len(), 1);
}

#[test]
fn failed_refresh_is_retried() {
    let mut h = Harness::new(provisioned_device());
    h.dev.respond("/api/refresh", 503, "");
    h.bring_up();
    assert!(h.run_until(LinkState::Registered, 10));

    h.request(Method::Post, "/api/rename", "{\"name\":\"hall\"}");
    let interval = u64::from(h.agent.config().refresh_interval_ms);
    h.step(interval);
    assert!(h.agent.refresh_needed());
    assert!(h.sink.events.contains(&AppEvent::Refreshed(false)));

    h.dev.respond("/api/refresh", 200, "{}");
    h.step(interval);
    assert!(!h.agent.refresh_needed());
    assert_eq!(h.dev.sent_to("/api/refresh").len(), 2);
}

#[test]
fn refresh_waits_for_the_station() {
    let mut h = Harness::new(provisioned_device());
    h.request(Method::Put, "/api/data", "{}");
    h.step(u64::from(h.agent.config().refresh_interval_ms));
    assert!(h.dev.sent.is_empty());
    assert!(h.agent.refresh_needed());
}

// ── Timers and hooks ──────────────────────────────────────────

#[test]
fn restart_waits_for_the_delay() {
    let mut h = Harness::new(provisioned_device());
    let delay = u64::from(h.agent.config().restart_delay_ms);

    let resp = h.request(Method::Get, "/api/restart", "");
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body, "restarting");
    // a second request does not move the deadline
    h.request(Method::Get, "/api/restart", "");

    h.step(delay - 1);
    assert_eq!(h.dev.restarts, 0);
    h.step(1);
    assert_eq!(h.dev.restarts, 1);
    assert!(h.sink.events.contains(&AppEvent::Restarting));

    h.step(delay * 2);
    assert_eq!(h.dev.restarts, 1);
}

#[test]
fn application_loop_runs_every_poll() {
    let mut h = Harness::new(provisioned_device());
    h.poll_n(7);
    assert_eq!(h.agent.hooks().loop_calls, 7);
}
