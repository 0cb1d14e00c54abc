//! Inbound HTTP surface: local handlers, relaying and rejection.

use crate::mock_device::{Harness, LOCAL_IP, MAC_STR, RecordingHooks, provisioned_device};

use xiotagent::app::hooks::DataReply;
use xiotagent::protocol::api::ContentType;
use xiotagent::protocol::envelope::{CUSTOM_DATA_TOO_BIG, GLOBAL_STATUS_TOO_BIG};
use xiotagent::transport::Method;

fn json(body: &str) -> serde_json::Value {
    serde_json::from_str(body).expect("response body is JSON")
}

// ── Ping / data ───────────────────────────────────────────────

#[test]
fn ping_answers_with_the_snapshot() {
    let mut h = Harness::new(provisioned_device());
    let resp = h.request(Method::Get, "/api/ping", "");
    assert_eq!(resp.status, 200);
    assert_eq!(resp.content_type, ContentType::Json);

    let v = json(&resp.body);
    assert_eq!(v["name"], "kitchen");
    assert_eq!(v["MAC"], MAC_STR);
    assert_eq!(v["ip"], "");
    assert_eq!(v["heap"], 120_000);
    assert_eq!(v["uiClassName"], "genericModule");
    assert_eq!(v["canSleep"], false);
}

#[test]
fn snapshot_reports_address_once_connected() {
    let mut h = Harness::new(provisioned_device());
    h.bring_up();
    let v = json(&h.request(Method::Get, "/api/ping", "").body);
    assert_eq!(v["ip"], LOCAL_IP.to_string());
}

#[test]
fn oversized_hook_payloads_are_replaced() {
    let hooks = RecordingHooks {
        custom: Some("x".repeat(250)),
        status: Some("s".repeat(40)),
        ..RecordingHooks::default()
    };
    let mut h = Harness::with_hooks(provisioned_device(), hooks);
    let v = json(&h.request(Method::Get, "/api/ping", "").body);
    assert_eq!(v["custom"], CUSTOM_DATA_TOO_BIG);
    assert_eq!(v["globalStatus"], GLOBAL_STATUS_TOO_BIG);
}

#[test]
fn data_get_does_not_reach_the_application() {
    let mut h = Harness::new(provisioned_device());
    let resp = h.request(Method::Get, "/api/data", "");
    assert_eq!(resp.status, 200);
    assert_eq!(json(&resp.body)["name"], "kitchen");
    assert!(h.agent.hooks().data_bodies.is_empty());
    assert!(!h.agent.refresh_needed());
}

#[test]
fn data_write_goes_to_the_application() {
    let mut h = Harness::new(provisioned_device());
    let resp = h.request(Method::Put, "/api/data", "{\"level\":3}");
    assert_eq!(resp.status, 200);
    assert_eq!(json(&resp.body)["MAC"], MAC_STR);
    assert_eq!(h.agent.hooks().data_bodies, vec!["{\"level\":3}".to_owned()]);
    assert!(h.agent.refresh_needed());
}

#[test]
fn data_reply_body_is_returned_verbatim() {
    let hooks = RecordingHooks {
        data_reply: DataReply::with_body(201, "{\"accepted\":true}"),
        ..RecordingHooks::default()
    };
    let mut h = Harness::with_hooks(provisioned_device(), hooks);
    let resp = h.request(Method::Post, "/api/data", "{}");
    assert_eq!(resp.status, 201);
    assert_eq!(resp.body, "{\"accepted\":true}");
}

// ── Rename ────────────────────────────────────────────────────

#[test]
fn rename_persists_then_applies() {
    let mut h = Harness::new(provisioned_device());
    let resp = h.request(Method::Post, "/api/rename", "{\"name\":\"hall\"}");
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body, "{}");
    assert_eq!(h.agent.device().name.as_str(), "hall");
    assert_eq!(h.store.saves.get(), 1);
    assert_eq!(
        h.store.stored.borrow().as_ref().map(|d| d.name.as_str().to_owned()),
        Some("hall".to_owned())
    );
    assert!(h.agent.refresh_needed());
}

#[test]
fn rename_rejects_malformed_body() {
    let mut h = Harness::new(provisioned_device());
    for body in ["", "{\"name\":", "{\"name\":7}", "{}"] {
        let resp = h.request(Method::Post, "/api/rename", body);
        assert_eq!(resp.status, 500, "body {body:?}");
        assert_eq!(resp.body, "{}");
    }
    assert_eq!(h.agent.device().name.as_str(), "kitchen");
    assert_eq!(h.store.saves.get(), 0);
}

#[test]
fn rename_rejects_unusable_names() {
    let mut h = Harness::new(provisioned_device());
    let resp = h.request(Method::Post, "/api/rename", "{\"name\":\"a name far longer than twenty chars\"}");
    assert_eq!(resp.status, 500);
    assert!(json(&resp.body)["error"].is_string());

    let resp = h.request(Method::Post, "/api/rename", "{\"name\":\"   \"}");
    assert_eq!(resp.status, 500);

    assert_eq!(h.agent.device().name.as_str(), "kitchen");
    assert!(!h.agent.refresh_needed());
}

#[test]
fn rename_is_not_applied_when_store_fails() {
    let mut h = Harness::new(provisioned_device());
    h.store.fail_writes.set(true);
    let resp = h.request(Method::Post, "/api/rename", "{\"name\":\"hall\"}");
    assert_eq!(resp.status, 500);
    assert_eq!(h.agent.device().name.as_str(), "kitchen");
    assert!(!h.agent.refresh_needed());
}

// ── SMS ───────────────────────────────────────────────────────

#[test]
fn accepted_sms_answers_with_snapshot() {
    let hooks = RecordingHooks {
        accept_sms: true,
        ..RecordingHooks::default()
    };
    let mut h = Harness::with_hooks(provisioned_device(), hooks);
    let resp = h.request(
        Method::Post,
        "/api/sms",
        "{\"message\":\"open\",\"phoneNumber\":\"+33611223344\",\"isAdmin\":true}",
    );
    assert_eq!(resp.status, 200);
    assert_eq!(json(&resp.body)["name"], "kitchen");
    assert_eq!(
        h.agent.hooks().sms,
        vec![("+33611223344".to_owned(), true, "open".to_owned())]
    );
}

#[test]
fn declined_sms_is_an_empty_500() {
    let mut h = Harness::new(provisioned_device());
    let resp = h.request(Method::Post, "/api/sms", "{\"message\":\"x\",\"phoneNumber\":\"1\"}");
    assert_eq!(resp.status, 500);
    assert_eq!(resp.body, "");
    assert!(!h.agent.hooks().sms[0].1);
}

#[test]
fn malformed_sms_never_reaches_the_application() {
    let mut h = Harness::new(provisioned_device());
    let resp = h.request(Method::Post, "/api/sms", "{\"message\":\"x\"}");
    assert_eq!(resp.status, 500);
    assert!(h.agent.hooks().sms.is_empty());
}

// ── Module reset ──────────────────────────────────────────────

#[test]
fn module_reset_erases_the_store() {
    let mut h = Harness::new(provisioned_device());
    *h.store.stored.borrow_mut() = Some(provisioned_device());
    let resp = h.request(Method::Get, "/api/moduleReset", "");
    assert_eq!(resp.status, 200);
    assert_eq!(h.store.resets.get(), 1);
    assert!(h.store.stored.borrow().is_none());
}

#[test]
fn module_reset_failure_is_reported() {
    let mut h = Harness::new(provisioned_device());
    h.store.fail_writes.set(true);
    let resp = h.request(Method::Get, "/api/moduleReset", "");
    assert_eq!(resp.status, 500);
}

// ── Routing ───────────────────────────────────────────────────

#[test]
fn unknown_route_and_wrong_verb_are_rejected() {
    let mut h = Harness::new(provisioned_device());
    assert_eq!(h.request(Method::Get, "/api/unknown", "").status, 404);
    assert_eq!(h.request(Method::Post, "/api/ping", "").status, 405);
    assert_eq!(h.request(Method::Get, "/api/sms", "").status, 405);
    assert!(h.agent.hooks().sms.is_empty());
}

#[test]
fn forwarded_request_is_relayed_verbatim() {
    let mut h = Harness::new(provisioned_device());
    h.dev.respond("192.168.4.7", 207, "{\"name\":\"peer\"}");

    let resp = h.forwarded(Method::Post, "/api/rename", "{\"name\":\"porch\"}", Some("192.168.4.7"));
    assert_eq!(resp.status, 207);
    assert_eq!(resp.body, "{\"name\":\"peer\"}");

    assert_eq!(h.dev.sent.len(), 1);
    assert_eq!(h.dev.sent[0].url, "http://192.168.4.7/api/rename");
    assert_eq!(h.dev.sent[0].body.as_deref(), Some("{\"name\":\"porch\"}"));
    // nothing changed locally
    assert_eq!(h.agent.device().name.as_str(), "kitchen");
    assert_eq!(h.store.saves.get(), 0);
}

#[test]
fn unreachable_peer_is_a_502() {
    let mut h = Harness::new(provisioned_device());
    let resp = h.forwarded(Method::Get, "/api/ping", "", Some("192.168.4.99"));
    assert_eq!(resp.status, 502);
}

#[test]
fn sms_ignores_the_forward_header() {
    let hooks = RecordingHooks {
        accept_sms: true,
        ..RecordingHooks::default()
    };
    let mut h = Harness::with_hooks(provisioned_device(), hooks);
    let resp = h.forwarded(
        Method::Post,
        "/api/sms",
        "{\"message\":\"m\",\"phoneNumber\":\"2\"}",
        Some("192.168.4.7"),
    );
    assert_eq!(resp.status, 200);
    assert!(h.dev.sent.is_empty());
}

#[test]
fn forwarded_data_skips_the_application() {
    let mut h = Harness::new(provisioned_device());
    h.dev.respond("192.168.4.8", 200, "{\"level\":9}");

    let resp = h.forwarded(Method::Put, "/api/data", "{\"level\":1}", Some("192.168.4.8"));
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body, "{\"level\":9}");
    assert_eq!(h.dev.sent[0].method, Method::Put);
    assert!(h.agent.hooks().data_bodies.is_empty());
    assert!(!h.agent.refresh_needed());
}
