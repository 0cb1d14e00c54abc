//! Connectivity lifecycle: station join, master config pull,
//! registration, reconnects.

use crate::mock_device::{
    GATEWAY, Harness, LOCAL_IP, MASTER_PASSWORD, MASTER_TIME, master_config, provisioned_device,
};

use xiotagent::app::events::AppEvent;
use xiotagent::config::{DEFAULT_AP_PASSWORD, DeviceConfig};
use xiotagent::connectivity::LinkState;
use xiotagent::connectivity::states::JOIN_RETRY_MS;
use xiotagent::events::Event;
use xiotagent::transport::{Method, TransportError};

#[test]
fn provisioned_agent_registers_with_master() {
    let mut h = Harness::new(provisioned_device());
    assert!(matches!(h.sink.events[0], AppEvent::Started(LinkState::Disconnected)));

    h.bring_up();
    assert_eq!(h.dev.joins, vec![("iotinator".to_owned(), MASTER_PASSWORD.to_owned())]);
    assert_eq!(h.agent.local_ip(), Some(LOCAL_IP));
    assert_eq!(h.agent.hooks().addresses, vec![LOCAL_IP]);

    assert!(h.run_until(LinkState::Registered, 10));
    assert_eq!(h.agent.in_flight(), (false, false));
    assert_eq!(h.agent.hooks().got_config, vec![true]);
    assert_eq!(h.agent.hooks().registered, vec![true]);

    let config_url = format!("http://{}/api/config", GATEWAY);
    let register_url = format!("http://{}/api/register", GATEWAY);
    assert_eq!(h.dev.sent[0].url, config_url);
    assert_eq!(h.dev.sent[0].method, Method::Get);
    assert_eq!(h.dev.sent[1].url, register_url);
    assert_eq!(h.dev.sent[1].method, Method::Post);

    let body: serde_json::Value = serde_json::from_str(h.dev.sent[1].body.as_deref().unwrap()).unwrap();
    assert_eq!(body["name"], "kitchen");
    assert_eq!(body["ip"], LOCAL_IP.to_string());
    assert_eq!(body["MAC"], crate::mock_device::MAC_STR);
}

#[test]
fn master_time_sets_the_clock() {
    let mut h = Harness::new(provisioned_device());
    h.bring_up();
    assert!(h.run_until(LinkState::Registered, 10));
    assert_eq!(h.dev.unix, Some(MASTER_TIME));
    assert_eq!(h.sink.count(|e| matches!(e, AppEvent::ClockSet { .. })), 1);
}

#[test]
fn factory_password_never_registers() {
    let mut h = Harness::new(DeviceConfig::default());
    h.dev
        .respond("/api/config", 200, &master_config(DEFAULT_AP_PASSWORD, None));
    h.bring_up();
    h.poll_n(10);

    assert_eq!(h.agent.link_state(), LinkState::StationConnected);
    assert!(h.dev.sent_to("/api/register").is_empty());
    assert_eq!(h.dev.sent_to("/api/config").len(), 1);
}

#[test]
fn failed_pull_is_retried_after_interval() {
    let mut h = Harness::new(provisioned_device());
    h.dev.fail("/api/config", TransportError::Timeout);
    h.bring_up();
    assert!(h.run_until(LinkState::AwaitingMasterConfig, 4));
    h.poll_n(5);
    assert_eq!(h.dev.sent_to("/api/config").len(), 1);
    assert_eq!(h.agent.in_flight(), (true, false));
    assert_eq!(h.sink.count(|e| *e == AppEvent::GotConfig(false)), 1);

    h.dev
        .respond("/api/config", 200, &master_config(MASTER_PASSWORD, None));
    h.step(h.agent.config().config_pull_interval_ms.into());
    assert_eq!(h.dev.sent_to("/api/config").len(), 2);
    assert!(h.run_until(LinkState::Registered, 6));
}

#[test]
fn refused_registration_is_retried() {
    let mut h = Harness::new(provisioned_device());
    h.dev.respond("/api/register", 500, "");
    h.bring_up();
    assert!(h.run_until(LinkState::AwaitingRegistration, 6));
    h.poll_n(3);
    assert_eq!(h.dev.sent_to("/api/register").len(), 1);
    assert_eq!(h.agent.hooks().registered, vec![false]);

    h.dev.respond("/api/register", 200, "{}");
    h.step(h.agent.config().register_interval_ms.into());
    assert!(h.run_until(LinkState::Registered, 4));
    assert_eq!(h.agent.hooks().registered, vec![false, true]);
}

#[test]
fn new_ap_credentials_are_stored_and_rejoined() {
    let mut h = Harness::new(provisioned_device());
    h.dev.respond("/api/config", 200, &master_config("brandnewpass", None));
    h.bring_up();
    h.poll_n(3);

    assert_eq!(h.agent.link_state(), LinkState::ConnectingStation);
    assert_eq!(h.agent.device().ap_password.as_str(), "brandnewpass");
    assert_eq!(h.store.saves.get(), 1);
    assert_eq!(
        h.store.stored.borrow().as_ref().map(|d| d.ap_password.as_str().to_owned()),
        Some("brandnewpass".to_owned())
    );
    h.poll();
    assert_eq!(h.dev.joins.last().unwrap().1, "brandnewpass");
}

#[test]
fn unsaved_ap_credentials_are_not_applied() {
    let mut h = Harness::new(provisioned_device());
    h.store.fail_writes.set(true);
    h.dev.respond("/api/config", 200, &master_config("brandnewpass", None));
    h.bring_up();

    // Pull succeeds, the store refuses; registration goes ahead on the old
    // credentials.
    assert!(h.run_until(LinkState::Registered, 10));
    assert_eq!(h.agent.device().ap_password.as_str(), MASTER_PASSWORD);
    assert_eq!(h.dev.joins.len(), 1);
}

#[test]
fn disconnect_forces_a_rejoin() {
    let mut h = Harness::new(provisioned_device());
    h.bring_up();
    assert!(h.run_until(LinkState::Registered, 10));

    h.push(Event::Disconnected);
    h.poll();
    assert!(h.sink.events.contains(&AppEvent::LinkChanged {
        from: LinkState::Registered,
        to: LinkState::ConnectingStation,
    }));
    assert_eq!(h.agent.local_ip(), None);
    assert_eq!(h.dev.joins.len(), 2);

    // A fresh address runs the whole handshake again.
    h.push(Event::GotAddress { ip: LOCAL_IP });
    assert!(h.run_until(LinkState::Registered, 10));
    assert_eq!(h.dev.sent_to("/api/config").len(), 2);
    assert_eq!(h.dev.sent_to("/api/register").len(), 2);
}

#[test]
fn disconnect_during_pull_clears_in_flight_flags() {
    let mut h = Harness::new(provisioned_device());
    h.dev.fail("/api/config", TransportError::Timeout);
    h.bring_up();
    assert!(h.run_until(LinkState::AwaitingMasterConfig, 4));
    h.poll();
    assert_eq!(h.agent.in_flight(), (true, false));

    h.push(Event::Disconnected);
    h.poll();
    assert_eq!(h.agent.link_state(), LinkState::ConnectingStation);
    assert_eq!(h.agent.in_flight(), (false, false));

    // Nothing is retried against the dead link.
    h.step(u64::from(h.agent.config().config_pull_interval_ms));
    h.poll_n(3);
    assert_eq!(h.dev.sent_to("/api/config").len(), 1);
    assert!(h.dev.sent_to("/api/register").is_empty());
}

#[test]
fn disconnect_while_joining_is_ignored() {
    let mut h = Harness::new(provisioned_device());
    assert!(h.run_until(LinkState::ConnectingStation, 4));
    h.push(Event::Disconnected);
    h.poll_n(3);
    assert_eq!(h.agent.link_state(), LinkState::ConnectingStation);
    assert_eq!(h.dev.joins.len(), 1);
}

#[test]
fn silent_join_is_retried() {
    let mut h = Harness::new(provisioned_device());
    assert!(h.run_until(LinkState::ConnectingStation, 4));
    h.poll();
    assert_eq!(h.dev.joins.len(), 1);

    h.step(u64::from(JOIN_RETRY_MS));
    assert_eq!(h.dev.joins.len(), 2);
}

#[test]
fn autonomous_device_syncs_time_and_skips_master() {
    let mut device = DeviceConfig::default();
    device.autonomous = true;
    device.home_ssid = heapless::String::try_from("HomeNet").unwrap();
    device.home_password = heapless::String::try_from("homepass1").unwrap();
    device.time_offset_minutes = 60;

    let mut h = Harness::new(device);
    h.bring_up();
    h.poll_n(5);

    assert_eq!(h.dev.joins, vec![("HomeNet".to_owned(), "homepass1".to_owned())]);
    assert_eq!(h.dev.syncs, vec![("pool.ntp.org".to_owned(), 60)]);
    assert_eq!(h.agent.link_state(), LinkState::StationConnected);
    assert!(h.dev.sent.is_empty());

    h.push(Event::TimeSynced { unix_secs: MASTER_TIME });
    h.poll();
    assert_eq!(h.dev.unix, Some(MASTER_TIME));
}

#[test]
fn autonomous_device_without_ssid_stays_down() {
    let mut device = DeviceConfig::default();
    device.autonomous = true;
    let mut h = Harness::new(device);
    h.poll_n(5);
    assert_eq!(h.agent.link_state(), LinkState::Disconnected);
    assert!(h.dev.joins.is_empty());
}
