//! Fuzz target: inbound JSON envelopes
//!
//! Feeds arbitrary bytes to every body parser an agent exposes to the
//! network (master config, rename, OTA, SMS).  Parsing must fail with a
//! typed error, never panic, and an accepted master config must survive
//! the snapshot size caps.
//!
//! cargo fuzz run fuzz_inbound_json

#![no_main]

use libfuzzer_sys::fuzz_target;
use xiotagent::protocol::envelope::{self, DeviceSnapshot, MasterConfig, OtaRequest, RenameRequest, SmsRequest, SnapshotLimits};

fuzz_target!(|data: &[u8]| {
    let Ok(body) = core::str::from_utf8(data) else {
        return;
    };

    if let Ok(cfg) = envelope::parse::<MasterConfig>(body) {
        // Whatever the master sends must be usable as a snapshot payload.
        let snapshot = DeviceSnapshot {
            name: cfg.ap_ssid.clone(),
            ip: String::new(),
            mac: String::new(),
            ui_class_name: String::new(),
            heap: 0,
            can_sleep: false,
            custom: Some(cfg.ap_password),
            global_status: Some(cfg.ap_ssid),
        }
        .capped(SnapshotLimits {
            max_custom_len: 200,
            max_global_status_len: 30,
        });
        assert!(snapshot.custom.as_ref().is_some_and(|c| c.len() < 200 || c == envelope::CUSTOM_DATA_TOO_BIG));
        let _ = snapshot.to_json();
    }
    let _ = envelope::parse::<RenameRequest>(body);
    let _ = envelope::parse::<OtaRequest>(body);
    let _ = envelope::parse::<SmsRequest>(body);
});
