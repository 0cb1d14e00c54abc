//! Fuzz target: inbound request routing
//!
//! Splits the input into a path and a forwarding header and runs them
//! through `dispatch` with every verb.  A relay decision must never carry
//! a target that could rewrite the outbound URL.
//!
//! cargo fuzz run fuzz_api_dispatch

#![no_main]

use libfuzzer_sys::fuzz_target;
use xiotagent::protocol::api::{ApiRequest, Dispatch, dispatch};
use xiotagent::transport::Method;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };
    let (path, forward_to) = match text.split_once('\n') {
        Some((path, header)) => (path, Some(header)),
        None => (text, None),
    };

    for method in [Method::Get, Method::Post, Method::Put] {
        let request = ApiRequest {
            method,
            path,
            forward_to,
            body: "",
        };
        match dispatch(&request) {
            Dispatch::Relay { target } => {
                assert!(!target.is_empty());
                assert!(target.bytes().all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b':')));
            }
            Dispatch::Reject(response) => assert!(response.status >= 400),
            Dispatch::Local(_) => {}
        }
    }
});
