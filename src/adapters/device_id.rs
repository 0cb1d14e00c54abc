//! Device identity derived from the ESP32 factory MAC address.
//!
//! The MAC identifies the agent everywhere: in the master's registry, as
//! the key of its module record on the backend, and in every telemetry
//! body.  It is rendered lower-case and colon-separated
//! (`de:ad:be:ef:ca:fe`).

pub use crate::app::service::format_mac as mac_string;

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: a fixed, recognisable MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}
