//! WiFi station-mode adapter.
//!
//! Implements [`StationPort`].  Connection progress never comes back
//! through return values: the driver's system-event callbacks push
//! [`Event::GotAddress`] and [`Event::Disconnected`] onto the shared
//! [`EventQueue`], and the poll loop picks them up.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: ESP-IDF WiFi driver via `esp_idf_svc::wifi`.
//! - **all other targets**: simulation that "associates" instantly with a
//!   fixed address on `192.168.4.0/24`.
//!
//! Reconnection is not handled here; the connectivity machine asks for a
//! fresh [`begin`](StationPort::begin) after every disconnect.

use core::net::Ipv4Addr;

use log::info;

use crate::app::ports::StationPort;
use crate::error::StationError;
use crate::events::EventQueue;
#[cfg(not(target_os = "espidf"))]
use crate::events::Event;

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

/// 1-32 printable ASCII bytes.
pub fn validate_ssid(ssid: &str) -> Result<(), StationError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(StationError::InvalidSsid);
    }
    Ok(())
}

/// Empty (open network) or 8-64 bytes (WPA2).
pub fn validate_password(password: &str) -> Result<(), StationError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(StationError::InvalidPassword);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// Simulation constants
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
pub const SIM_GATEWAY: Ipv4Addr = Ipv4Addr::new(192, 168, 4, 1);
#[cfg(not(target_os = "espidf"))]
pub const SIM_ADDRESS: Ipv4Addr = Ipv4Addr::new(192, 168, 4, 2);

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter {
    events: &'static EventQueue,
    ssid: heapless::String<32>,
    #[cfg(target_os = "espidf")]
    wifi: esp_idf_svc::wifi::EspWifi<'static>,
    #[cfg(target_os = "espidf")]
    _subscriptions: (
        esp_idf_svc::eventloop::EspSubscription<'static, esp_idf_svc::eventloop::System>,
        esp_idf_svc::eventloop::EspSubscription<'static, esp_idf_svc::eventloop::System>,
    ),
    #[cfg(not(target_os = "espidf"))]
    associated: bool,
}

#[cfg(target_os = "espidf")]
impl WifiAdapter {
    /// Take the modem and hook the driver's system events into `events`.
    pub fn new(
        modem: esp_idf_svc::hal::modem::Modem,
        sysloop: esp_idf_svc::eventloop::EspSystemEventLoop,
        nvs: Option<esp_idf_svc::nvs::EspDefaultNvsPartition>,
        events: &'static EventQueue,
    ) -> Result<Self, StationError> {
        use crate::events::Event;
        use esp_idf_svc::netif::IpEvent;
        use esp_idf_svc::wifi::{EspWifi, WifiEvent};

        let wifi = EspWifi::new(modem, sysloop.clone(), nvs).map_err(|_| StationError::DriverFailed)?;

        let wifi_sub = sysloop
            .subscribe::<WifiEvent, _>(move |event| {
                if let WifiEvent::StaDisconnected(_) = event {
                    events.push(Event::Disconnected);
                }
            })
            .map_err(|_| StationError::DriverFailed)?;
        let ip_sub = sysloop
            .subscribe::<IpEvent, _>(move |event| {
                if let IpEvent::DhcpIpAssigned(assignment) = event {
                    events.push(Event::GotAddress { ip: assignment.ip() });
                }
            })
            .map_err(|_| StationError::DriverFailed)?;

        info!("WiFi: driver initialised");
        Ok(Self {
            events,
            ssid: heapless::String::new(),
            wifi,
            _subscriptions: (wifi_sub, ip_sub),
        })
    }

    fn platform_begin(&mut self, ssid: &str, password: &str) -> Result<(), StationError> {
        use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration};

        let auth_method = if password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        let config = Configuration::Client(ClientConfiguration {
            ssid: ssid.try_into().map_err(|()| StationError::InvalidSsid)?,
            password: password.try_into().map_err(|()| StationError::InvalidPassword)?,
            auth_method,
            ..Default::default()
        });

        if self.wifi.is_started().unwrap_or(false) {
            let _ = self.wifi.disconnect();
        }
        self.wifi
            .set_configuration(&config)
            .map_err(|_| StationError::DriverFailed)?;
        if !self.wifi.is_started().unwrap_or(false) {
            self.wifi.start().map_err(|_| StationError::DriverFailed)?;
        }
        self.wifi.connect().map_err(|_| StationError::DriverFailed)
    }

    fn platform_gateway(&self) -> Option<Ipv4Addr> {
        if !self.wifi.is_connected().unwrap_or(false) {
            return None;
        }
        let info = self.wifi.sta_netif().get_ip_info().ok()?;
        Some(info.subnet.gateway)
    }
}

#[cfg(not(target_os = "espidf"))]
impl WifiAdapter {
    pub fn new(events: &'static EventQueue) -> Self {
        Self {
            events,
            ssid: heapless::String::new(),
            associated: false,
        }
    }

    fn platform_begin(&mut self, ssid: &str, _password: &str) -> Result<(), StationError> {
        info!("WiFi(sim): associated with '{}'", ssid);
        self.associated = true;
        self.events.push(Event::GotAddress { ip: SIM_ADDRESS });
        Ok(())
    }

    fn platform_gateway(&self) -> Option<Ipv4Addr> {
        self.associated.then_some(SIM_GATEWAY)
    }

    /// Simulate losing the access point.
    pub fn drop_link(&mut self) {
        self.associated = false;
        self.events.push(Event::Disconnected);
    }
}

impl WifiAdapter {
    /// SSID of the last accepted [`begin`](StationPort::begin).
    pub fn ssid(&self) -> &str {
        &self.ssid
    }
}

// ───────────────────────────────────────────────────────────────
// StationPort
// ───────────────────────────────────────────────────────────────

impl StationPort for WifiAdapter {
    fn begin(&mut self, ssid: &str, password: &str) -> Result<(), StationError> {
        if ssid.is_empty() {
            return Err(StationError::NoCredentials);
        }
        validate_ssid(ssid)?;
        validate_password(password)?;

        info!("WiFi: joining '{}'", ssid);
        self.platform_begin(ssid, password)?;
        self.ssid.clear();
        self.ssid.push_str(ssid).map_err(|()| StationError::InvalidSsid)?;
        Ok(())
    }

    fn gateway(&self) -> Option<Ipv4Addr> {
        self.platform_gateway()
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
