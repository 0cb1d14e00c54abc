//! Agent configuration.
//!
//! [`AgentConfig`] holds the tuning knobs of the core (queue sizing,
//! backoff, polling intervals, timeouts).  [`DeviceConfig`] is the
//! operator-editable state persisted through
//! [`ConfigPort`](crate::app::ports::ConfigPort).

use serde::{Deserialize, Serialize};

/// Master access-point password shipped from the factory.  A device whose
/// stored master password still equals this value is not provisioned and
/// never registers.
pub const DEFAULT_AP_PASSWORD: &str = "iotinator";

/// Master access-point SSID shipped from the factory.
pub const DEFAULT_AP_SSID: &str = "iotinator";

/// Core tuning parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    // --- Delivery queue ---
    /// Maximum number of attempts per message, first attempt included.
    pub max_retry: u8,
    /// Delay between delivery attempts while the queue is healthy (ms).
    pub base_delay_ms: u32,
    /// Added to the delay after every failed attempt (ms).
    pub delay_step_ms: u32,
    /// Upper bound of the delivery delay (ms).
    pub max_delay_ms: u32,

    // --- Master protocol ---
    /// Minimum gap between two config pulls (ms).
    pub config_pull_interval_ms: u32,
    /// Minimum gap between two registration attempts (ms).
    pub register_interval_ms: u32,
    /// Minimum gap between two refresh pushes (ms).
    pub refresh_interval_ms: u32,
    /// Custom payloads at least this long are replaced by a sentinel.
    pub max_custom_data_len: usize,
    /// Global status strings at least this long are replaced by a sentinel.
    pub max_global_status_len: usize,

    // --- Telemetry backend ---
    /// Period of the health ping (ms).
    pub ping_period_ms: u32,
    /// Language tag added to every telemetry body.
    pub lang: heapless::String<8>,

    // --- OTA ---
    /// How long the device waits for an update to start before rebooting (s).
    pub ota_wait_timeout_secs: u32,
    /// Delay between answering `/api/restart` and rebooting (ms).
    pub restart_delay_ms: u32,

    // --- Transport budgets ---
    /// Response buffer budget for outbound calls (bytes).
    pub http_buffer_size: usize,
    /// Timeout for outbound calls (ms).
    pub http_timeout_ms: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        let mut lang = heapless::String::new();
        let _ = lang.push_str("en");
        Self {
            // Delivery queue
            max_retry: 5,
            base_delay_ms: 2_000,
            delay_step_ms: 2_000,
            max_delay_ms: 30_000,

            // Master protocol
            config_pull_interval_ms: 5_000,
            register_interval_ms: 5_000,
            refresh_interval_ms: 5_000,
            max_custom_data_len: 200,
            max_global_status_len: 30,

            // Telemetry backend
            ping_period_ms: 5 * 60 * 1_000, // 5 min
            lang,

            // OTA
            ota_wait_timeout_secs: 180,
            restart_delay_ms: 300,

            // Transport budgets
            http_buffer_size: 2_048,
            http_timeout_ms: 5_000,
        }
    }
}

/// Where telemetry is delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendEndpoint {
    /// Base URL without trailing slash, e.g. `https://xiot.example.com/db`.
    pub url: String,
    /// Appended as `?auth=<secret>` to every URL when present.
    pub secret: Option<String>,
}

impl BackendEndpoint {
    /// Build an endpoint, stripping trailing slashes and treating an empty
    /// secret as no secret.
    pub fn new(url: &str, secret: Option<&str>) -> Self {
        Self {
            url: url.trim_end_matches('/').to_owned(),
            secret: secret.filter(|s| !s.is_empty()).map(str::to_owned),
        }
    }
}

/// Persisted, operator-editable device state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    // --- Identity ---
    pub name: heapless::String<20>,
    /// Widget class the master UI uses to render this agent.
    pub ui_class_name: heapless::String<32>,
    /// Module type reported in the module record.
    pub module_type: heapless::String<16>,

    // --- Network ---
    /// Talks to the internet directly instead of through a master.
    pub autonomous: bool,
    pub ap_ssid: heapless::String<32>,
    pub ap_password: heapless::String<64>,
    pub home_ssid: heapless::String<32>,
    pub home_password: heapless::String<64>,

    // --- Time ---
    pub ntp_host: heapless::String<64>,
    pub time_offset_minutes: i16,

    // --- Telemetry ---
    pub send_ping: bool,
    pub backend: Option<BackendEndpoint>,
    pub push_user: heapless::String<32>,
    pub push_token: heapless::String<32>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: fixed("xiot agent"),
            ui_class_name: fixed("genericModule"),
            module_type: fixed("generic"),
            autonomous: false,
            ap_ssid: fixed(DEFAULT_AP_SSID),
            ap_password: fixed(DEFAULT_AP_PASSWORD),
            home_ssid: heapless::String::new(),
            home_password: heapless::String::new(),
            ntp_host: fixed("pool.ntp.org"),
            time_offset_minutes: 0,
            send_ping: false,
            backend: None,
            push_user: heapless::String::new(),
            push_token: heapless::String::new(),
        }
    }
}

impl DeviceConfig {
    /// SSID the station joins: the home network for autonomous devices,
    /// the master's access point otherwise.
    pub fn station_ssid(&self) -> &str {
        if self.autonomous {
            &self.home_ssid
        } else {
            &self.ap_ssid
        }
    }

    pub fn station_password(&self) -> &str {
        if self.autonomous {
            &self.home_password
        } else {
            &self.ap_password
        }
    }

    /// The operator customised the master access point.
    pub fn is_provisioned(&self) -> bool {
        self.ap_password.as_str() != DEFAULT_AP_PASSWORD
    }

    /// Rename the device.  Fails if the name is empty or too long.
    pub fn set_name(&mut self, name: &str) -> Result<(), &'static str> {
        if name.is_empty() {
            return Err("name must not be empty");
        }
        self.name = heapless::String::try_from(name).map_err(|()| "name too long")?;
        Ok(())
    }

    /// Store new master access-point credentials.
    pub fn set_ap_credentials(&mut self, ssid: &str, password: &str) -> Result<(), &'static str> {
        let ssid = heapless::String::try_from(ssid).map_err(|()| "AP SSID too long")?;
        let password = heapless::String::try_from(password).map_err(|()| "AP password too long")?;
        self.ap_ssid = ssid;
        self.ap_password = password;
        Ok(())
    }
}

/// Copy a compile-time default into a fixed-capacity string.  Truncates
/// rather than failing; only used with literals that fit.
fn fixed<const N: usize>(s: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}
