//! Port traits — the hexagonal boundary between the agent core and the
//! platform.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AgentService (domain)
//! ```
//!
//! Driven adapters (WiFi station, clock, system, config store, event
//! sinks, HTTP client) implement these traits.  The
//! [`AgentService`](super::service::AgentService) consumes them through
//! generics, so the core never touches the radio or flash directly.
//!
//! ## Security notes
//!
//! - **ConfigPort** implementations MUST validate before persisting.
//! - All port errors are typed; callers handle every variant explicitly.

use core::net::Ipv4Addr;

use crate::config::DeviceConfig;
use crate::error::StationError;
use crate::scheduler::Trigger;

pub use crate::transport::HttpTransport;

// ───────────────────────────────────────────────────────────────
// Station port (domain → WiFi driver)
// ───────────────────────────────────────────────────────────────

/// WiFi station control.  Connection progress is reported asynchronously
/// through [`Event`](crate::events::Event)s, never through return values.
pub trait StationPort {
    /// (Re)start joining `ssid`.  Returns once the request is accepted.
    fn begin(&mut self, ssid: &str, password: &str) -> Result<(), StationError>;

    /// Gateway of the current association, i.e. the master.
    fn gateway(&self) -> Option<Ipv4Addr>;
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

pub trait ClockPort {
    /// Monotonic milliseconds since boot.
    fn now_ms(&self) -> u64;

    /// Wall clock in unix seconds, `None` until it has been set.
    fn unix_time(&self) -> Option<i64>;

    /// Set the wall clock (from the master's config).
    fn set_unix_time(&mut self, unix_secs: i64);

    /// Start a public time sync.  The outcome arrives as
    /// [`Event::TimeSynced`](crate::events::Event::TimeSynced) or
    /// [`Event::TimeSyncFailed`](crate::events::Event::TimeSyncFailed).
    fn start_sync(&mut self, ntp_host: &str, offset_minutes: i16);
}

// ───────────────────────────────────────────────────────────────
// System port
// ───────────────────────────────────────────────────────────────

pub trait SystemPort {
    /// Free heap in bytes.
    fn free_heap(&self) -> u32;

    /// Factory MAC address.
    fn mac_address(&self) -> [u8; 6];

    /// Reboot the device.  Does not return on hardware; simulations and
    /// mocks record the request.
    fn restart(&mut self);
}

/// Everything the poll loop drives on the platform side.
pub trait DevicePorts: HttpTransport + StationPort + ClockPort + SystemPort {}

impl<T: HttpTransport + StationPort + ClockPort + SystemPort> DevicePorts for T {}

// ───────────────────────────────────────────────────────────────
// Event sink port (domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The core emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists the device configuration as one atomic record.
///
/// # Security
///
/// Implementations MUST validate values before persisting and reject
/// invalid ones with [`ConfigError::ValidationFailed`] rather than
/// clamping them.  A relayed `/api/rename` or a hostile master must not be
/// able to store an SSID the driver cannot join.
pub trait ConfigPort {
    /// Returns [`DeviceConfig::default()`] if nothing is stored.
    fn load(&self) -> Result<DeviceConfig, ConfigError>;

    /// Validate and persist the whole record.
    fn save(&self, config: &DeviceConfig) -> Result<(), ConfigError>;

    /// Erase the stored record; the next `load` yields defaults.
    fn reset(&self) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Scheduler delegate (decouples scheduler from the poll loop)
// ───────────────────────────────────────────────────────────────

/// Callback the [`Scheduler`](crate::scheduler::Scheduler) invokes when a
/// schedule fires.
pub trait SchedulerDelegate {
    fn on_schedule_fired(&mut self, trigger: Trigger, kind: ScheduleFiredKind);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleFiredKind {
    Periodic,
    /// Fires once, then the slot is freed.
    OneShot,
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted,
    /// A field failed validation.  Names the field and why.
    ValidationFailed(&'static str),
    /// Underlying storage is full.
    StorageFull,
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
