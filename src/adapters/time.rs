//! Clock adapter.
//!
//! Implements [`ClockPort`]: monotonic uptime plus the wall clock used to
//! date telemetry.
//!
//! - **`target_os = "espidf"`** — `esp_timer_get_time()` for uptime, the
//!   libc clock (`gettimeofday`/`settimeofday`) for wall time and
//!   `EspSntp` for public time sync.
//! - **`not(target_os = "espidf")`** — `std::time` for host-side tests and
//!   simulation.
//!
//! The wall clock holds *local* time: sync results are shifted by the
//! configured offset before they are reported.

use log::{info, warn};

use crate::app::ports::ClockPort;
use crate::events::{Event, EventQueue};

/// Anything before 2020-01-01 means the clock was never set.
const EPOCH_2020: i64 = 1_577_836_800;

pub struct ClockAdapter {
    events: &'static EventQueue,
    #[cfg(target_os = "espidf")]
    sntp: Option<esp_idf_svc::sntp::EspSntp<'static>>,
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
    /// Wall clock as `(unix_secs, uptime_ms)` at the moment it was set.
    #[cfg(not(target_os = "espidf"))]
    wall: Option<(i64, u64)>,
}

impl ClockAdapter {
    pub fn new(events: &'static EventQueue) -> Self {
        Self {
            events,
            #[cfg(target_os = "espidf")]
            sntp: None,
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
            #[cfg(not(target_os = "espidf"))]
            wall: None,
        }
    }
}

#[cfg(target_os = "espidf")]
impl ClockPort for ClockAdapter {
    fn now_ms(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1_000
    }

    fn unix_time(&self) -> Option<i64> {
        let mut tv = esp_idf_svc::sys::timeval { tv_sec: 0, tv_usec: 0 };
        if unsafe { esp_idf_svc::sys::gettimeofday(&mut tv, core::ptr::null_mut()) } != 0 {
            return None;
        }
        let secs = tv.tv_sec as i64;
        (secs >= EPOCH_2020).then_some(secs)
    }

    fn set_unix_time(&mut self, unix_secs: i64) {
        let tv = esp_idf_svc::sys::timeval {
            tv_sec: unix_secs as esp_idf_svc::sys::time_t,
            tv_usec: 0,
        };
        if unsafe { esp_idf_svc::sys::settimeofday(&tv, core::ptr::null()) } != 0 {
            warn!("Clock: settimeofday failed");
        }
    }

    fn start_sync(&mut self, ntp_host: &str, offset_minutes: i16) {
        use esp_idf_svc::sntp::{EspSntp, SntpConf};

        // drop any previous client before starting a new one
        self.sntp = None;

        // the SNTP client keeps the server name for its whole lifetime
        let host: &'static str = Box::leak(ntp_host.to_owned().into_boxed_str());
        let conf = SntpConf {
            servers: [host],
            ..Default::default()
        };
        let events = self.events;
        let offset_secs = i64::from(offset_minutes) * 60;
        match EspSntp::new_with_callback(&conf, move |since_epoch| {
            events.push(Event::TimeSynced {
                unix_secs: since_epoch.as_secs() as i64 + offset_secs,
            });
        }) {
            Ok(sntp) => {
                info!("Clock: syncing with {}", host);
                self.sntp = Some(sntp);
            }
            Err(e) => {
                warn!("Clock: SNTP start failed: {:?}", e);
                self.events.push(Event::TimeSyncFailed);
            }
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl ClockPort for ClockAdapter {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn unix_time(&self) -> Option<i64> {
        let (base, set_at_ms) = self.wall?;
        Some(base + (self.now_ms().saturating_sub(set_at_ms) / 1_000) as i64)
    }

    fn set_unix_time(&mut self, unix_secs: i64) {
        if unix_secs < EPOCH_2020 {
            warn!("Clock(sim): ignoring implausible time {}", unix_secs);
            return;
        }
        self.wall = Some((unix_secs, self.now_ms()));
    }

    fn start_sync(&mut self, ntp_host: &str, offset_minutes: i16) {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64);
        match now {
            Ok(secs) => {
                info!("Clock(sim): synced from host clock instead of {}", ntp_host);
                self.events.push(Event::TimeSynced {
                    unix_secs: secs + i64::from(offset_minutes) * 60,
                });
            }
            Err(_) => {
                self.events.push(Event::TimeSyncFailed);
            }
        }
    }
}
