//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the logger (UART / USB-CDC on the device, stderr on the host), one
//! tagged line per event.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started(state) => info!("START | initial_link={:?}", state),
            AppEvent::LinkChanged { from, to } => info!("LINK | {:?} -> {:?}", from, to),
            AppEvent::GotConfig(ok) => info!("MASTER | config pull ok={}", ok),
            AppEvent::Registered(ok) => info!("MASTER | registration ok={}", ok),
            AppEvent::Refreshed(ok) => info!("MASTER | refresh ok={}", ok),
            AppEvent::ClockSet { unix_secs } => info!("CLOCK | wall clock valid at {}", unix_secs),
            AppEvent::OtaStateChanged(state) => info!("OTA | state={:?}", state),
            AppEvent::OtaProgress(pct) => info!("OTA | {}%", pct),
            AppEvent::OtaFailed(failure) => warn!("OTA | transfer failed: {}", failure),
            AppEvent::MessageDelivered { kind, attempts } => {
                info!("QUEUE | delivered {} after {} attempt(s)", kind.collection(), attempts);
            }
            AppEvent::MessageDropped { kind, attempts } => {
                warn!("QUEUE | dropped {} after {} attempt(s)", kind.collection(), attempts);
            }
            AppEvent::MessageLost { lost } => warn!("QUEUE | full, {} message(s) lost", lost),
            AppEvent::Restarting => info!("SYSTEM | restarting"),
        }
    }
}
