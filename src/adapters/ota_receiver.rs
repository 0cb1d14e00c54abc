//! OTA image receiver.
//!
//! Streams a firmware image into the inactive partition and reports every
//! step as an OTA transport [`Event`]; the
//! [`OtaMachine`](crate::ota::OtaMachine) in the poll loop turns those into
//! lifecycle changes.  The HTTP server feeds it from `POST /ota/upload`.
//!
//! - **`target_os = "espidf"`**: writes through `esp_ota::OtaUpdate`.
//! - **all other targets**: counts bytes only.

use log::{info, warn};

use crate::events::{Event, EventQueue, OtaFailure};
use crate::ota::progress_percent;

/// Largest image accepted (one 1.5 MiB app slot).
pub const MAX_IMAGE_SIZE: u32 = 1_536 * 1_024;

pub struct OtaReceiver {
    events: &'static EventQueue,
    total: u32,
    written: u32,
    /// Percent last reported; progress is pushed only when it moves.
    reported: Option<u8>,
    active: bool,
    #[cfg(target_os = "espidf")]
    update: Option<esp_ota::OtaUpdate>,
}

impl OtaReceiver {
    pub fn new(events: &'static EventQueue) -> Self {
        Self {
            events,
            total: 0,
            written: 0,
            reported: None,
            active: false,
            #[cfg(target_os = "espidf")]
            update: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Open the inactive partition for an image of `total` bytes.
    pub fn begin(&mut self, total: u32) -> Result<(), OtaFailure> {
        if self.active {
            return self.fail(OtaFailure::Begin);
        }
        if total == 0 || total > MAX_IMAGE_SIZE {
            warn!("OTA: rejecting image of {} bytes", total);
            return self.fail(OtaFailure::Begin);
        }

        #[cfg(target_os = "espidf")]
        {
            match esp_ota::OtaUpdate::begin() {
                Ok(update) => self.update = Some(update),
                Err(e) => {
                    warn!("esp-ota begin failed: {:?}", e);
                    return self.fail(OtaFailure::Begin);
                }
            }
        }

        self.total = total;
        self.written = 0;
        self.reported = None;
        self.active = true;
        info!("OTA: receiving {} bytes", total);
        self.events.push(Event::OtaStarted);
        Ok(())
    }

    /// Append the next chunk of the image.
    pub fn write(&mut self, chunk: &[u8]) -> Result<(), OtaFailure> {
        if !self.active {
            return self.fail(OtaFailure::Receive);
        }
        let Some(written) = u32::try_from(chunk.len())
            .ok()
            .and_then(|len| self.written.checked_add(len))
            .filter(|&w| w <= self.total)
        else {
            warn!("OTA: image larger than announced");
            return self.abort(OtaFailure::Receive);
        };

        #[cfg(target_os = "espidf")]
        {
            let result = match self.update.as_mut() {
                Some(update) => update.write(chunk).map_err(|e| warn!("esp-ota write failed: {:?}", e)),
                None => Err(()),
            };
            if result.is_err() {
                return self.abort(OtaFailure::Receive);
            }
        }

        self.written = written;
        let pct = progress_percent(self.written, self.total);
        if self.reported != Some(pct) {
            self.reported = Some(pct);
            self.events.push(Event::OtaProgress {
                done: self.written,
                total: self.total,
            });
        }
        Ok(())
    }

    /// Verify the image and mark it bootable.
    pub fn finish(&mut self) -> Result<(), OtaFailure> {
        if !self.active || self.written != self.total {
            warn!("OTA: image incomplete ({}/{} bytes)", self.written, self.total);
            return self.abort(OtaFailure::Receive);
        }

        #[cfg(target_os = "espidf")]
        {
            let Some(update) = self.update.take() else {
                return self.abort(OtaFailure::End);
            };
            let staged = update
                .finalize()
                .map_err(|e| warn!("esp-ota finalize failed: {:?}", e))
                .and_then(|mut completed| {
                    completed
                        .set_as_boot_partition()
                        .map_err(|e| warn!("esp-ota set_as_boot_partition failed: {:?}", e))
                });
            if staged.is_err() {
                return self.abort(OtaFailure::End);
            }
        }

        self.active = false;
        info!("OTA: image of {} bytes staged", self.total);
        self.events.push(Event::OtaEnd);
        Ok(())
    }

    /// Give up on the transfer in progress, e.g. when the upload stream
    /// breaks.
    pub fn cancel(&mut self) {
        if self.active {
            warn!("OTA: transfer cancelled after {} bytes", self.written);
            let _ = self.abort(OtaFailure::Receive);
        }
    }

    /// Drop the partial image and report `failure`.
    fn abort(&mut self, failure: OtaFailure) -> Result<(), OtaFailure> {
        self.active = false;
        // esp-ota discards the partition when the handle is dropped
        #[cfg(target_os = "espidf")]
        {
            self.update = None;
        }
        self.fail(failure)
    }

    fn fail(&self, failure: OtaFailure) -> Result<(), OtaFailure> {
        self.events.push(Event::OtaError(failure));
        Err(failure)
    }
}
