//! System adapter: heap statistics, identity and reboot.

use log::info;

use super::device_id::{MacAddress, read_mac};
use crate::app::ports::SystemPort;

pub struct SystemAdapter {
    mac: MacAddress,
    /// Reboot requests seen by the simulation.
    #[cfg(not(target_os = "espidf"))]
    restarts: u32,
}

impl Default for SystemAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemAdapter {
    pub fn new() -> Self {
        Self {
            mac: read_mac(),
            #[cfg(not(target_os = "espidf"))]
            restarts: 0,
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn restarts(&self) -> u32 {
        self.restarts
    }
}

#[cfg(target_os = "espidf")]
impl SystemPort for SystemAdapter {
    fn free_heap(&self) -> u32 {
        unsafe { esp_idf_svc::sys::esp_get_free_heap_size() }
    }

    fn mac_address(&self) -> [u8; 6] {
        self.mac
    }

    fn restart(&mut self) {
        info!("System: restarting");
        unsafe { esp_idf_svc::sys::esp_restart() }
    }
}

#[cfg(not(target_os = "espidf"))]
impl SystemPort for SystemAdapter {
    fn free_heap(&self) -> u32 {
        200_000
    }

    fn mac_address(&self) -> [u8; 6] {
        self.mac
    }

    fn restart(&mut self) {
        self.restarts += 1;
        info!("System(sim): restart requested ({})", self.restarts);
    }
}
