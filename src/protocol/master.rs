//! Agent → master round trips.
//!
//! The master is always the station's gateway and speaks plain HTTP on
//! port 80.  Every call is a single bounded exchange; retry policy lives
//! in the connectivity machine and the poll loop, not here.

use core::net::Ipv4Addr;

use log::{debug, warn};

use super::envelope::{self, DeviceSnapshot, MasterConfig};
use crate::error::{Error, ProtocolError};
use crate::transport::{HttpRequest, HttpTransport, Method, RequestBudget};

pub const CONFIG_PATH: &str = "/api/config";
pub const REGISTER_PATH: &str = "/api/register";
pub const REFRESH_PATH: &str = "/api/refresh";

pub fn master_url(gateway: Ipv4Addr, path: &str) -> String {
    format!("http://{gateway}{path}")
}

#[derive(Debug, Clone, Copy)]
pub struct MasterClient {
    gateway: Ipv4Addr,
    budget: RequestBudget,
}

impl MasterClient {
    pub fn new(gateway: Ipv4Addr, budget: RequestBudget) -> Self {
        Self { gateway, budget }
    }

    /// `GET /api/config`.
    pub fn fetch_config<T: HttpTransport + ?Sized>(&self, transport: &mut T) -> Result<MasterConfig, Error> {
        let url = master_url(self.gateway, CONFIG_PATH);
        let resp = transport.execute(&HttpRequest::get(&url, self.budget))?;
        if !resp.is_ok() {
            warn!("Master: config pull answered {}", resp.status);
            return Err(ProtocolError::Status(resp.status).into());
        }
        Ok(envelope::parse(&resp.body)?)
    }

    /// `POST /api/register` with the device snapshot.
    pub fn register<T: HttpTransport + ?Sized>(&self, transport: &mut T, snapshot: &DeviceSnapshot) -> Result<(), Error> {
        self.push(transport, REGISTER_PATH, snapshot)
    }

    /// `POST /api/refresh` with the device snapshot.
    pub fn refresh<T: HttpTransport + ?Sized>(&self, transport: &mut T, snapshot: &DeviceSnapshot) -> Result<(), Error> {
        self.push(transport, REFRESH_PATH, snapshot)
    }

    fn push<T: HttpTransport + ?Sized>(
        &self,
        transport: &mut T,
        path: &str,
        snapshot: &DeviceSnapshot,
    ) -> Result<(), Error> {
        let url = master_url(self.gateway, path);
        let body = snapshot.to_json();
        let resp = transport.execute(&HttpRequest::with_body(Method::Post, &url, &body, self.budget))?;
        debug!("Master: {} -> {}", path, resp.status);
        if resp.is_ok() {
            Ok(())
        } else {
            Err(ProtocolError::Status(resp.status).into())
        }
    }
}
