//! Inbound HTTP server adapter.
//!
//! Translates server requests into [`ApiRequest`]s for whatever implements
//! [`ApiHandler`] (the agent runtime in `main`) and writes the
//! [`ApiResponse`] back.  Firmware images posted to [`OTA_UPLOAD_PATH`]
//! stream into the [`OtaReceiver`] only while the agent is in OTA mode.
//!
//! The server runs on its own task; the runtime sits behind a mutex so
//! requests and the poll loop never interleave inside the agent.

use log::warn;

use super::ota_receiver::OtaReceiver;
use crate::ota::OtaState;
use crate::protocol::api::{ApiRequest, ApiResponse};

/// Firmware upload endpoint.
pub const OTA_UPLOAD_PATH: &str = "/ota/upload";

/// Upper bound for an inbound API body.
pub const MAX_REQUEST_BODY: usize = 2_048;

/// Something that answers API requests.
pub trait ApiHandler: Send {
    fn handle(&mut self, request: &ApiRequest<'_>) -> ApiResponse;

    /// Where the agent is in the firmware-update lifecycle.
    fn ota_state(&self) -> OtaState;
}

/// The forwarding header counts only when it names something.
pub fn forward_target(header: Option<&str>) -> Option<&str> {
    header.map(str::trim).filter(|t| !t.is_empty())
}

/// Why a request body was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyError {
    TooLarge,
    NotUtf8,
    Read,
}

impl BodyError {
    pub fn response(self) -> ApiResponse {
        match self {
            Self::TooLarge => ApiResponse::error(413, "body too large"),
            Self::NotUtf8 => ApiResponse::error(400, "body is not UTF-8"),
            Self::Read => ApiResponse::error(500, "read failed"),
        }
    }
}

/// Read a whole body of at most `limit` bytes.  Bodies are relayed
/// verbatim, so nothing is ever cut short or repaired.
pub fn read_body<E>(limit: usize, mut read: impl FnMut(&mut [u8]) -> Result<usize, E>) -> Result<String, BodyError> {
    let mut buf = vec![0u8; limit + 1];
    let mut len = 0;
    while len < buf.len() {
        let n = read(&mut buf[len..]).map_err(|_| BodyError::Read)?;
        if n == 0 {
            break;
        }
        len += n;
    }
    if len > limit {
        return Err(BodyError::TooLarge);
    }
    buf.truncate(len);
    String::from_utf8(buf).map_err(|_| BodyError::NotUtf8)
}

/// Stream an uploaded image into `receiver`.  Nothing is written unless
/// the agent asked for an update (`/api/ota` passed the application
/// guard).  Returns the status and text body to answer with.
pub fn receive_upload<E: core::fmt::Debug>(
    state: OtaState,
    receiver: &mut OtaReceiver,
    total: u32,
    mut read: impl FnMut(&mut [u8]) -> Result<usize, E>,
) -> (u16, &'static str) {
    if state == OtaState::Idle {
        warn!("OTA: upload refused, no update requested");
        return (403, "OTA not requested");
    }
    if receiver.begin(total).is_err() {
        return (500, "OTA failed");
    }
    let mut chunk = [0u8; 1_024];
    loop {
        let n = match read(&mut chunk) {
            Ok(n) => n,
            Err(e) => {
                warn!("OTA: read failed: {:?}", e);
                receiver.cancel();
                return (500, "OTA failed");
            }
        };
        if n == 0 {
            break;
        }
        if receiver.write(&chunk[..n]).is_err() {
            return (500, "OTA failed");
        }
    }
    match receiver.finish() {
        Ok(()) => (200, "OK"),
        Err(_) => (500, "OTA failed"),
    }
}

#[cfg(target_os = "espidf")]
pub use server::HttpServer;

#[cfg(target_os = "espidf")]
mod server {
    use std::sync::{Arc, Mutex};

    use esp_idf_svc::http::server::{Configuration, EspHttpConnection, EspHttpServer, Request};
    use esp_idf_svc::http::Method as SvcMethod;
    use esp_idf_svc::io::{Read, Write};
    use log::{info, warn};

    use super::{ApiHandler, BodyError, MAX_REQUEST_BODY, OTA_UPLOAD_PATH, forward_target, read_body, receive_upload};
    use crate::adapters::ota_receiver::OtaReceiver;
    use crate::ota::OtaState;
    use crate::protocol::api::{ApiRequest, ApiResponse, FORWARD_HEADER};
    use crate::transport::Method;

    pub struct HttpServer {
        _server: EspHttpServer<'static>,
    }

    impl HttpServer {
        pub fn start<A: ApiHandler + 'static>(
            handler: Arc<Mutex<A>>,
            ota: Arc<Mutex<OtaReceiver>>,
        ) -> anyhow::Result<Self> {
            let mut server = EspHttpServer::new(&Configuration {
                uri_match_wildcard: true,
                ..Default::default()
            })?;

            for method in [SvcMethod::Get, SvcMethod::Post, SvcMethod::Put] {
                let handler = handler.clone();
                server.fn_handler("/api/*", method, move |req| serve_api(req, &handler))?;
            }
            server.fn_handler(OTA_UPLOAD_PATH, SvcMethod::Post, move |req| {
                serve_upload(req, &handler, &ota)
            })?;

            info!("HTTP: server listening");
            Ok(Self { _server: server })
        }
    }

    fn api_method(method: SvcMethod) -> Option<Method> {
        match method {
            SvcMethod::Get => Some(Method::Get),
            SvcMethod::Post => Some(Method::Post),
            SvcMethod::Put => Some(Method::Put),
            _ => None,
        }
    }

    fn serve_api<A: ApiHandler>(mut req: Request<&mut EspHttpConnection>, handler: &Mutex<A>) -> anyhow::Result<()> {
        let method = api_method(req.method());
        let path = req.uri().to_owned();
        let forward_to = forward_target(req.header(FORWARD_HEADER)).map(str::to_owned);

        let body = match req.content_len() {
            Some(len) if len > MAX_REQUEST_BODY as u64 => Err(BodyError::TooLarge),
            _ => read_body(MAX_REQUEST_BODY, |buf| req.read(buf)),
        };

        let response = match (method, body) {
            (None, _) => ApiResponse::method_not_allowed(),
            (Some(_), Err(e)) => {
                warn!("HTTP: {} body rejected: {:?}", path, e);
                e.response()
            }
            (Some(method), Ok(body)) => {
                let request = ApiRequest {
                    method,
                    path: &path,
                    forward_to: forward_to.as_deref(),
                    body: &body,
                };
                match handler.lock() {
                    Ok(mut h) => h.handle(&request),
                    Err(_) => {
                        warn!("HTTP: runtime lock poisoned");
                        ApiResponse::error(500, "unavailable")
                    }
                }
            }
        };

        let mut resp = req.into_response(
            response.status,
            None,
            &[("Content-Type", response.content_type.as_str())],
        )?;
        resp.write_all(response.body.as_bytes())?;
        Ok(())
    }

    fn serve_upload<A: ApiHandler>(
        mut req: Request<&mut EspHttpConnection>,
        handler: &Mutex<A>,
        ota: &Mutex<OtaReceiver>,
    ) -> anyhow::Result<()> {
        let total = req.content_len().unwrap_or(0) as u32;
        // released before streaming so the poll loop keeps running
        let state = handler.lock().map(|h| h.ota_state()).unwrap_or(OtaState::Idle);
        let (status, body) = match ota.lock() {
            Ok(mut receiver) => receive_upload(state, &mut receiver, total, |buf| req.read(buf)),
            Err(_) => (500, "OTA failed"),
        };
        req.into_response(status, None, &[("Content-Type", "text/plain")])?
            .write_all(body.as_bytes())?;
        Ok(())
    }
}
