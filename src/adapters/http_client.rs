//! Outbound HTTP(S) client.
//!
//! Implements [`HttpTransport`]: one request, one response, no protocol
//! knowledge.  Every call honours the caller's [`RequestBudget`]; a
//! response body larger than the buffer budget is an error, not a
//! truncation.
//!
//! - **`target_os = "espidf"`**: `EspHttpConnection`, TLS through the
//!   ESP-IDF certificate bundle.
//! - **all other targets**: `reqwest::blocking`, one client per request.

use log::debug;

use crate::transport::{HttpRequest, HttpResponse, HttpTransport, TransportError};

#[derive(Default)]
pub struct HttpClient;

impl HttpClient {
    pub fn new() -> Self {
        Self
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
impl HttpTransport for HttpClient {
    fn execute(&mut self, request: &HttpRequest<'_>) -> Result<HttpResponse, TransportError> {
        use core::time::Duration;
        use esp_idf_svc::http::client::{Configuration, EspHttpConnection};
        use esp_idf_svc::io::{Read, Write};

        use crate::transport::Method;

        let config = Configuration {
            timeout: Some(Duration::from_millis(u64::from(request.budget.timeout_ms))),
            buffer_size: Some(request.budget.buffer_size),
            crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
            ..Default::default()
        };
        let mut conn = EspHttpConnection::new(&config).map_err(|_| TransportError::Connect)?;

        let method = match request.method {
            Method::Get => esp_idf_svc::http::Method::Get,
            Method::Post => esp_idf_svc::http::Method::Post,
            Method::Put => esp_idf_svc::http::Method::Put,
        };
        let body = request.body.unwrap_or("");
        let content_length = body.len().to_string();
        let headers = [("Content-Type", "application/json"), ("Content-Length", content_length.as_str())];

        debug!("HTTP: {} {}", request.method, request.url);
        conn.initiate_request(method, request.url, &headers)
            .map_err(|_| TransportError::Connect)?;
        if !body.is_empty() {
            conn.write_all(body.as_bytes()).map_err(|_| TransportError::Io)?;
        }
        conn.initiate_response().map_err(|_| TransportError::Timeout)?;
        let status = conn.status();

        let mut buf = vec![0u8; request.budget.buffer_size];
        let mut len = 0;
        loop {
            if len == buf.len() {
                // one more byte means the body did not fit
                let mut probe = [0u8; 1];
                if conn.read(&mut probe).map_err(|_| TransportError::Io)? > 0 {
                    return Err(TransportError::ResponseTooLarge);
                }
                break;
            }
            let n = conn.read(&mut buf[len..]).map_err(|_| TransportError::Io)?;
            if n == 0 {
                break;
            }
            len += n;
        }
        buf.truncate(len);
        let body = String::from_utf8(buf).map_err(|_| TransportError::Io)?;
        Ok(HttpResponse { status, body })
    }
}

// ───────────────────────────────────────────────────────────────
// Host
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
fn classify(e: &reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_connect() {
        TransportError::Connect
    } else if e.is_builder() {
        TransportError::InvalidUrl
    } else {
        TransportError::Io
    }
}

#[cfg(not(target_os = "espidf"))]
impl HttpTransport for HttpClient {
    fn execute(&mut self, request: &HttpRequest<'_>) -> Result<HttpResponse, TransportError> {
        use std::io::Read;
        use std::time::Duration;

        use reqwest::blocking::Client;
        use reqwest::header::CONTENT_TYPE;

        use crate::transport::Method;

        if !(request.url.starts_with("http://") || request.url.starts_with("https://")) {
            return Err(TransportError::InvalidUrl);
        }
        let client = Client::builder()
            .no_proxy()
            .timeout(Duration::from_millis(u64::from(request.budget.timeout_ms.max(1))))
            .build()
            .map_err(|e| classify(&e))?;

        let builder = match request.method {
            Method::Get => client.get(request.url),
            Method::Post => client.post(request.url),
            Method::Put => client.put(request.url),
        };
        let builder = match request.body {
            Some(body) => builder.header(CONTENT_TYPE, "application/json").body(body.to_owned()),
            None => builder,
        };

        debug!("HTTP(host): {} {}", request.method, request.url);
        let response = builder.send().map_err(|e| classify(&e))?;
        let status = response.status().as_u16();

        let limit = request.budget.buffer_size;
        let mut raw = Vec::new();
        response
            .take(limit as u64 + 1)
            .read_to_end(&mut raw)
            .map_err(|_| TransportError::Io)?;
        if raw.len() > limit {
            return Err(TransportError::ResponseTooLarge);
        }
        let body = String::from_utf8(raw).map_err(|_| TransportError::Io)?;
        Ok(HttpResponse { status, body })
    }
}
