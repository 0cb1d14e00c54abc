//! Transport abstraction — one HTTP(S) exchange per call.
//!
//! Concrete implementations:
//! - `EspHttpConnection` on the device (plain HTTP and TLS)
//! - `reqwest::blocking` client in the host simulation
//! - scripted mocks in the integration tests
//!
//! The delivery queue and the master protocol are generic over
//! [`HttpTransport`], so neither knows how bytes reach the network.

use core::fmt;

pub use crate::error::TransportError;

/// Subset of HTTP verbs the agent speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Buffer and timeout limits applied to a single call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestBudget {
    /// Largest response body accepted, in bytes.
    pub buffer_size: usize,
    pub timeout_ms: u32,
}

impl Default for RequestBudget {
    fn default() -> Self {
        Self {
            buffer_size: 2_048,
            timeout_ms: 5_000,
        }
    }
}

/// An outbound request.  Bodies are always JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest<'a> {
    pub method: Method,
    pub url: &'a str,
    pub body: Option<&'a str>,
    pub budget: RequestBudget,
}

impl<'a> HttpRequest<'a> {
    pub fn get(url: &'a str, budget: RequestBudget) -> Self {
        Self {
            method: Method::Get,
            url,
            body: None,
            budget,
        }
    }

    pub fn with_body(method: Method, url: &'a str, body: &'a str, budget: RequestBudget) -> Self {
        Self {
            method,
            url,
            body: Some(body),
            budget,
        }
    }
}

/// What came back.  Any status is a successful exchange at this layer;
/// interpreting it is the caller's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Performs a single, synchronous, timeout-bounded HTTP exchange.
pub trait HttpTransport {
    fn execute(&mut self, request: &HttpRequest<'_>) -> Result<HttpResponse, TransportError>;
}

impl<T: HttpTransport + ?Sized> HttpTransport for &mut T {
    fn execute(&mut self, request: &HttpRequest<'_>) -> Result<HttpResponse, TransportError> {
        (**self).execute(request)
    }
}

/// A transport that is never connected.  Every call fails with
/// [`TransportError::Connect`]; useful before the station is wired up.
pub struct NullTransport;

impl HttpTransport for NullTransport {
    fn execute(&mut self, _request: &HttpRequest<'_>) -> Result<HttpResponse, TransportError> {
        Err(TransportError::Connect)
    }
}
