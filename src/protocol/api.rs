//! Inbound HTTP surface: routing and the forwarding decision.
//!
//! A request either runs locally or, when it carries the forwarding
//! header on a route that honours it, is relayed verbatim to the named
//! peer and the peer's answer is returned unchanged.

use log::{info, warn};

use crate::transport::{HttpRequest, HttpTransport, Method, RequestBudget};

/// Header naming the peer a request should be relayed to.
pub const FORWARD_HEADER: &str = "Xiot-forward-to";

/// A request as received by the HTTP server adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiRequest<'a> {
    pub method: Method,
    /// Path including any query string.
    pub path: &'a str,
    /// Value of [`FORWARD_HEADER`], if present and non-empty.
    pub forward_to: Option<&'a str>,
    pub body: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Json,
    Text,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Text => "text/plain",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub content_type: ContentType,
    pub body: String,
}

impl ApiResponse {
    pub fn json(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: ContentType::Json,
            body: body.into(),
        }
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: ContentType::Text,
            body: body.into(),
        }
    }

    /// `{}` with the given status.
    pub fn empty(status: u16) -> Self {
        Self::json(status, "{}")
    }

    /// Inbound body could not be parsed.
    pub fn parse_error() -> Self {
        Self::empty(500)
    }

    pub fn error(status: u16, message: &str) -> Self {
        let body = serde_json::json!({ "error": message });
        Self::json(status, body.to_string())
    }

    pub fn not_found() -> Self {
        Self::error(404, "not found")
    }

    pub fn method_not_allowed() -> Self {
        Self::error(405, "method not allowed")
    }
}

/// Endpoints an agent serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Ping,
    Data,
    Rename,
    Restart,
    Ota,
    Sms,
    ModuleReset,
}

impl Route {
    pub fn from_path(path: &str) -> Option<Self> {
        let path = path.split('?').next().unwrap_or(path);
        match path.trim_end_matches('/') {
            "/api/ping" => Some(Self::Ping),
            "/api/data" => Some(Self::Data),
            "/api/rename" => Some(Self::Rename),
            "/api/restart" => Some(Self::Restart),
            "/api/ota" => Some(Self::Ota),
            "/api/sms" => Some(Self::Sms),
            "/api/moduleReset" => Some(Self::ModuleReset),
            _ => None,
        }
    }

    pub fn allows(self, method: Method) -> bool {
        match self {
            Self::Ping | Self::Restart | Self::ModuleReset => method == Method::Get,
            Self::Data => true,
            Self::Rename | Self::Ota | Self::Sms => method == Method::Post,
        }
    }

    /// Routes that relay when the forwarding header is present.
    pub fn forwardable(self) -> bool {
        matches!(self, Self::Ping | Self::Data | Self::Rename | Self::Restart | Self::Ota)
    }
}

/// What to do with an inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch<'a> {
    Local(Route),
    Relay { target: &'a str },
    Reject(ApiResponse),
}

pub fn dispatch<'a>(request: &ApiRequest<'a>) -> Dispatch<'a> {
    let Some(route) = Route::from_path(request.path) else {
        return Dispatch::Reject(ApiResponse::not_found());
    };
    if !route.allows(request.method) {
        return Dispatch::Reject(ApiResponse::method_not_allowed());
    }
    match request.forward_to {
        Some(target) if route.forwardable() => {
            if valid_target(target) {
                Dispatch::Relay { target }
            } else {
                warn!("API: bad forward target {:?}", target);
                Dispatch::Reject(ApiResponse::error(400, "bad forward target"))
            }
        }
        _ => Dispatch::Local(route),
    }
}

/// A host or IPv4 literal, optionally with a port.  Anything that could
/// change the URL path or scheme is refused.
fn valid_target(target: &str) -> bool {
    !target.is_empty()
        && target
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b':'))
}

/// Relay `request` to `target` and hand back whatever it answered.
pub fn relay<T: HttpTransport + ?Sized>(
    transport: &mut T,
    target: &str,
    request: &ApiRequest<'_>,
    budget: RequestBudget,
) -> ApiResponse {
    let url = format!("http://{}{}", target, request.path);
    info!("API: forwarding {} {} to {}", request.method, request.path, target);
    let outbound = match request.method {
        Method::Get => HttpRequest::get(&url, budget),
        method => HttpRequest::with_body(method, &url, request.body, budget),
    };
    match transport.execute(&outbound) {
        Ok(resp) => ApiResponse::json(resp.status, resp.body),
        Err(e) => {
            warn!("API: forward to {} failed: {}", target, e);
            ApiResponse::error(502, "forward failed")
        }
    }
}
