//! Unified error types for the agent core.
//!
//! A single `Error` enum that every subsystem converts into, so the poll
//! loop and the HTTP surface handle failures uniformly.  All variants are
//! `Copy`; none of them carry heap data.

use core::fmt;

pub use crate::app::ports::ConfigError;

// ---------------------------------------------------------------------------
// Top-level agent error
// ---------------------------------------------------------------------------

/// Every fallible operation in the agent funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// An outbound HTTP call could not complete.
    Transport(TransportError),
    /// A peer answered, but not with something we can use.
    Protocol(ProtocolError),
    /// The WiFi station rejected a request.
    Station(StationError),
    /// Configuration is invalid or could not be loaded or saved.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Protocol(e) => write!(f, "protocol: {e}"),
            Self::Station(e) => write!(f, "station: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

/// Failures of a single HTTP(S) exchange.  All of them are transient from
/// the core's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// URL could not be parsed or uses an unsupported scheme.
    InvalidUrl,
    /// Host name resolution failed.
    Dns,
    /// TCP connection could not be established.
    Connect,
    /// TLS handshake failed or TLS is unavailable.
    Tls,
    /// No complete response within the request budget.
    Timeout,
    /// Connection dropped mid-exchange or the response was malformed.
    Io,
    /// Response body exceeded the request buffer budget.
    ResponseTooLarge,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUrl => write!(f, "invalid URL"),
            Self::Dns => write!(f, "DNS lookup failed"),
            Self::Connect => write!(f, "connection failed"),
            Self::Tls => write!(f, "TLS failure"),
            Self::Timeout => write!(f, "timed out"),
            Self::Io => write!(f, "I/O error"),
            Self::ResponseTooLarge => write!(f, "response exceeds buffer"),
        }
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

// ---------------------------------------------------------------------------
// Protocol errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// JSON body could not be parsed into the expected envelope.
    Malformed,
    /// Peer answered with a non-success status.
    Status(u16),
    /// The master address is unknown (station has no gateway yet).
    NoMaster,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed JSON body"),
            Self::Status(code) => write!(f, "unexpected HTTP status {code}"),
            Self::NoMaster => write!(f, "master address unknown"),
        }
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}

// ---------------------------------------------------------------------------
// Station errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    DriverFailed,
}

impl fmt::Display for StationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => {
                write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)")
            }
            Self::DriverFailed => write!(f, "WiFi driver rejected the request"),
        }
    }
}

impl From<StationError> for Error {
    fn from(e: StationError) -> Self {
        Self::Station(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
