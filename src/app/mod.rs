//! Application core — agent orchestration, zero I/O.
//!
//! [`service::AgentService`] drives connectivity, OTA, telemetry delivery
//! and the inbound API.  All interaction with the platform happens through
//! the **port traits** in [`ports`]; device-specific behaviour plugs in
//! through [`hooks::AgentHooks`].

pub mod api;
pub mod events;
pub mod hooks;
pub mod ports;
pub mod service;
