//! XIOT agent library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection.  All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module, with a host
//! simulation beside it.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod connectivity;
pub mod delivery;
pub mod error;
pub mod events;
pub mod ota;
pub mod protocol;
pub mod scheduler;
pub mod transport;

pub mod adapters;
