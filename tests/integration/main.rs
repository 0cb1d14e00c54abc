//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against the mock platform.  All tests run on the host (x86_64) with no
//! real hardware or network required.

#![cfg(not(target_os = "espidf"))]

mod agent_service_tests;
mod api_tests;
mod connectivity_tests;
mod mock_device;
