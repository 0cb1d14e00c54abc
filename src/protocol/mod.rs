//! Agent-master protocol: envelopes, inbound routing and forwarding,
//! outbound master calls.

pub mod api;
pub mod envelope;
pub mod master;

pub use api::{ApiRequest, ApiResponse, ContentType, Dispatch, FORWARD_HEADER, Route};
pub use envelope::{DeviceSnapshot, MasterConfig, SnapshotLimits};
pub use master::MasterClient;
