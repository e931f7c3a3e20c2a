// fytalink-host: Unfolded Circle integration-driver protocol over WebSocket.

pub mod adapter;
pub mod entities;
pub mod error;
pub mod metadata;
pub mod protocol;
pub mod server;

pub use adapter::Adapter;
pub use error::HostError;
pub use metadata::DriverMetadata;
pub use protocol::{Inbound, Outbound, RemoteEvent, Request};
