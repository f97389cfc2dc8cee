//! Wire protocol for ccsync.
//!
//! Turns the server-reported operation catalog into named descriptors,
//! resolves their URL templates, frames login requests for both credential
//! modes, and accumulates per-call options into an immutable wire request.
//! Nothing in this crate performs I/O against the network.

pub mod auth;
pub mod endpoint;
pub mod error;
pub mod registry;
pub mod request;
pub mod response;

pub use auth::{login_request, CredentialMode, Credentials, LoginResponse};
pub use endpoint::{headers, operations, paths};
pub use error::{ProtocolError, ProtocolResult};
pub use registry::{resolve_url, EndpointRegistry, LocaleListing, RegistryPayload};
pub use request::{BodySource, RequestEnv, RequestSpec, WireRequest};
pub use response::WireResponse;
