//! Foundation types for ccsync.
//!
//! This crate provides the data model shared by every layer of the
//! synchronizer: the endpoint catalog entries reported by the server, the
//! locale catalog, the versioned artifacts that are mirrored to disk, and the
//! per-mirror record of the server a tree was grabbed from.
//!
//! # Key Types
//!
//! - [`EndpointDescriptor`]: One named, callable operation from the server registry
//! - [`LocaleCatalog`]: Locales the server knows, plus its declared default
//! - [`VersionedArtifact`]: A remote artifact with a display name and version
//! - [`NodeMetadata`]: Origin server recorded for a mirror root

pub mod artifact;
pub mod endpoint;
pub mod error;
pub mod locale;
pub mod node;

pub use artifact::{dir_safe, ArtifactKind, VersionedArtifact};
pub use endpoint::{EndpointDescriptor, HttpMethod, LocaleHint};
pub use error::TypeError;
pub use locale::{short_code, Locale, LocaleCatalog};
pub use node::{server_key, NodeMetadata};
