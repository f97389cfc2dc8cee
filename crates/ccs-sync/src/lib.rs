//! Grab/put synchronization between a remote admin API and a local mirror.
//!
//! [`SyncEngine`] reconciles versioned remote artifacts with files on disk:
//! listings are deduplicated to the latest version per name, artifacts whose
//! local version is already current are skipped, conditional updates carry
//! the last-seen etag, and work fans out over bounded batches with distinct
//! limits for downloads and uploads.
//!
//! How each kind of artifact is laid out on disk is supplied by
//! [`ArtifactLayout`] implementations, usually [`DeclarativeLayout`]s read
//! from configuration.

pub mod batch;
pub mod cache;
pub mod config;
pub mod dedup;
pub mod delete;
pub mod engine;
pub mod error;
pub mod etag;
pub mod layout;
pub mod metadata;
pub mod node;
pub mod state;

pub use batch::run_batch;
pub use cache::{CacheBuilder, FrozenCache};
pub use config::{SyncConfig, DEFAULT_GRAB_CONCURRENCY, DEFAULT_PUT_CONCURRENCY, STATE_DIR};
pub use dedup::dedupe_latest;
pub use engine::SyncEngine;
pub use error::{SyncError, SyncResult};
pub use etag::EtagStore;
pub use layout::{ArtifactFile, ArtifactLayout, DeclarativeLayout, LayoutConfig, LayoutSet};
pub use metadata::{Classified, JsonMetadataStore, LayoutClassifier, MetadataStore, PathClassifier, Scaffolder};
pub use node::{check_origin, read_origin, record_origin, OriginStatus};
pub use state::{GrabState, ItemFailure, PutState, SyncReport};
