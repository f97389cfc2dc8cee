//! Dynamic admin API client for ccsync.
//!
//! The server describes its own call surface through a registry of named
//! operations. This crate logs in, loads that registry, negotiates the
//! working locale set, and then executes calls by name through a single
//! generic [`Invoker::invoke`].
//!
//! Session expiry (HTTP 401) is recovered by exactly one forced re-login and
//! retry; login itself is single-flight, so concurrent callers that observe
//! a stale session trigger one login between them.

pub mod config;
pub mod error;
pub mod invoker;
pub mod locale;
pub mod mock;
pub mod session;
pub mod transport;

pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use invoker::{InvokeArg, InvokeArgs, Invoker};
pub use locale::{LocaleNegotiator, LocaleSelection};
pub use mock::MockTransport;
pub use session::{Session, SessionManager, DEFAULT_SESSION_FRESHNESS};
pub use transport::{HttpTransport, ReqwestTransport};
