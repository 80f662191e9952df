//! Session acquisition and persistence for the magpie crawler.
//!
//! The session manager owns the lifecycle of the opaque credential document:
//! load a persisted one and verify it, fall back to out-of-band acquisition
//! with exponential spacing, and persist whatever verified. The credential
//! file is written atomically with user-only permissions.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod manager;
mod sources;
mod store;

pub use manager::SessionManager;
pub use sources::{EnvCredentialSource, StaticCredentialSource, parse_cookie_header};
pub use store::CredentialStore;
