//! Capability traits between the magpie pipeline and its collaborators.
//!
//! The pipeline never talks to the remote service, the muxer, or the media
//! probe directly; it goes through the traits defined here. Tests swap in
//! in-memory fakes, the production wiring provides the reqwest adapter and
//! the ffmpeg/ffprobe child-process implementations.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod traits;
mod types;

pub use traits::{CredentialSource, MediaProber, Muxer, RemoteService};
pub use types::{ByteStream, Credential, RemoteIdentity, SearchPage, StreamSource, StreamSources};
