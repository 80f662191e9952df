//! Data shapes exchanged across the capability traits.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_util::stream::Stream;
use magpie_core::Candidate;
use magpie_error::MagpieResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::pin::Pin;

/// An opaque session token set.
///
/// The core treats the contents as opaque; the remote adapter knows which
/// cookie names matter. Serialized as JSON at the configured credential path
/// with user-only permissions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    /// Session cookies, name to value
    pub cookies: BTreeMap<String, String>,
    /// When the credential was acquired
    pub issued_at: DateTime<Utc>,
}

impl Credential {
    /// Create a credential from a cookie set, stamped now.
    pub fn from_cookies(cookies: BTreeMap<String, String>) -> Self {
        Self {
            cookies,
            issued_at: Utc::now(),
        }
    }

    /// Render the cookies as a `Cookie` request-header value.
    pub fn cookie_header(&self) -> String {
        self.cookies
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Whether the token set is empty.
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

/// The identity behind a verified session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteIdentity {
    /// Account identifier on the remote service
    pub uid: String,
    /// Display name of the account
    pub name: String,
}

/// One page of search results.
#[derive(Debug, Clone)]
pub struct SearchPage {
    /// Candidates in the order the remote returned them
    pub items: Vec<Candidate>,
    /// Whether the remote reports further pages
    pub has_more: bool,
}

/// One resolvable media stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSource {
    /// Direct URL of the stream
    pub url: String,
    /// Total byte length, when the remote advertises one
    pub byte_length: Option<u64>,
}

/// The resolved stream pair for an item at a granted quality.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSources {
    /// Quality code actually granted; at most the requested code unless
    /// nothing at or below it exists
    pub quality: u32,
    /// Video stream
    pub video: StreamSource,
    /// Audio stream
    pub audio: StreamSource,
}

/// A ranged download body.
///
/// `total_length` is the full entity size when the remote advertises one
/// (from `Content-Range` or `Content-Length` plus the requested offset);
/// the stream yields the bytes from the requested offset onward.
pub struct ByteStream {
    /// Full entity size in bytes, when known
    pub total_length: Option<u64>,
    /// The body bytes from the requested offset
    pub stream: Pin<Box<dyn Stream<Item = MagpieResult<Bytes>> + Send>>,
}

impl std::fmt::Debug for ByteStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteStream")
            .field("total_length", &self.total_length)
            .finish_non_exhaustive()
    }
}
