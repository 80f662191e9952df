//! Remote service adapter for the magpie crawler.
//!
//! Implements the [`RemoteService`](magpie_interface::RemoteService)
//! capability against the public web API of the video service. Wire
//! documents are parsed into typed DTOs at this boundary and normalized
//! into the core records; nothing above this crate sees the wire shapes.
//!
//! Service-level error codes in the response envelope are folded into the
//! transport error classes so that retry and aggregation treat an
//! HTTP-level 429 and an envelope-level throttle code identically.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod convert;
mod wire;

pub use client::{BiliClient, Endpoints};
