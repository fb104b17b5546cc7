#![forbid(unsafe_code)]

//! HTTP transport for merge-status requests.
//!
//! [`HttpFetcher`] implements [`prb_core::Fetch`] on top of `reqwest`. Body
//! decoding lives in [`decode`] so it can be tested and fuzzed without a
//! network.

pub mod client;
pub mod decode;

pub use client::{HttpFetcher, HttpFetcherConfig, HttpFetcherError};
pub use decode::{decode_merge_status, decode_response};
