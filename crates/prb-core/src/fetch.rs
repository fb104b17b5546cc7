#![forbid(unsafe_code)]

//! The merge-status transport seam.

use async_trait::async_trait;

use crate::error::FetchError;
use crate::link::Endpoint;
use crate::row::BlockerRecord;

/// Fetches the blocker record behind a merge-status endpoint.
///
/// Implementations run on the engine's single-threaded executor, so futures
/// need not be `Send`. An implementation must report a body carrying an
/// `errors` list as [`FetchError::Remote`], one entry per listed error.
#[async_trait(?Send)]
pub trait Fetch {
    async fn fetch_blockers(&self, endpoint: &Endpoint) -> Result<BlockerRecord, FetchError>;
}
