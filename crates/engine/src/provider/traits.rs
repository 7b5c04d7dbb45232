//! Fetcher trait definition.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::errors::RefreshError;
use crate::store::SnapshotStore;

/// What a successful fetch did.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FetchOutcome {
    /// Fresh data was fetched and committed.
    Committed,
    /// Data was served from the TTL cache; no external call was made.
    Cached,
    /// The provider is not configured; nothing was done.
    Disabled,
}

/// One provider round trip.
///
/// A fetcher commits its own fragment into the store: it owns a fixed set of
/// snapshot fields and replaces them wholesale, in one critical section,
/// only when it has a complete fragment. The node-stats fan-out is the one
/// fetcher that may commit and still return an error.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Unique task name, used for logging and error attribution.
    fn name(&self) -> &'static str;

    /// Perform one fetch. Must return promptly once `cancel` fires.
    async fn fetch(
        &self,
        store: &SnapshotStore,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome, RefreshError>;
}
