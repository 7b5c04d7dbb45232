//! Node ranking provider.
//!
//! Walks the provider's cursor-based listing to exhaustion, one rate-limiter
//! token per page. The fetch is all-or-nothing: a failure on any page
//! discards every page already received and leaves the published `nodes`
//! untouched.

mod client;

pub use client::{GraphQlRankingClient, RankingClient, RankingPage};

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info};
use tokio_util::sync::CancellationToken;

use crate::errors::RefreshError;
use crate::models::{Fragment, Node};
use crate::policy::RateLimiter;
use crate::provider::{FetchOutcome, Fetcher};
use crate::store::SnapshotStore;

/// Provider ID constant
pub const PROVIDER_ID: &str = "RANKING";

/// Default page size requested from the provider.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Default safety cap on the number of pages per fetch.
pub const DEFAULT_MAX_PAGES: usize = 200;

pub struct RankingFetcher {
    client: Arc<dyn RankingClient>,
    limiter: Arc<RateLimiter>,
    page_size: u32,
    max_pages: usize,
}

impl RankingFetcher {
    pub fn new(
        client: Arc<dyn RankingClient>,
        limiter: Arc<RateLimiter>,
        page_size: u32,
        max_pages: usize,
    ) -> Self {
        Self {
            client,
            limiter,
            page_size,
            max_pages,
        }
    }

    /// Fetch every page, in order.
    async fn fetch_all(&self, cancel: &CancellationToken) -> Result<Vec<Node>, RefreshError> {
        let mut nodes = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages_fetched: usize = 0;

        loop {
            if pages_fetched >= self.max_pages {
                return Err(RefreshError::parse(
                    PROVIDER_ID,
                    format!("Pagination exceeded max pages ({}). Aborting.", self.max_pages),
                ));
            }

            self.limiter.acquire(cancel).await?;

            let page = tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(RefreshError::Canceled(format!("{} page request", PROVIDER_ID)));
                }
                page = self.client.fetch_page(cursor.as_deref(), self.page_size) => page?,
            };
            pages_fetched += 1;

            debug!(
                "[{}] page {} returned {} nodes (has more: {})",
                PROVIDER_ID,
                pages_fetched,
                page.nodes.len(),
                page.has_more
            );
            nodes.extend(page.nodes);

            if !page.has_more {
                break;
            }

            let next = page.next_cursor.ok_or_else(|| {
                RefreshError::parse(PROVIDER_ID, "provider reported more pages without a cursor")
            })?;
            if cursor.as_deref() == Some(next.as_str()) {
                return Err(RefreshError::parse(
                    PROVIDER_ID,
                    "Pagination appears stuck (same cursor returned twice).",
                ));
            }
            cursor = Some(next);
        }

        Ok(nodes)
    }
}

#[async_trait]
impl Fetcher for RankingFetcher {
    fn name(&self) -> &'static str {
        PROVIDER_ID
    }

    async fn fetch(
        &self,
        store: &SnapshotStore,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome, RefreshError> {
        let nodes: Vec<Node> = self
            .fetch_all(cancel)
            .await?
            .into_iter()
            .map(Node::normalize)
            .collect();

        info!("[{}] fetched {} ranked nodes", PROVIDER_ID, nodes.len());
        store.commit(Fragment::Ranking {
            nodes,
            fetched_at: Utc::now(),
        });
        Ok(FetchOutcome::Committed)
    }
}
