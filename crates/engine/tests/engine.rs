//! End-to-end refresh engine tests against scripted providers.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use nodewatch_engine::provider::ranking::{RankingClient, RankingPage};
use nodewatch_engine::provider::{CmdOutput, CommandRunner, CommandSpec};
use nodewatch_engine::{
    CredentialStore, EngineConfig, FetchOutcome, Node, Providers, RefreshEngine, RefreshError,
};

struct PagedClient {
    pages: Mutex<VecDeque<RankingPage>>,
    calls: AtomicUsize,
}

impl PagedClient {
    fn new(pages: Vec<RankingPage>) -> Arc<Self> {
        Arc::new(Self {
            pages: Mutex::new(pages.into()),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl RankingClient for PagedClient {
    async fn fetch_page(
        &self,
        _cursor: Option<&str>,
        _page_size: u32,
    ) -> Result<RankingPage, RefreshError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.pages
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| RefreshError::Transport {
                provider: "RANKING".to_string(),
                message: "no more pages".to_string(),
            })
    }
}

/// Every process exits with status 1.
struct BrokenRunner {
    calls: AtomicUsize,
}

#[async_trait]
impl CommandRunner for BrokenRunner {
    async fn run(&self, _spec: &CommandSpec) -> std::io::Result<CmdOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(CmdOutput {
            status: 1,
            stdout: String::new(),
            stderr: "not available".to_string(),
        })
    }
}

fn node(pub_key: &str, rank: u32) -> Node {
    serde_json::from_value(serde_json::json!({
        "pubKey": pub_key,
        "alias": pub_key.to_uppercase(),
        "capacity": 1_000_000,
        "channels": 10,
        "rank": rank,
    }))
    .unwrap()
}

fn two_pages() -> Vec<RankingPage> {
    vec![
        RankingPage {
            nodes: vec![node("first", 1)],
            next_cursor: Some("cursor-1".to_string()),
            has_more: true,
        },
        RankingPage {
            nodes: vec![node("second", 2)],
            next_cursor: None,
            has_more: false,
        },
    ]
}

fn config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.ranking.api_token = "token".to_string();
    config.market.script.script = "price.py".to_string();
    config.node_stats.connection.rpc_host = Some("localhost:10009".to_string());
    config.node_stats.connection.tls_cert_path = Some("/lnd/tls.cert".to_string());
    config.node_stats.connection.macaroon_path = Some("/lnd/readonly.macaroon".to_string());
    config.backoff.base = Duration::from_millis(1);
    config.backoff.jitter = Duration::ZERO;
    config.backoff.max_retries = 1;
    config
}

#[tokio::test]
async fn warm_up_fills_ranking_and_leaves_failed_fields_empty() {
    let client = PagedClient::new(two_pages());
    let runner = Arc::new(BrokenRunner {
        calls: AtomicUsize::new(0),
    });
    let engine = RefreshEngine::new(
        config(),
        Providers {
            ranking: client.clone(),
            runner: runner.clone(),
            credential: CredentialStore::new("token"),
        },
    )
    .unwrap();

    let before = engine.snapshot();
    assert!(before.nodes.is_empty());
    assert!(before.last_updated.is_none());

    engine.start();
    engine.wait_until_warm().await;

    let snapshot = engine.snapshot();
    let keys: Vec<_> = snapshot.nodes.iter().map(|n| n.pub_key.as_str()).collect();
    assert_eq!(keys, vec!["first", "second"]);
    assert!(snapshot.last_updated.is_some());
    assert_eq!(snapshot.nodes[1].success_rate, Some(0.0));
    assert!(snapshot.market_data.is_empty());
    assert!(snapshot.local_stats.is_empty());
    assert_eq!(client.calls.load(Ordering::SeqCst), 2);

    // market: 2 attempts; node stats: 2 attempts of 5 queries each
    assert_eq!(runner.calls.load(Ordering::SeqCst), 2 + 2 * 5);

    engine.stop().await;
    engine.stop().await;
}

#[tokio::test]
async fn snapshot_serializes_with_camel_case_keys() {
    let engine = RefreshEngine::new(
        config(),
        Providers {
            ranking: PagedClient::new(two_pages()),
            runner: Arc::new(BrokenRunner {
                calls: AtomicUsize::new(0),
            }),
            credential: CredentialStore::new("token"),
        },
    )
    .unwrap();

    assert_eq!(
        engine.refresh_now("RANKING").await.unwrap(),
        FetchOutcome::Committed
    );

    let json = serde_json::to_value(engine.snapshot()).unwrap();
    assert_eq!(json["nodes"][0]["pubKey"], "first");
    assert!(json.get("lastUpdated").is_some());
    assert!(json.get("marketData").is_some());
    assert!(json.get("localStats").is_some());
}

#[tokio::test]
async fn stop_before_start_is_harmless() {
    let engine = RefreshEngine::new(
        config(),
        Providers {
            ranking: PagedClient::new(two_pages()),
            runner: Arc::new(BrokenRunner {
                calls: AtomicUsize::new(0),
            }),
            credential: CredentialStore::new("token"),
        },
    )
    .unwrap();

    engine.stop().await;
    engine.start();
    engine.wait_until_warm().await;
    assert!(engine.snapshot().nodes.is_empty());
}
