//! Refresh engine lifecycle.
//!
//! `start()` spawns a warm-up that runs every task once, concurrently, and
//! waits for all of them. Once warm-up finishes, each task gets its own
//! interval timer. Every tick spawns an independent invocation, so a slow
//! invocation may overlap with the next one. The credential monitor runs on
//! its own timer from the moment the engine starts.
//!
//! All spawned work shares one [`CancellationToken`] and is tracked by a
//! [`TaskTracker`], so `stop()` returns only after every timer, retry sleep
//! and in-flight fetch has wound down.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use log::{debug, error, info, warn};
use tokio::sync::watch;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::config::EngineConfig;
use crate::credential::{CredentialCheck, CredentialMonitor, CredentialStore};
use crate::errors::{RefreshError, Result};
use crate::models::Snapshot;
use crate::policy::RateLimiter;
use crate::provider::market::MarketDataFetcher;
use crate::provider::node_stats::NodeStatsFetcher;
use crate::provider::ranking::{self, GraphQlRankingClient, RankingClient, RankingFetcher};
use crate::provider::{CommandRunner, FetchOutcome, TokioCommandRunner};
use crate::scheduler::{run_with_retry, FetchTask};
use crate::store::SnapshotStore;

/// External collaborators the fetchers talk through.
pub struct Providers {
    pub ranking: Arc<dyn RankingClient>,
    pub runner: Arc<dyn CommandRunner>,
    /// Shared with the ranking client; rotated through [`RefreshEngine::rotate_credential`].
    pub credential: CredentialStore,
}

impl Providers {
    /// Real HTTP client and process runner built from `config`.
    pub fn live(config: &EngineConfig) -> Result<Self> {
        let credential = CredentialStore::new(config.ranking.api_token.clone());
        let ranking = GraphQlRankingClient::new(&config.ranking.endpoint, credential.clone())?;
        Ok(Self {
            ranking: Arc::new(ranking),
            runner: Arc::new(TokioCommandRunner),
            credential,
        })
    }
}

/// Background refresher of the shared [`Snapshot`].
pub struct RefreshEngine {
    store: Arc<SnapshotStore>,
    tasks: Vec<FetchTask>,
    credential: CredentialStore,
    monitor: Arc<CredentialMonitor>,
    cancel: CancellationToken,
    tracker: TaskTracker,
    started: AtomicBool,
    warm: Arc<watch::Sender<bool>>,
}

impl RefreshEngine {
    /// Build the engine and its three fetch tasks. Nothing runs until [`start`](Self::start).
    ///
    /// The ranking token is taken from `providers.credential`; an empty store
    /// is [`RefreshError::CredentialMissing`].
    pub fn new(config: EngineConfig, providers: Providers) -> Result<Self> {
        config.validate()?;
        if providers.credential.is_empty() {
            return Err(RefreshError::CredentialMissing(
                "ranking API token".to_string(),
            ));
        }

        let store = Arc::new(SnapshotStore::new(config.market.cache_ttl));
        let policy = Arc::new(config.backoff.clone());
        let limiter = Arc::new(RateLimiter::new(
            ranking::PROVIDER_ID,
            &config.ranking.rate_limit,
        ));

        let ranking = RankingFetcher::new(
            providers.ranking,
            limiter,
            config.ranking.page_size,
            config.ranking.max_pages,
        );
        let market = MarketDataFetcher::new(providers.runner.clone(), &config.market.script);
        if !market.is_enabled() {
            info!("Market data script not configured, market data refresh disabled");
        }
        let node_stats = NodeStatsFetcher::new(providers.runner, &config.node_stats.connection);
        if !node_stats.is_enabled() {
            info!("Node connection not configured, node stats refresh disabled");
        }

        let tasks = vec![
            FetchTask::new(Arc::new(ranking), config.ranking.schedule, policy.clone()),
            FetchTask::new(Arc::new(market), config.market.schedule, policy.clone()),
            FetchTask::new(Arc::new(node_stats), config.node_stats.schedule, policy),
        ];

        let monitor = Arc::new(CredentialMonitor::new(
            providers.credential.clone(),
            config.credential.clone(),
        ));
        let (warm, _) = watch::channel(false);

        Ok(Self {
            store,
            tasks,
            credential: providers.credential,
            monitor,
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
            started: AtomicBool::new(false),
            warm: Arc::new(warm),
        })
    }

    /// Begin warm-up and scheduling. Returns immediately; later calls are no-ops.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("Refresh engine already started");
            return;
        }
        if self.cancel.is_cancelled() {
            warn!("Refresh engine was stopped before start, not scheduling");
            self.warm.send_replace(true);
            return;
        }

        info!("Starting refresh engine with {} tasks", self.tasks.len());
        self.tracker.spawn(run_credential_monitor(
            self.monitor.clone(),
            self.cancel.clone(),
        ));

        let tasks = self.tasks.clone();
        let store = self.store.clone();
        let cancel = self.cancel.clone();
        let tracker = self.tracker.clone();
        let warm = self.warm.clone();
        self.tracker.spawn(async move {
            join_all(tasks.iter().map(|task| run_logged(task, &store, &cancel))).await;
            warm.send_replace(true);

            if cancel.is_cancelled() {
                return;
            }
            info!("Warm-up complete, entering steady-state schedule");
            for task in tasks {
                tracker.spawn(run_periodic(
                    task,
                    store.clone(),
                    cancel.clone(),
                    tracker.clone(),
                ));
            }
        });
    }

    /// Wait until the warm-up has finished (or the engine is stopped).
    pub async fn wait_until_warm(&self) {
        let mut rx = self.warm.subscribe();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                changed = rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
            }
        }
    }

    pub fn is_warm(&self) -> bool {
        *self.warm.borrow()
    }

    /// Copy of the current snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.store.snapshot()
    }

    /// Names of the scheduled tasks.
    pub fn task_names(&self) -> Vec<&'static str> {
        self.tasks.iter().map(FetchTask::name).collect()
    }

    pub fn has_task(&self, name: &str) -> bool {
        self.find_task(name).is_some()
    }

    fn find_task(&self, name: &str) -> Option<&FetchTask> {
        self.tasks
            .iter()
            .find(|task| task.name().eq_ignore_ascii_case(name))
    }

    /// Run one extra invocation of the named task, with retries, and wait for it.
    pub async fn refresh_now(&self, name: &str) -> Result<FetchOutcome> {
        let task = self
            .find_task(name)
            .ok_or_else(|| RefreshError::ConfigInvalid(format!("unknown task '{}'", name)))?;
        info!("[{}] on-demand refresh requested", task.name());
        run_logged(task, &self.store, &self.cancel).await
    }

    /// Replace the ranking credential and re-run the expiry check against it.
    pub fn rotate_credential(&self, token: &str) -> Result<CredentialCheck> {
        if token.trim().is_empty() {
            return Err(RefreshError::CredentialMissing(
                "ranking API token".to_string(),
            ));
        }
        self.credential.replace(token.trim());
        info!("Ranking API credential rotated");
        Ok(self.monitor.check(Utc::now()))
    }

    /// Cancel everything and wait for spawned work to finish. Safe to call repeatedly.
    pub async fn stop(&self) {
        if !self.cancel.is_cancelled() {
            info!("Stopping refresh engine");
            self.cancel.cancel();
        }
        self.tracker.close();
        self.tracker.wait().await;
        debug!("Refresh engine stopped");
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for RefreshEngine {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// One invocation with its outcome logged against the task name.
async fn run_logged(
    task: &FetchTask,
    store: &SnapshotStore,
    cancel: &CancellationToken,
) -> Result<FetchOutcome> {
    let result = run_with_retry(task, store, cancel).await;
    match &result {
        Ok(FetchOutcome::Committed) => debug!("[{}] refresh committed", task.name()),
        Ok(FetchOutcome::Cached) => debug!("[{}] refresh served from cache", task.name()),
        Ok(FetchOutcome::Disabled) => debug!("[{}] refresh skipped", task.name()),
        Err(e) if e.is_canceled() => debug!("[{}] refresh canceled: {}", task.name(), e),
        Err(e) => error!(
            "[{}] refresh failed, keeping previous data: {}",
            task.name(),
            e
        ),
    }
    result
}

async fn run_periodic(
    task: FetchTask,
    store: Arc<SnapshotStore>,
    cancel: CancellationToken,
    tracker: TaskTracker,
) {
    let period = task.interval();
    let mut ticker = match Instant::now().checked_add(period) {
        Some(first) => interval_at(first, period),
        None => interval(period),
    };
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    debug!("[{}] scheduled every {:?}", task.name(), period);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let (task, store, cancel) = (task.clone(), store.clone(), cancel.clone());
        tracker.spawn(async move {
            let _ = run_logged(&task, &store, &cancel).await;
        });
    }
    debug!("[{}] timer stopped", task.name());
}

async fn run_credential_monitor(monitor: Arc<CredentialMonitor>, cancel: CancellationToken) {
    let mut ticker = interval(monitor.check_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                monitor.check(Utc::now());
            }
        }
    }
    debug!("Credential monitor stopped");
}
