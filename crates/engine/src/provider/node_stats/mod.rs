//! Local node status provider.
//!
//! Fans out one CLI invocation per status query, all concurrently. A failed
//! query does not stop its siblings. Whatever succeeded is published as the
//! new `local_stats` (failed keys are absent), and the fetch still reports
//! the failures so the retry driver can try the whole batch again.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use log::{debug, info, warn};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::errors::RefreshError;
use crate::models::Fragment;
use crate::provider::command::{CommandRunner, CommandSpec};
use crate::provider::{FetchOutcome, Fetcher};
use crate::store::SnapshotStore;

/// Provider ID constant
pub const PROVIDER_ID: &str = "NODE_STATS";

/// Read-only status queries issued on every refresh.
pub const DEFAULT_QUERIES: &[&str] = &[
    "getinfo",
    "channelbalance",
    "walletbalance",
    "feereport",
    "getnetworkinfo",
];

/// Connection parameters for the node CLI.
///
/// The provider is disabled unless host, certificate and macaroon are all set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeConnection {
    /// CLI binary (e.g. `lncli`)
    pub cli: String,
    pub rpc_host: Option<String>,
    pub tls_cert_path: Option<String>,
    pub macaroon_path: Option<String>,
    pub queries: Vec<String>,
}

impl Default for NodeConnection {
    fn default() -> Self {
        Self {
            cli: "lncli".to_string(),
            rpc_host: None,
            tls_cert_path: None,
            macaroon_path: None,
            queries: DEFAULT_QUERIES.iter().map(|q| q.to_string()).collect(),
        }
    }
}

impl NodeConnection {
    /// Connection arguments, or `None` when any parameter is missing.
    fn connection_args(&self) -> Option<Vec<String>> {
        let present = |v: &Option<String>| v.as_ref().filter(|s| !s.trim().is_empty()).cloned();
        let host = present(&self.rpc_host)?;
        let cert = present(&self.tls_cert_path)?;
        let macaroon = present(&self.macaroon_path)?;
        Some(vec![
            format!("--rpcserver={}", host),
            format!("--tlscertpath={}", cert),
            format!("--macaroonpath={}", macaroon),
        ])
    }

    pub fn is_configured(&self) -> bool {
        self.connection_args().is_some()
    }
}

pub struct NodeStatsFetcher {
    runner: Arc<dyn CommandRunner>,
    /// `(query name, invocation)`; empty when the provider is disabled.
    commands: Vec<(String, CommandSpec)>,
}

impl NodeStatsFetcher {
    pub fn new(runner: Arc<dyn CommandRunner>, connection: &NodeConnection) -> Self {
        let commands = match connection.connection_args() {
            Some(args) => connection
                .queries
                .iter()
                .map(|query| {
                    let spec = CommandSpec::new(connection.cli.clone())
                        .args(args.iter().cloned())
                        .arg(query.clone());
                    (query.clone(), spec)
                })
                .collect(),
            None => Vec::new(),
        };
        Self { runner, commands }
    }

    pub fn is_enabled(&self) -> bool {
        !self.commands.is_empty()
    }

    async fn run_query(
        &self,
        name: &str,
        spec: &CommandSpec,
        cancel: &CancellationToken,
    ) -> Result<Value, RefreshError> {
        let output = tokio::select! {
            _ = cancel.cancelled() => {
                return Err(RefreshError::Canceled(format!("{} {}", PROVIDER_ID, name)));
            }
            output = self.runner.run(spec) => output,
        }
        .map_err(|e| RefreshError::CommandFailure {
            command: name.to_string(),
            message: format!("Failed to spawn '{}': {}", spec.program, e),
        })?;

        if !output.success() {
            return Err(RefreshError::CommandFailure {
                command: name.to_string(),
                message: output.failure_message(),
            });
        }

        match serde_json::from_str::<Value>(output.stdout.trim()) {
            Ok(value @ Value::Object(_)) => Ok(value),
            Ok(_) => Err(RefreshError::parse(
                PROVIDER_ID,
                format!("{}: expected a JSON object", name),
            )),
            Err(e) => Err(RefreshError::parse(
                PROVIDER_ID,
                format!("{}: invalid JSON: {}", name, e),
            )),
        }
    }
}

#[async_trait]
impl Fetcher for NodeStatsFetcher {
    fn name(&self) -> &'static str {
        PROVIDER_ID
    }

    async fn fetch(
        &self,
        store: &SnapshotStore,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome, RefreshError> {
        if !self.is_enabled() {
            debug!("[{}] node connection not configured, skipping", PROVIDER_ID);
            return Ok(FetchOutcome::Disabled);
        }

        let results = join_all(self.commands.iter().map(|(name, spec)| async move {
            (name.clone(), self.run_query(name, spec, cancel).await)
        }))
        .await;

        if cancel.is_cancelled() {
            return Err(RefreshError::Canceled(format!("{} fan-out", PROVIDER_ID)));
        }

        let total = results.len();
        let mut stats = BTreeMap::new();
        let mut failures = Vec::new();
        for (name, result) in results {
            match result {
                Ok(value) => {
                    stats.insert(name, value);
                }
                Err(e) => {
                    warn!("[{}] query '{}' failed: {}", PROVIDER_ID, name, e);
                    failures.push((name, e));
                }
            }
        }

        if !stats.is_empty() {
            info!(
                "[{}] publishing {} of {} queries",
                PROVIDER_ID,
                stats.len(),
                total
            );
            store.commit(Fragment::NodeStats {
                stats,
                fetched_at: Utc::now(),
            });
        }

        if failures.is_empty() {
            Ok(FetchOutcome::Committed)
        } else {
            Err(RefreshError::Partial {
                provider: PROVIDER_ID.to_string(),
                total,
                failures,
            })
        }
    }
}
