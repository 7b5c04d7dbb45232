//! Market data provider backed by an external script.
//!
//! The script is expensive, so its last good output is kept in the store's
//! TTL cache. A refresh inside the TTL window republishes the cached value
//! without spawning anything.

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::errors::RefreshError;
use crate::models::MarketQuote;
use crate::provider::command::{CommandRunner, CommandSpec};
use crate::provider::{FetchOutcome, Fetcher};
use crate::store::SnapshotStore;

/// Provider ID constant
pub const PROVIDER_ID: &str = "MARKET_DATA";

/// Environment variable through which the credential reaches the script.
pub const DEFAULT_CREDENTIAL_ENV: &str = "MARKET_API_KEY";

/// How to invoke the market-data script.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MarketScriptConfig {
    /// Interpreter to run the script with (e.g. `python3`); `None` runs the script directly.
    pub interpreter: Option<String>,
    /// Path to the script.
    pub script: String,
    /// Credential injected into the script's environment.
    pub credential: Option<String>,
    /// Name of the environment variable carrying the credential.
    pub credential_env: String,
}

impl MarketScriptConfig {
    fn command(&self) -> CommandSpec {
        if self.script.trim().is_empty() {
            return CommandSpec::default();
        }
        let mut spec = match &self.interpreter {
            Some(interpreter) => CommandSpec::new(interpreter.clone()).arg(self.script.clone()),
            None => CommandSpec::new(self.script.clone()),
        };
        if let Some(credential) = &self.credential {
            let key = if self.credential_env.is_empty() {
                DEFAULT_CREDENTIAL_ENV
            } else {
                self.credential_env.as_str()
            };
            spec = spec.env(key, credential.clone());
        }
        spec
    }
}

pub struct MarketDataFetcher {
    runner: Arc<dyn CommandRunner>,
    command: CommandSpec,
}

impl MarketDataFetcher {
    pub fn new(runner: Arc<dyn CommandRunner>, config: &MarketScriptConfig) -> Self {
        Self {
            runner,
            command: config.command(),
        }
    }

    /// A blank script path disables the provider.
    pub fn is_enabled(&self) -> bool {
        !self.command.program.trim().is_empty()
    }

    async fn run_script(&self, cancel: &CancellationToken) -> Result<MarketQuote, RefreshError> {
        let output = tokio::select! {
            _ = cancel.cancelled() => {
                return Err(RefreshError::Canceled(format!("{} script", PROVIDER_ID)));
            }
            output = self.runner.run(&self.command) => output,
        }
        .map_err(|e| RefreshError::ProcessFailure {
            provider: PROVIDER_ID.to_string(),
            message: format!("Failed to spawn '{}': {}", self.command.program, e),
        })?;

        if !output.success() {
            return Err(RefreshError::ProcessFailure {
                provider: PROVIDER_ID.to_string(),
                message: output.failure_message(),
            });
        }

        MarketQuote::parse(&output.stdout).map_err(|e| RefreshError::parse(PROVIDER_ID, e))
    }
}

#[async_trait]
impl Fetcher for MarketDataFetcher {
    fn name(&self) -> &'static str {
        PROVIDER_ID
    }

    async fn fetch(
        &self,
        store: &SnapshotStore,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome, RefreshError> {
        if !self.is_enabled() {
            debug!("[{}] no script configured, skipping", PROVIDER_ID);
            return Ok(FetchOutcome::Disabled);
        }

        if store.publish_cached_market_data(Instant::now()) {
            debug!("[{}] served from cache", PROVIDER_ID);
            return Ok(FetchOutcome::Cached);
        }

        let quote = self.run_script(cancel).await?;
        info!("[{}] fetched price {}", PROVIDER_ID, quote.price);
        store.commit_market_data(quote.into_map(), Instant::now());
        Ok(FetchOutcome::Committed)
    }
}
