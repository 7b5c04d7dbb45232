use std::{net::SocketAddr, str::FromStr, time::Duration};

use anyhow::{anyhow, Context};
use nodewatch_engine::EngineConfig;

pub struct Config {
    pub listen_addr: SocketAddr,
    pub cors_allow: Vec<String>,
    pub request_timeout: Duration,
    pub static_dir: String,
    pub engine: EngineConfig,
}

impl Config {
    /// Load `.env` (if present) and read the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let listen_addr: SocketAddr = var("NW_LISTEN_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8080".to_string())
            .parse()
            .context("Invalid NW_LISTEN_ADDR")?;
        let cors_allow = var("NW_CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|| "*".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let timeout_ms: u64 = parse_or(&var, "NW_REQUEST_TIMEOUT_MS", 30_000)?;
        let static_dir = var("NW_STATIC_DIR").unwrap_or_else(|| "dist".into());

        let mut engine = EngineConfig::default();

        engine.ranking.endpoint =
            var("NW_RANKING_API_URL").ok_or_else(|| anyhow!("NW_RANKING_API_URL must be set"))?;
        engine.ranking.api_token = var("NW_RANKING_API_TOKEN")
            .ok_or_else(|| anyhow!("Credential missing: NW_RANKING_API_TOKEN must be set"))?;
        engine.ranking.page_size = parse_or(&var, "NW_RANKING_PAGE_SIZE", engine.ranking.page_size)?;
        engine.ranking.schedule.interval =
            secs_or(&var, "NW_RANKING_INTERVAL_SECS", engine.ranking.schedule.interval)?;

        engine.market.script.script = var("NW_MARKET_SCRIPT").unwrap_or_default();
        engine.market.script.interpreter = var("NW_MARKET_INTERPRETER");
        engine.market.script.credential = var("NW_MARKET_API_KEY");
        engine.market.script.credential_env =
            nodewatch_engine::provider::market::DEFAULT_CREDENTIAL_ENV.to_string();
        engine.market.schedule.interval =
            secs_or(&var, "NW_MARKET_INTERVAL_SECS", engine.market.schedule.interval)?;
        engine.market.cache_ttl = secs_or(&var, "NW_MARKET_CACHE_TTL_SECS", engine.market.cache_ttl)?;

        if let Some(cli) = var("NW_NODE_CLI") {
            engine.node_stats.connection.cli = cli;
        }
        engine.node_stats.connection.rpc_host = var("NW_NODE_RPC_HOST");
        engine.node_stats.connection.tls_cert_path = var("NW_NODE_TLS_CERT");
        engine.node_stats.connection.macaroon_path = var("NW_NODE_MACAROON");
        engine.node_stats.schedule.interval = secs_or(
            &var,
            "NW_NODE_STATS_INTERVAL_SECS",
            engine.node_stats.schedule.interval,
        )?;

        engine.backoff.max_retries = parse_or(&var, "NW_MAX_RETRIES", engine.backoff.max_retries)?;

        engine
            .validate()
            .map_err(|e| anyhow!("Invalid engine configuration: {}", e))?;

        Ok(Self {
            listen_addr,
            cors_allow,
            request_timeout: Duration::from_millis(timeout_ms),
            static_dir,
            engine,
        })
    }
}

fn parse_or<T, F>(var: &F, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("Invalid {}: {}", key, e)),
        None => Ok(default),
    }
}

fn secs_or<F>(var: &F, key: &str, default: Duration) -> anyhow::Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let secs: u64 = parse_or(var, key, default.as_secs())?;
    Ok(Duration::from_secs(secs))
}
