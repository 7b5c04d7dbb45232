use std::sync::Arc;

use chrono::{DateTime, Utc};
use nodewatch_engine::{Providers, RefreshEngine};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;

pub struct AppState {
    pub engine: Arc<RefreshEngine>,
    /// Process start, reported as uptime by the health endpoint.
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(engine: Arc<RefreshEngine>) -> Self {
        Self {
            engine,
            started_at: Utc::now(),
        }
    }
}

/// Install the global subscriber. Records emitted through the `log` facade
/// (the engine crate) are captured too.
pub fn init_tracing() {
    let log_format = std::env::var("NW_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

/// Build the engine from configuration. The engine is not started.
pub fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let providers = Providers::live(&config.engine)?;
    let engine = RefreshEngine::new(config.engine.clone(), providers)?;
    tracing::info!(
        "Refresh engine configured with tasks: {}",
        engine.task_names().join(", ")
    );
    Ok(Arc::new(AppState::new(Arc::new(engine))))
}

/// Resolves on Ctrl-C (and SIGTERM on unix).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
