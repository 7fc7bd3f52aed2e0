//! Startup helpers for the recall server.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use crate::memory::core::config::MemoryConfig;
use crate::server::{self, AppState};

/// Run the server until Ctrl-C.
///
/// # Returns
/// `ExitCode::SUCCESS` on graceful shutdown, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    let _ = dotenvy::dotenv();
    init_tracing();

    tracing::info!("Starting recall v{}", env!("CARGO_PKG_VERSION"));

    match serve() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::from(1)
        }
    }
}

/// Initialize the global tracing subscriber (`RUST_LOG` overrides `info`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Load configuration and build application state without starting the server.
///
/// # Errors
/// Returns an error if the environment holds invalid settings or the
/// completion backend cannot be built.
pub fn initialize() -> anyhow::Result<Arc<AppState>> {
    let config = MemoryConfig::from_env().context("invalid configuration")?;
    if !config.llm.credential_configured() {
        tracing::warn!("OPENAI_API_KEY is not set; /ai/chat and /ai/summarize will fail");
    }
    tracing::info!(
        provider = %config.llm.provider,
        model = %config.llm.model,
        port = config.server.port,
        "configuration loaded"
    );

    AppState::from_config(config).context("failed to build application state")
}

fn serve() -> anyhow::Result<()> {
    let state = initialize()?;

    let rt = tokio::runtime::Runtime::new().context("failed to create runtime")?;
    rt.block_on(server::run_server_with_shutdown(state, shutdown_signal()))
        .map_err(|err| anyhow::anyhow!(err))
        .context("server error")
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
