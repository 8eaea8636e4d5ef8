//! Game server (default binary).
//!
//! Reads its configuration from `GEMSWAP_*` environment variables and serves
//! rooms over line-delimited JSON until interrupted.

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use gemswap::adapter::{run_server, ServerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("gemswap=info,gemswap_adapter=info")),
        )
        .init();

    let config = ServerConfig::from_env();
    info!(
        host = %config.host,
        port = config.port,
        rows = config.engine.rows,
        cols = config.engine.cols,
        data_dir = ?config.data_dir,
        default_room = %config.default_room,
        "starting gemswap server"
    );

    tokio::select! {
        result = run_server(config, None) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
            Ok(())
        }
    }
}
