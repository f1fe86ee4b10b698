//! A3S Index CLI entry point.

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use a3s_index_cli::commands::{dispatch, Cli};
use a3s_index_core::IndexConfig;

#[tokio::main]
async fn main() {
    let config = match IndexConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str())),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Ctrl-C aborts the running command between steps
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling");
            on_signal.cancel();
        }
    });

    if let Err(e) = dispatch(cli, &config, cancel).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
