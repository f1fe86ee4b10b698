//! CLI command definitions and dispatch.

mod create;
mod resolve;
mod update;
mod version;

use a3s_index_core::IndexConfig;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

/// A3S Index: compose multi-platform OCI image indexes.
#[derive(Parser)]
#[command(name = "a3s-index", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Command {
    /// Create an index from existing manifests and push it
    Create(create::CreateArgs),
    /// Add or remove manifests of an existing index and push the result
    Update(update::UpdateArgs),
    /// Print the digest a reference resolves to
    Resolve(resolve::ResolveArgs),
    /// Show version information
    Version(version::VersionArgs),
}

/// Dispatch a parsed CLI to the appropriate command handler.
pub async fn dispatch(
    cli: Cli,
    config: &IndexConfig,
    cancel: CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Create(args) => create::execute(args, config, cancel).await,
        Command::Update(args) => update::execute(args, config, cancel).await,
        Command::Resolve(args) => resolve::execute(args, config).await,
        Command::Version(args) => version::execute(args).await,
    }
}
