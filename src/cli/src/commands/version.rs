//! `a3s-index version` command.

use clap::Args;

#[derive(Args)]
pub struct VersionArgs;

pub async fn execute(_args: VersionArgs) -> Result<(), Box<dyn std::error::Error>> {
    println!("a3s-index version {}", a3s_index_runtime::VERSION);
    Ok(())
}
