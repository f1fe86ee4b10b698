//! `a3s-index resolve` command: print the digest behind a reference.

use a3s_index_core::{IndexConfig, IndexError};
use clap::Args;

use crate::target::{Target, TargetArgs};

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Reference to resolve, e.g. "ghcr.io/org/app:v1"
    pub reference: String,

    /// Print `name@digest` instead of the bare digest
    #[arg(long)]
    pub full_reference: bool,

    #[command(flatten)]
    pub target_args: TargetArgs,
}

pub async fn execute(
    args: ResolveArgs,
    config: &IndexConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", run(&args, config).await?);
    Ok(())
}

pub(crate) async fn run(args: &ResolveArgs, config: &IndexConfig) -> Result<String, IndexError> {
    let target = Target::open(&args.reference, &args.target_args, config)?;
    let Some(reference) = target.reference.as_deref() else {
        return Err(IndexError::InvalidReference(format!(
            "'{}' names no tag or digest",
            args.reference
        )));
    };

    let desc = target
        .store
        .resolve(reference)
        .await
        .map_err(|source| IndexError::ReferenceResolution {
            reference: reference.to_string(),
            source,
        })?;
    tracing::debug!(reference, digest = %desc.digest, "Resolved reference");

    Ok(if args.full_reference {
        target.display(&desc.digest)
    } else {
        desc.digest
    })
}
