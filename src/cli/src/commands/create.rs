//! `a3s-index create` command: compose an index from existing manifests.

use std::collections::BTreeMap;

use a3s_index_core::{is_digest, IndexConfig, IndexError};
use a3s_index_runtime::{Composed, CreateRequest, IndexComposer};
use clap::Args;
use tokio_util::sync::CancellationToken;

use crate::output::{render_index, OutputFormat};
use crate::target::{validate_source, Target, TargetArgs};

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Target reference, e.g. "ghcr.io/org/app:v1" or "ghcr.io/org/app:v1,v2,latest"
    pub target: String,

    /// Tags or digests of the manifests to include, in order
    #[arg(required = true)]
    pub sources: Vec<String>,

    /// Artifact type of the index
    #[arg(long)]
    pub artifact_type: Option<String>,

    /// Index annotation (can be repeated)
    #[arg(long = "annotation", value_name = "KEY=VALUE", value_parser = parse_annotation)]
    pub annotations: Vec<(String, String)>,

    #[command(flatten)]
    pub target_args: TargetArgs,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

/// Parse a `KEY=VALUE` annotation.
pub(crate) fn parse_annotation(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("invalid annotation '{}', expected KEY=VALUE", s)),
    }
}

pub async fn execute(
    args: CreateArgs,
    config: &IndexConfig,
    cancel: CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let format = args.format;
    let (name, composed) = run(args, config, cancel).await?;
    println!("{}", render_index("Created", &name, &composed, format)?);
    Ok(())
}

pub(crate) async fn run(
    args: CreateArgs,
    config: &IndexConfig,
    cancel: CancellationToken,
) -> Result<(String, Composed), IndexError> {
    let target = Target::open(&args.target, &args.target_args, config)?;
    let reference = target.reference.clone().unwrap_or_default();
    if is_digest(&reference) {
        return Err(IndexError::InvalidReference(format!(
            "cannot tag a new index with digest '{}'",
            reference
        )));
    }
    for source in &args.sources {
        validate_source(source)?;
    }

    let annotations = (!args.annotations.is_empty())
        .then(|| args.annotations.into_iter().collect::<BTreeMap<_, _>>());
    let request = CreateRequest {
        sources: args.sources,
        reference,
        extra_references: target.extra_tags.clone(),
        artifact_type: args.artifact_type,
        annotations,
    };

    let composed = IndexComposer::with_cancellation(target.store.as_ref(), cancel)
        .create(&request)
        .await?;
    Ok((target.name, composed))
}
