//! `a3s-index update` command: add or remove manifests of an existing index.

use a3s_index_core::{IndexConfig, IndexError};
use a3s_index_runtime::{Composed, IndexComposer, UpdateRequest};
use clap::Args;
use tokio_util::sync::CancellationToken;

use crate::output::{render_index, OutputFormat};
use crate::target::{validate_source, Target, TargetArgs};

#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Index to update, by tag or digest (extra tags may follow after commas)
    pub target: String,

    /// Tag or digest of a manifest to append (can be repeated)
    #[arg(long)]
    pub add: Vec<String>,

    /// Digest of a manifest to drop (can be repeated)
    #[arg(long)]
    pub remove: Vec<String>,

    /// Additional tag for the updated index (can be repeated)
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    #[command(flatten)]
    pub target_args: TargetArgs,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

pub async fn execute(
    args: UpdateArgs,
    config: &IndexConfig,
    cancel: CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let format = args.format;
    let (name, composed) = run(args, config, cancel).await?;
    println!("{}", render_index("Updated", &name, &composed, format)?);
    Ok(())
}

pub(crate) async fn run(
    args: UpdateArgs,
    config: &IndexConfig,
    cancel: CancellationToken,
) -> Result<(String, Composed), IndexError> {
    let target = Target::open(&args.target, &args.target_args, config)?;
    let Some(reference) = target.reference.clone() else {
        return Err(IndexError::InvalidReference(format!(
            "'{}' names no tag or digest to update",
            args.target
        )));
    };
    for source in &args.add {
        validate_source(source)?;
    }
    for tag in &args.tags {
        if !a3s_index_runtime::oci::is_valid_tag(tag) {
            return Err(IndexError::InvalidReference(format!("invalid tag '{}'", tag)));
        }
    }

    let mut extra_references = target.extra_tags.clone();
    extra_references.extend(args.tags);
    let request = UpdateRequest {
        target: reference,
        add: args.add,
        remove: args.remove,
        extra_references,
    };

    let composed = IndexComposer::with_cancellation(target.store.as_ref(), cancel)
        .update(&request)
        .await?;
    Ok((target.name, composed))
}
