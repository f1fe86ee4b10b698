//! Index publishing under zero or more references.

use a3s_index_core::{Descriptor, IndexError, Result};
use tokio_util::sync::CancellationToken;

use super::assemble::PackedIndex;
use super::store::{PublishFailure, Store};

/// Fold the primary reference into the extra references.
///
/// The primary reference goes last; duplicates are dropped, keeping the
/// first occurrence.
pub fn collect_references(reference: &str, extra_references: &[String]) -> Vec<String> {
    let mut references: Vec<String> = Vec::with_capacity(extra_references.len() + 1);
    let primary = (!reference.is_empty()).then(|| reference.to_string());
    for candidate in extra_references.iter().cloned().chain(primary) {
        if !references.contains(&candidate) {
            references.push(candidate);
        }
    }
    references
}

/// Push `packed` once and point every reference at it.
///
/// With no references the index is stored by digest only. Otherwise the
/// content is stored once and tagged in a single batch; a failing tag ends
/// the batch and is reported by name.
pub async fn publish_index<S: Store + ?Sized>(
    store: &S,
    packed: &PackedIndex,
    reference: &str,
    extra_references: &[String],
    cancel: &CancellationToken,
) -> Result<Descriptor> {
    if cancel.is_cancelled() {
        return Err(IndexError::Cancelled);
    }

    let desc = &packed.descriptor;
    let references = collect_references(reference, extra_references);
    store
        .push_tagged(desc, &packed.content, &references)
        .await
        .map_err(|failure| match failure {
            PublishFailure::Push(source) => IndexError::Publish {
                reference: None,
                source,
            },
            PublishFailure::Tag(failure) => IndexError::Publish {
                reference: Some(failure.reference),
                source: failure.source,
            },
        })?;

    tracing::info!(
        digest = %desc.digest,
        references = ?references,
        "Published index"
    );
    Ok(desc.clone())
}
