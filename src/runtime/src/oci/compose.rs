//! Index composition: resolve → extract platforms → assemble → publish.
//!
//! Each call is independent: all state lives in the call, and the store is
//! the only thing consulted or changed.

use std::collections::BTreeMap;

use a3s_index_core::manifest::is_index;
use a3s_index_core::{is_digest, Descriptor, ImageIndex, IndexError, Result};
use tokio_util::sync::CancellationToken;

use super::assemble::pack_index;
use super::publish::{collect_references, publish_index};
use super::resolve::{fetch_source, resolve_manifests};
use super::store::Store;

/// Create a new index from source manifests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateRequest {
    /// Source tags or digests, in index order
    pub sources: Vec<String>,
    /// Primary tag for the index; empty for an untagged push
    pub reference: String,
    /// Additional tags
    pub extra_references: Vec<String>,
    /// `artifactType` of the new index
    pub artifact_type: Option<String>,
    /// `annotations` of the new index
    pub annotations: Option<BTreeMap<String, String>>,
}

/// Rebuild an existing index with manifests added or removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateRequest {
    /// Tag or digest of the index to update
    pub target: String,
    /// Source tags or digests appended after the kept manifests
    pub add: Vec<String>,
    /// Digests of manifests to drop
    pub remove: Vec<String>,
    /// Additional tags for the updated index
    pub extra_references: Vec<String>,
}

/// Outcome of a successful composition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Composed {
    /// Descriptor of the published index
    pub descriptor: Descriptor,
    /// References now resolving to `descriptor`
    pub references: Vec<String>,
}

/// Composes and publishes image indexes against one store.
pub struct IndexComposer<'a, S: Store + ?Sized> {
    store: &'a S,
    cancel: CancellationToken,
}

impl<'a, S: Store + ?Sized> IndexComposer<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self::with_cancellation(store, CancellationToken::new())
    }

    /// Use `cancel` to abort between steps.
    pub fn with_cancellation(store: &'a S, cancel: CancellationToken) -> Self {
        Self { store, cancel }
    }

    /// Resolve `sources`, assemble them onto `base` and publish the result.
    pub async fn compose(
        &self,
        base: &ImageIndex,
        mut manifests: Vec<Descriptor>,
        sources: &[String],
        reference: &str,
        extra_references: &[String],
    ) -> Result<Composed> {
        manifests.extend(resolve_manifests(self.store, sources, &self.cancel).await?);

        if self.cancel.is_cancelled() {
            return Err(IndexError::Cancelled);
        }
        let packed = pack_index(base, manifests)?;
        tracing::debug!(
            digest = %packed.descriptor.digest,
            manifests = packed.index.manifests.len(),
            "Assembled index"
        );

        let descriptor =
            publish_index(self.store, &packed, reference, extra_references, &self.cancel).await?;

        Ok(Composed {
            descriptor,
            references: collect_references(reference, extra_references),
        })
    }

    /// Create an index from `request.sources`.
    pub async fn create(&self, request: &CreateRequest) -> Result<Composed> {
        let base = ImageIndex {
            artifact_type: request.artifact_type.clone(),
            annotations: request.annotations.clone(),
            ..ImageIndex::default()
        };

        tracing::info!(
            sources = request.sources.len(),
            reference = %request.reference,
            "Creating index"
        );
        self.compose(
            &base,
            Vec::new(),
            &request.sources,
            &request.reference,
            &request.extra_references,
        )
        .await
    }

    /// Update the index at `request.target`.
    ///
    /// `artifactType`, `subject` and `annotations` of the existing index are
    /// kept. A tag target is moved to the new index; a digest target is left
    /// alone and the new index is only tagged with the extra references.
    pub async fn update(&self, request: &UpdateRequest) -> Result<Composed> {
        if self.cancel.is_cancelled() {
            return Err(IndexError::Cancelled);
        }
        let existing = fetch_source(self.store, &request.target).await?;
        if !is_index(&existing.descriptor.media_type) {
            return Err(IndexError::NotAnIndex {
                reference: request.target.clone(),
                media_type: existing.descriptor.media_type,
            });
        }

        let base: ImageIndex =
            serde_json::from_slice(&existing.content).map_err(|e| IndexError::ManifestDecode {
                digest: existing.descriptor.digest.clone(),
                message: e.to_string(),
            })?;

        for digest in &request.remove {
            if !is_digest(digest) {
                return Err(IndexError::InvalidReference(format!(
                    "'{}' is not a digest",
                    digest
                )));
            }
            if !base.manifests.iter().any(|m| &m.digest == digest) {
                return Err(IndexError::ManifestNotInIndex {
                    digest: digest.clone(),
                });
            }
        }
        let kept: Vec<Descriptor> = base
            .manifests
            .iter()
            .filter(|m| !request.remove.contains(&m.digest))
            .cloned()
            .collect();

        tracing::info!(
            index = %request.target,
            digest = %existing.descriptor.digest,
            added = request.add.len(),
            removed = base.manifests.len() - kept.len(),
            "Updating index"
        );

        let reference = if is_digest(&request.target) {
            ""
        } else {
            request.target.as_str()
        };
        self.compose(&base, kept, &request.add, reference, &request.extra_references)
            .await
    }
}
