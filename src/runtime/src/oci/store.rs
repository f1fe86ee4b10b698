//! Content store capability consumed by the index composer.
//!
//! A store is content-addressed: every blob or manifest is identified by its
//! digest, and tags are mutable aliases onto those digests. References passed
//! to a store are relative to the store's repository (a tag or a digest).

use a3s_index_core::{Descriptor, StoreError};
use async_trait::async_trait;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A tag association that failed during a batch.
#[derive(Debug)]
pub struct TagFailure {
    /// Reference that could not be tagged
    pub reference: String,
    /// Underlying store error
    pub source: StoreError,
}

/// Why publishing content under a set of references failed.
#[derive(Debug)]
pub enum PublishFailure {
    /// The content could not be stored
    Push(StoreError),
    /// A reference could not be pointed at the content
    Tag(TagFailure),
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Fetch the full content a descriptor denotes.
    async fn fetch(&self, desc: &Descriptor) -> StoreResult<Vec<u8>>;

    /// Resolve a tag or digest and fetch its content in one step.
    async fn fetch_reference(&self, reference: &str) -> StoreResult<(Descriptor, Vec<u8>)>;

    /// Store content by digest. Content that already exists is a successful no-op.
    async fn push(&self, desc: &Descriptor, content: &[u8]) -> StoreResult<()>;

    /// Point `reference` at already-stored content.
    async fn tag(&self, desc: &Descriptor, reference: &str) -> StoreResult<()>;

    /// Resolve a tag or digest to a descriptor.
    async fn resolve(&self, reference: &str) -> StoreResult<Descriptor>;

    /// Point every reference at `desc`.
    ///
    /// Stores that can apply a batch in one logical operation override this.
    /// The default tags one reference at a time and stops at the first failure.
    async fn tag_all(
        &self,
        desc: &Descriptor,
        references: &[String],
    ) -> std::result::Result<(), TagFailure> {
        for reference in references {
            self.tag(desc, reference)
                .await
                .map_err(|source| TagFailure {
                    reference: reference.clone(),
                    source,
                })?;
        }
        Ok(())
    }

    /// Store `content` and point every reference at it.
    ///
    /// Content that already exists counts as stored. The default pushes by
    /// digest and then tags the batch. Stores whose tagging uploads the
    /// content anyway override this to skip the push by digest.
    async fn push_tagged(
        &self,
        desc: &Descriptor,
        content: &[u8],
        references: &[String],
    ) -> std::result::Result<(), PublishFailure> {
        match self.push(desc, content).await {
            Ok(()) | Err(StoreError::AlreadyExists(_)) => {}
            Err(source) => return Err(PublishFailure::Push(source)),
        }
        if references.is_empty() {
            return Ok(());
        }
        self.tag_all(desc, references)
            .await
            .map_err(PublishFailure::Tag)
    }
}
