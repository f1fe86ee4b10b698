//! In-memory content store.
//!
//! Holds content and tags in process memory and records every interaction,
//! which makes it the store of choice for exercising the composer in tests.

use std::collections::{HashMap, HashSet};

use a3s_index_core::manifest::detect_media_type;
use a3s_index_core::{is_digest, Descriptor, StoreError};
use async_trait::async_trait;
use parking_lot::RwLock;

use super::store::{Store, StoreResult, TagFailure};

/// Counters and call logs of a [`MemoryStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStats {
    /// Number of `push` calls
    pub pushes: usize,
    /// Number of pushes that stored new content
    pub uploads: usize,
    /// Tag associations applied, in order
    pub tags: Vec<String>,
    /// References passed to `fetch_reference` or `resolve`, in order
    pub fetched_references: Vec<String>,
    /// Digests passed to `fetch`, in order
    pub fetched_blobs: Vec<String>,
}

#[derive(Default)]
struct Inner {
    content: HashMap<String, (Descriptor, Vec<u8>)>,
    tags: HashMap<String, Descriptor>,
    failing_tags: HashSet<String>,
    reject_pushes: bool,
    stats: MemoryStats,
}

/// Content store backed by hash maps.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed content without counting it as a push. Returns its descriptor.
    pub fn insert(&self, media_type: &str, content: &[u8]) -> Descriptor {
        let desc = Descriptor::from_bytes(media_type, content);
        self.inner
            .write()
            .content
            .insert(desc.digest.clone(), (desc.clone(), content.to_vec()));
        desc
    }

    /// Seed content and point `tag` at it.
    pub fn insert_tagged(&self, media_type: &str, content: &[u8], tag: &str) -> Descriptor {
        let desc = self.insert(media_type, content);
        self.inner.write().tags.insert(tag.to_string(), desc.clone());
        desc
    }

    /// Make every later tag association for `reference` fail.
    pub fn fail_tag(&self, reference: &str) {
        self.inner.write().failing_tags.insert(reference.to_string());
    }

    /// Make every later push fail.
    pub fn reject_pushes(&self) {
        self.inner.write().reject_pushes = true;
    }

    /// Snapshot of the interaction counters.
    pub fn stats(&self) -> MemoryStats {
        self.inner.read().stats.clone()
    }

    /// Stored bytes for a digest, if present.
    pub fn content(&self, digest: &str) -> Option<Vec<u8>> {
        self.inner
            .read()
            .content
            .get(digest)
            .map(|(_, bytes)| bytes.clone())
    }

    /// Number of distinct content entries.
    pub fn len(&self) -> usize {
        self.inner.read().content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(inner: &Inner, reference: &str) -> StoreResult<Descriptor> {
        if is_digest(reference) {
            inner
                .content
                .get(reference)
                .map(|(desc, _)| desc.clone())
                .ok_or_else(|| StoreError::NotFound(reference.to_string()))
        } else {
            inner
                .tags
                .get(reference)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(reference.to_string()))
        }
    }

    fn check_taggable(inner: &Inner, desc: &Descriptor, reference: &str) -> StoreResult<()> {
        if !inner.content.contains_key(&desc.digest) {
            return Err(StoreError::NotFound(desc.digest.clone()));
        }
        if inner.failing_tags.contains(reference) {
            return Err(rejected(format!("tag {} rejected", reference)));
        }
        if is_digest(reference) && reference != desc.digest {
            return Err(StoreError::DigestMismatch {
                expected: reference.to_string(),
                actual: desc.digest.clone(),
            });
        }
        Ok(())
    }

    fn apply_tag(inner: &mut Inner, desc: &Descriptor, reference: &str) {
        if !is_digest(reference) {
            inner.tags.insert(reference.to_string(), desc.clone());
        }
        inner.stats.tags.push(reference.to_string());
    }
}

fn rejected(message: String) -> StoreError {
    StoreError::Registry {
        registry: "memory".to_string(),
        message,
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn fetch(&self, desc: &Descriptor) -> StoreResult<Vec<u8>> {
        let mut inner = self.inner.write();
        inner.stats.fetched_blobs.push(desc.digest.clone());
        inner
            .content
            .get(&desc.digest)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| StoreError::NotFound(desc.digest.clone()))
    }

    async fn fetch_reference(&self, reference: &str) -> StoreResult<(Descriptor, Vec<u8>)> {
        let mut inner = self.inner.write();
        inner.stats.fetched_references.push(reference.to_string());
        let desc = Self::lookup(&inner, reference)?;
        let bytes = inner
            .content
            .get(&desc.digest)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| StoreError::NotFound(desc.digest.clone()))?;
        Ok((desc, bytes))
    }

    async fn push(&self, desc: &Descriptor, content: &[u8]) -> StoreResult<()> {
        desc.verify(content)?;

        let mut inner = self.inner.write();
        inner.stats.pushes += 1;
        if inner.reject_pushes {
            return Err(rejected(format!("push of {} rejected", desc.digest)));
        }
        if inner.content.contains_key(&desc.digest) {
            return Ok(());
        }

        let mut stored = desc.clone();
        if stored.media_type.is_empty() {
            stored.media_type = detect_media_type(content)
                .unwrap_or_else(|| "application/octet-stream".to_string());
        }
        inner
            .content
            .insert(desc.digest.clone(), (stored, content.to_vec()));
        inner.stats.uploads += 1;
        Ok(())
    }

    async fn tag(&self, desc: &Descriptor, reference: &str) -> StoreResult<()> {
        let mut inner = self.inner.write();
        Self::check_taggable(&inner, desc, reference)?;
        Self::apply_tag(&mut inner, desc, reference);
        Ok(())
    }

    async fn resolve(&self, reference: &str) -> StoreResult<Descriptor> {
        let mut inner = self.inner.write();
        inner.stats.fetched_references.push(reference.to_string());
        Self::lookup(&inner, reference)
    }

    /// Applies the whole batch under one lock: either every tag lands or none does.
    async fn tag_all(
        &self,
        desc: &Descriptor,
        references: &[String],
    ) -> std::result::Result<(), TagFailure> {
        let mut inner = self.inner.write();
        for reference in references {
            Self::check_taggable(&inner, desc, reference).map_err(|source| TagFailure {
                reference: reference.clone(),
                source,
            })?;
        }
        for reference in references {
            Self::apply_tag(&mut inner, desc, reference);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_reference_by_tag_and_digest() {
        let store = MemoryStore::new();
        let desc = store.insert_tagged("text/plain", b"hello", "v1");

        let (by_tag, bytes) = store.fetch_reference("v1").await.unwrap();
        assert_eq!(by_tag, desc);
        assert_eq!(bytes, b"hello");

        let (by_digest, _) = store.fetch_reference(&desc.digest).await.unwrap();
        assert_eq!(by_digest, desc);
    }

    #[tokio::test]
    async fn test_fetch_missing() {
        let store = MemoryStore::new();
        let err = store.fetch_reference("nope").await.unwrap_err();
        assert!(err.is_not_found());

        let desc = Descriptor::from_bytes("text/plain", b"absent");
        assert!(store.fetch(&desc).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_push_existing_content_is_noop() {
        let store = MemoryStore::new();
        let desc = Descriptor::from_bytes("text/plain", b"hello");

        store.push(&desc, b"hello").await.unwrap();
        store.push(&desc, b"hello").await.unwrap();

        let stats = store.stats();
        assert_eq!(stats.pushes, 2);
        assert_eq!(stats.uploads, 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_push_rejects_mismatched_content() {
        let store = MemoryStore::new();
        let desc = Descriptor::from_bytes("text/plain", b"hello");
        let err = store.push(&desc, b"jello").await.unwrap_err();
        assert!(matches!(err, StoreError::DigestMismatch { .. }));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_tag_requires_content() {
        let store = MemoryStore::new();
        let desc = Descriptor::from_bytes("text/plain", b"hello");
        assert!(store.tag(&desc, "v1").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_tag_all_is_all_or_nothing() {
        let store = MemoryStore::new();
        let desc = store.insert("text/plain", b"hello");
        store.fail_tag("broken");

        let refs = vec!["a".to_string(), "broken".to_string(), "c".to_string()];
        let failure = store.tag_all(&desc, &refs).await.unwrap_err();

        assert_eq!(failure.reference, "broken");
        assert!(store.stats().tags.is_empty());
        assert!(store.resolve("a").await.is_err());
    }

    #[tokio::test]
    async fn test_tag_with_own_digest_is_accepted() {
        let store = MemoryStore::new();
        let desc = store.insert("text/plain", b"hello");
        store.tag(&desc, &desc.digest.clone()).await.unwrap();

        let other = Descriptor::from_bytes("text/plain", b"other");
        let err = store.tag(&desc, &other.digest).await.unwrap_err();
        assert!(matches!(err, StoreError::DigestMismatch { .. }));
    }

    #[tokio::test]
    async fn test_retag_moves_alias() {
        let store = MemoryStore::new();
        store.insert_tagged("text/plain", b"old", "latest");
        let new = store.insert("text/plain", b"new");

        store.tag(&new, "latest").await.unwrap();
        assert_eq!(store.resolve("latest").await.unwrap().digest, new.digest);
    }
}
