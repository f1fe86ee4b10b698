//! Source reference resolution.
//!
//! Turns the source references of an index (tags or digests) into index
//! entries, in input order. Sources are resolved one at a time and
//! resolution stops at the first failure, so a bad source never costs the
//! fetches of the sources after it.

use a3s_index_core::manifest::is_image_manifest;
use a3s_index_core::{Descriptor, IndexError, Result};
use tokio_util::sync::CancellationToken;

use super::platform::extract_platform;
use super::store::Store;

/// A source fetched from the store, before platform extraction.
#[derive(Debug, Clone)]
pub struct ResolvedSource {
    /// Reference as given by the caller
    pub reference: String,
    /// Descriptor of the fetched content
    pub descriptor: Descriptor,
    /// Full content bytes
    pub content: Vec<u8>,
}

impl ResolvedSource {
    /// Image manifests get their platform extracted; indexes and artifacts pass through.
    pub fn needs_platform(&self) -> bool {
        is_image_manifest(&self.descriptor.media_type)
    }
}

/// Fetch one source reference with its content.
pub async fn fetch_source<S: Store + ?Sized>(store: &S, reference: &str) -> Result<ResolvedSource> {
    let (descriptor, content) = store
        .fetch_reference(reference)
        .await
        .map_err(|source| IndexError::ReferenceResolution {
            reference: reference.to_string(),
            source,
        })?;

    tracing::debug!(
        reference,
        digest = %descriptor.digest,
        media_type = %descriptor.media_type,
        "Resolved source"
    );

    Ok(ResolvedSource {
        reference: reference.to_string(),
        descriptor,
        content,
    })
}

/// Resolve every source to its final index entry, preserving input order.
///
/// Each source is fetched and, if it is an image manifest, enriched with its
/// platform before the next source is touched. Cancellation is observed
/// between steps.
pub async fn resolve_manifests<S: Store + ?Sized>(
    store: &S,
    sources: &[String],
    cancel: &CancellationToken,
) -> Result<Vec<Descriptor>> {
    let mut resolved = Vec::with_capacity(sources.len());

    for source in sources {
        if cancel.is_cancelled() {
            return Err(IndexError::Cancelled);
        }
        let fetched = fetch_source(store, source).await?;

        let descriptor = if fetched.needs_platform() {
            if cancel.is_cancelled() {
                return Err(IndexError::Cancelled);
            }
            extract_platform(store, &fetched.descriptor, &fetched.content).await?
        } else {
            fetched.descriptor
        };
        resolved.push(descriptor);
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oci::memory::MemoryStore;
    use a3s_index_core::manifest::{
        MEDIA_TYPE_IMAGE_CONFIG, MEDIA_TYPE_IMAGE_INDEX, MEDIA_TYPE_IMAGE_MANIFEST,
    };
    use a3s_index_core::Platform;

    fn seed_image(store: &MemoryStore, tag: &str, os: &str, arch: &str) -> Descriptor {
        let config = store.insert(
            MEDIA_TYPE_IMAGE_CONFIG,
            format!(r#"{{"architecture":"{arch}","os":"{os}"}}"#).as_bytes(),
        );
        let body = serde_json::to_vec(&serde_json::json!({
            "schemaVersion": 2,
            "mediaType": MEDIA_TYPE_IMAGE_MANIFEST,
            "config": config,
            "layers": []
        }))
        .unwrap();
        store.insert_tagged(MEDIA_TYPE_IMAGE_MANIFEST, &body, tag)
    }

    fn refs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_preserves_input_order() {
        let store = MemoryStore::new();
        let c = seed_image(&store, "c", "linux", "ppc64le");
        let a = seed_image(&store, "a", "linux", "amd64");
        let b = seed_image(&store, "b", "linux", "arm64");

        let resolved = resolve_manifests(&store, &refs(&["a", "b", "c"]), &CancellationToken::new())
            .await
            .unwrap();

        let digests: Vec<_> = resolved.iter().map(|d| d.digest.as_str()).collect();
        assert_eq!(digests, vec![a.digest.as_str(), b.digest.as_str(), c.digest.as_str()]);
        assert_eq!(resolved[0].platform, Some(Platform::new("linux", "amd64")));
        assert_eq!(resolved[1].platform, Some(Platform::new("linux", "arm64")));
    }

    #[tokio::test]
    async fn test_accepts_digest_references() {
        let store = MemoryStore::new();
        let amd64 = seed_image(&store, "amd64", "linux", "amd64");

        let resolved = resolve_manifests(
            &store,
            &[amd64.digest.clone()],
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(resolved[0].digest, amd64.digest);
        assert!(resolved[0].platform.is_some());
    }

    #[tokio::test]
    async fn test_fails_fast_on_missing_source() {
        let store = MemoryStore::new();
        seed_image(&store, "valid1", "linux", "amd64");
        seed_image(&store, "valid2", "linux", "arm64");

        let err = resolve_manifests(
            &store,
            &refs(&["valid1", "missing", "valid2"]),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        match err {
            IndexError::ReferenceResolution { reference, source } => {
                assert_eq!(reference, "missing");
                assert!(source.is_not_found());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.stats().fetched_references, refs(&["valid1", "missing"]));
    }

    #[tokio::test]
    async fn test_non_manifest_sources_pass_through() {
        let store = MemoryStore::new();
        let nested = store.insert_tagged(
            MEDIA_TYPE_IMAGE_INDEX,
            br#"{"schemaVersion":2,"mediaType":"application/vnd.oci.image.index.v1+json","manifests":[]}"#,
            "nested",
        );
        let blob = store.insert_tagged("application/vnd.example.sbom", b"sbom", "sbom");

        let resolved = resolve_manifests(&store, &refs(&["nested", "sbom"]), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(resolved, vec![nested, blob]);
        assert!(store.stats().fetched_blobs.is_empty());
    }

    #[tokio::test]
    async fn test_platform_failure_aborts() {
        let store = MemoryStore::new();
        seed_image(&store, "good", "linux", "amd64");
        store.insert_tagged(MEDIA_TYPE_IMAGE_MANIFEST, b"garbage", "bad");

        let err = resolve_manifests(&store, &refs(&["good", "bad"]), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::ManifestDecode { .. }));
    }

    #[tokio::test]
    async fn test_cancelled_before_first_fetch() {
        let store = MemoryStore::new();
        seed_image(&store, "a", "linux", "amd64");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = resolve_manifests(&store, &refs(&["a"]), &cancel).await.unwrap_err();
        assert!(matches!(err, IndexError::Cancelled));
        assert!(store.stats().fetched_references.is_empty());
    }

    #[tokio::test]
    async fn test_empty_sources() {
        let store = MemoryStore::new();
        let resolved = resolve_manifests(&store, &[], &CancellationToken::new())
            .await
            .unwrap();
        assert!(resolved.is_empty());
    }
}
