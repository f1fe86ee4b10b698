//! Platform extraction from image manifests.
//!
//! An index entry for an image manifest carries the platform of the image.
//! The platform lives in the image config blob, so extraction reads the
//! manifest, fetches its config and decodes the `os`/`architecture` fields.

use a3s_index_core::{Descriptor, ImageManifest, IndexError, Platform, Result};

use super::store::Store;

/// Return a copy of `desc` with its platform attached.
///
/// The config is always fetched and decoded, whatever its media type. Fields
/// missing from the config decode as empty strings.
pub async fn extract_platform<S: Store + ?Sized>(
    store: &S,
    desc: &Descriptor,
    manifest_bytes: &[u8],
) -> Result<Descriptor> {
    let manifest: ImageManifest =
        serde_json::from_slice(manifest_bytes).map_err(|e| IndexError::ManifestDecode {
            digest: desc.digest.clone(),
            message: e.to_string(),
        })?;

    let config = store
        .fetch(&manifest.config)
        .await
        .map_err(|source| IndexError::ContentUnavailable {
            digest: manifest.config.digest.clone(),
            source,
        })?;

    let platform: Platform =
        serde_json::from_slice(&config).map_err(|e| IndexError::PlatformDecode {
            digest: manifest.config.digest.clone(),
            message: e.to_string(),
        })?;

    tracing::debug!(digest = %desc.digest, platform = %platform, "Extracted platform");
    Ok(desc.with_platform(platform))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oci::memory::MemoryStore;
    use a3s_index_core::manifest::{MEDIA_TYPE_IMAGE_CONFIG, MEDIA_TYPE_IMAGE_MANIFEST};

    fn manifest_for(config: &Descriptor) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "schemaVersion": 2,
            "mediaType": MEDIA_TYPE_IMAGE_MANIFEST,
            "config": config,
            "layers": []
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_extracts_linux_amd64() {
        let store = MemoryStore::new();
        let config = store.insert(
            MEDIA_TYPE_IMAGE_CONFIG,
            br#"{"architecture":"amd64","os":"linux","rootfs":{"type":"layers","diff_ids":[]}}"#,
        );
        let body = manifest_for(&config);
        let desc = store.insert(MEDIA_TYPE_IMAGE_MANIFEST, &body);

        let enriched = extract_platform(&store, &desc, &body).await.unwrap();

        assert_eq!(enriched.platform, Some(Platform::new("linux", "amd64")));
        assert_eq!(enriched.digest, desc.digest);
        assert_eq!(enriched.size, desc.size);
    }

    #[tokio::test]
    async fn test_extracts_variant_and_os_version() {
        let store = MemoryStore::new();
        let config = store.insert(
            MEDIA_TYPE_IMAGE_CONFIG,
            br#"{"architecture":"arm64","os":"linux","variant":"v8","os.version":"6.1"}"#,
        );
        let body = manifest_for(&config);
        let desc = store.insert(MEDIA_TYPE_IMAGE_MANIFEST, &body);

        let platform = extract_platform(&store, &desc, &body)
            .await
            .unwrap()
            .platform
            .unwrap();
        assert_eq!(platform.variant.as_deref(), Some("v8"));
        assert_eq!(platform.os_version.as_deref(), Some("6.1"));
    }

    #[tokio::test]
    async fn test_malformed_manifest() {
        let store = MemoryStore::new();
        let desc = store.insert(MEDIA_TYPE_IMAGE_MANIFEST, b"{not json");

        let err = extract_platform(&store, &desc, b"{not json").await.unwrap_err();
        match err {
            IndexError::ManifestDecode { digest, .. } => assert_eq!(digest, desc.digest),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_config_blob() {
        let store = MemoryStore::new();
        let config = Descriptor::from_bytes(MEDIA_TYPE_IMAGE_CONFIG, br#"{"os":"linux"}"#);
        let body = manifest_for(&config);
        let desc = store.insert(MEDIA_TYPE_IMAGE_MANIFEST, &body);

        let err = extract_platform(&store, &desc, &body).await.unwrap_err();
        match err {
            IndexError::ContentUnavailable { digest, source } => {
                assert_eq!(digest, config.digest);
                assert!(source.is_not_found());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_platform() {
        let store = MemoryStore::new();
        let config = store.insert(MEDIA_TYPE_IMAGE_CONFIG, br#"{"os": 42}"#);
        let body = manifest_for(&config);
        let desc = store.insert(MEDIA_TYPE_IMAGE_MANIFEST, &body);

        let err = extract_platform(&store, &desc, &body).await.unwrap_err();
        assert!(matches!(err, IndexError::PlatformDecode { digest, .. } if digest == config.digest));
    }

    #[tokio::test]
    async fn test_custom_config_type_still_yields_platform() {
        let store = MemoryStore::new();
        let config = store.insert(
            "application/vnd.example.config+json",
            br#"{"os":"linux","architecture":"amd64"}"#,
        );
        let body = manifest_for(&config);
        let desc = store.insert(MEDIA_TYPE_IMAGE_MANIFEST, &body);

        let enriched = extract_platform(&store, &desc, &body).await.unwrap();
        assert_eq!(enriched.platform, Some(Platform::new("linux", "amd64")));
        assert_eq!(store.stats().fetched_blobs, vec![config.digest.clone()]);
    }

    #[tokio::test]
    async fn test_missing_platform_fields_decode_empty() {
        let store = MemoryStore::new();
        let config = store.insert(MEDIA_TYPE_IMAGE_CONFIG, br#"{"os":"linux"}"#);
        let body = manifest_for(&config);
        let desc = store.insert(MEDIA_TYPE_IMAGE_MANIFEST, &body);

        let platform = extract_platform(&store, &desc, &body)
            .await
            .unwrap()
            .platform
            .unwrap();
        assert_eq!(platform, Platform::new("linux", ""));

        let empty = store.insert(MEDIA_TYPE_IMAGE_CONFIG, b"{}");
        let body = manifest_for(&empty);
        let desc = store.insert(MEDIA_TYPE_IMAGE_MANIFEST, &body);
        let platform = extract_platform(&store, &desc, &body)
            .await
            .unwrap()
            .platform
            .unwrap();
        assert_eq!(platform, Platform::new("", ""));
    }
}
