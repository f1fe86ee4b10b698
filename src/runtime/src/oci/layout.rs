//! OCI image layout directory store.
//!
//! ```text
//! layout/
//! ├── oci-layout           {"imageLayoutVersion":"1.0.0"}
//! ├── index.json           manifests known to the layout, tags in
//! │                        org.opencontainers.image.ref.name
//! └── blobs/
//!     └── sha256/
//!         └── <hex>        content, named by digest
//! ```
//!
//! Blobs and `index.json` are written to a temp file and renamed into place.

use std::path::{Path, PathBuf};

use a3s_index_core::manifest::{detect_media_type, is_manifest_like, ANNOTATION_REF_NAME};
use a3s_index_core::{is_digest, parse_digest, Descriptor, ImageIndex, StoreError};
use async_trait::async_trait;
use tokio::sync::Mutex;

use super::store::{Store, StoreResult, TagFailure};

const OCI_LAYOUT_FILE: &str = "oci-layout";
const OCI_LAYOUT_CONTENT: &str = r#"{"imageLayoutVersion":"1.0.0"}"#;
const INDEX_FILE: &str = "index.json";

/// Store backed by an OCI image layout directory.
pub struct LayoutStore {
    root: PathBuf,
    /// Serializes read-modify-write cycles of `index.json`
    index_lock: Mutex<()>,
}

impl LayoutStore {
    /// Open a layout directory, creating the skeleton if it does not exist.
    pub fn open(root: &Path) -> StoreResult<Self> {
        std::fs::create_dir_all(root.join("blobs"))?;

        let layout_path = root.join(OCI_LAYOUT_FILE);
        if !layout_path.exists() {
            std::fs::write(&layout_path, OCI_LAYOUT_CONTENT)?;
        }

        let index_path = root.join(INDEX_FILE);
        if !index_path.exists() {
            let index = ImageIndex {
                media_type: None,
                ..ImageIndex::default()
            };
            std::fs::write(&index_path, serde_json::to_vec(&index)?)?;
        }

        Ok(Self {
            root: root.to_path_buf(),
            index_lock: Mutex::new(()),
        })
    }

    fn blob_path(&self, digest: &str) -> StoreResult<PathBuf> {
        let (algorithm, encoded) = parse_digest(digest)?;
        Ok(self.root.join("blobs").join(algorithm).join(encoded))
    }

    async fn load_index(&self) -> StoreResult<ImageIndex> {
        let data = tokio::fs::read(self.root.join(INDEX_FILE)).await?;
        Ok(serde_json::from_slice(&data)?)
    }

    async fn save_index(&self, index: &ImageIndex) -> StoreResult<()> {
        let data = serde_json::to_vec(index)?;
        write_atomic(&self.root.join(INDEX_FILE), &data).await
    }

    /// Read a blob and check it against `desc`.
    async fn read_blob(&self, desc: &Descriptor) -> StoreResult<Vec<u8>> {
        let path = self.blob_path(&desc.digest)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(desc.digest.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        desc.verify(&bytes)?;
        Ok(bytes)
    }

    /// Descriptor for a digest that may or may not be listed in `index.json`.
    async fn describe_digest(&self, index: &ImageIndex, digest: &str) -> StoreResult<Descriptor> {
        if let Some(entry) = index.manifests.iter().find(|d| d.digest == digest) {
            return Ok(plain(entry));
        }

        let path = self.blob_path(digest)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(digest.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let media_type =
            detect_media_type(&bytes).unwrap_or_else(|| "application/octet-stream".to_string());
        Ok(Descriptor::new(media_type, digest, bytes.len() as u64))
    }
}

/// Strip layout bookkeeping (the ref-name annotation) from an `index.json` entry.
fn plain(entry: &Descriptor) -> Descriptor {
    Descriptor {
        artifact_type: entry.artifact_type.clone(),
        ..Descriptor::new(entry.media_type.clone(), entry.digest.clone(), entry.size)
    }
}

fn ref_name(entry: &Descriptor) -> Option<&str> {
    entry
        .annotations
        .as_ref()
        .and_then(|a| a.get(ANNOTATION_REF_NAME))
        .map(|s| s.as_str())
}

async fn write_atomic(path: &Path, data: &[u8]) -> StoreResult<()> {
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, data).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait]
impl Store for LayoutStore {
    async fn fetch(&self, desc: &Descriptor) -> StoreResult<Vec<u8>> {
        self.read_blob(desc).await
    }

    async fn fetch_reference(&self, reference: &str) -> StoreResult<(Descriptor, Vec<u8>)> {
        let desc = self.resolve(reference).await?;
        let bytes = self.read_blob(&desc).await?;
        Ok((desc, bytes))
    }

    async fn push(&self, desc: &Descriptor, content: &[u8]) -> StoreResult<()> {
        desc.verify(content)?;

        let path = self.blob_path(&desc.digest)?;
        if !path.exists() {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            write_atomic(&path, content).await?;
            tracing::debug!(digest = %desc.digest, size = desc.size, "Wrote blob to layout");
        }

        if is_manifest_like(&desc.media_type) {
            let _guard = self.index_lock.lock().await;
            let mut index = self.load_index().await?;
            if !index.manifests.iter().any(|d| d.digest == desc.digest) {
                index.manifests.push(plain(desc));
                self.save_index(&index).await?;
            }
        }
        Ok(())
    }

    async fn tag(&self, desc: &Descriptor, reference: &str) -> StoreResult<()> {
        self.tag_all(desc, &[reference.to_string()])
            .await
            .map_err(|failure| failure.source)
    }

    async fn resolve(&self, reference: &str) -> StoreResult<Descriptor> {
        let index = self.load_index().await?;
        if is_digest(reference) {
            return self.describe_digest(&index, reference).await;
        }
        index
            .manifests
            .iter()
            .find(|entry| ref_name(entry) == Some(reference))
            .map(plain)
            .ok_or_else(|| StoreError::NotFound(reference.to_string()))
    }

    /// Rewrites `index.json` once for the whole batch.
    async fn tag_all(
        &self,
        desc: &Descriptor,
        references: &[String],
    ) -> std::result::Result<(), TagFailure> {
        let fail = |reference: &str, source: StoreError| TagFailure {
            reference: reference.to_string(),
            source,
        };
        let first = references.first().map(String::as_str).unwrap_or_default();

        let path = self.blob_path(&desc.digest).map_err(|e| fail(first, e))?;
        if !path.exists() {
            return Err(fail(first, StoreError::NotFound(desc.digest.clone())));
        }
        for reference in references {
            if is_digest(reference) && *reference != desc.digest {
                return Err(fail(
                    reference,
                    StoreError::DigestMismatch {
                        expected: reference.clone(),
                        actual: desc.digest.clone(),
                    },
                ));
            }
        }

        let tags: Vec<&String> = references.iter().filter(|r| !is_digest(r)).collect();
        if tags.is_empty() {
            return Ok(());
        }

        let _guard = self.index_lock.lock().await;
        let mut index = self.load_index().await.map_err(|e| fail(first, e))?;
        index.manifests.retain(|entry| match ref_name(entry) {
            Some(name) => !tags.iter().any(|t| t.as_str() == name),
            None => entry.digest != desc.digest,
        });
        for tag in &tags {
            index
                .manifests
                .push(plain(desc).with_annotation(ANNOTATION_REF_NAME, tag.as_str()));
        }
        self.save_index(&index).await.map_err(|e| fail(first, e))?;

        tracing::debug!(digest = %desc.digest, tags = tags.len(), "Tagged layout content");
        Ok(())
    }
}
