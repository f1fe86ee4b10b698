//! Remote registry store.
//!
//! Uses the `oci-distribution` crate to talk to container registries
//! (Docker Hub, GHCR, etc.). One store is bound to one repository; store
//! references are tags or digests within it.

use std::collections::HashMap;

use a3s_index_core::manifest::{
    detect_media_type, is_manifest_like, DOCKER_MEDIA_TYPE_MANIFEST,
    DOCKER_MEDIA_TYPE_MANIFEST_LIST, MEDIA_TYPE_IMAGE_INDEX, MEDIA_TYPE_IMAGE_MANIFEST,
};
use a3s_index_core::{is_digest, Descriptor, RegistryConfig, StoreError};
use async_trait::async_trait;
use http::HeaderValue;
use oci_distribution::client::{ClientConfig, ClientProtocol};
use oci_distribution::errors::OciDistributionError;
use oci_distribution::manifest::OciDescriptor;
use oci_distribution::secrets::RegistryAuth as OciRegistryAuth;
use oci_distribution::{Client, Reference, RegistryOperation};
use parking_lot::Mutex;

use super::reference::ImageReference;
use super::store::{PublishFailure, Store, StoreResult, TagFailure};

/// Manifest media types requested when fetching by reference.
const ACCEPTED_MANIFEST_TYPES: &[&str] = &[
    MEDIA_TYPE_IMAGE_MANIFEST,
    MEDIA_TYPE_IMAGE_INDEX,
    DOCKER_MEDIA_TYPE_MANIFEST,
    DOCKER_MEDIA_TYPE_MANIFEST_LIST,
];

/// Authentication credentials for a container registry.
#[derive(Debug, Clone)]
pub struct RegistryAuth {
    username: Option<String>,
    password: Option<String>,
}

impl RegistryAuth {
    /// Create anonymous authentication (no credentials).
    pub fn anonymous() -> Self {
        Self {
            username: None,
            password: None,
        }
    }

    /// Create basic authentication with username and password.
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
        }
    }

    /// Read credentials from the env vars named in the config, falling back to anonymous.
    pub fn from_config(config: &RegistryConfig) -> Self {
        match config.credentials() {
            Some((username, password)) => Self::basic(username, password),
            None => Self::anonymous(),
        }
    }

    fn to_oci_auth(&self) -> OciRegistryAuth {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => OciRegistryAuth::Basic(u.clone(), p.clone()),
            _ => OciRegistryAuth::Anonymous,
        }
    }
}

/// Store backed by a repository in a remote registry.
pub struct RegistryStore {
    client: Client,
    auth: RegistryAuth,
    registry: String,
    repository: String,
    /// Manifest bodies pushed through this store, keyed by digest, so tagging
    /// does not need to download them again
    pushed: Mutex<HashMap<String, Vec<u8>>>,
}

impl RegistryStore {
    /// Create a store for the repository named by `target`; its tag/digest is ignored.
    pub fn new(target: &ImageReference, config: &RegistryConfig, auth: RegistryAuth) -> Self {
        let protocol = if config.plain_http {
            ClientProtocol::Http
        } else {
            ClientProtocol::HttpsExcept(config.insecure_registries.clone())
        };
        let client = Client::new(ClientConfig {
            protocol,
            ..Default::default()
        });

        Self {
            client,
            auth,
            registry: target.registry.clone(),
            repository: target.repository.clone(),
            pushed: Mutex::new(HashMap::new()),
        }
    }

    /// Build an oci-distribution reference for a tag or digest in this repository.
    fn reference(&self, reference: &str) -> Reference {
        if is_digest(reference) {
            Reference::with_digest(
                self.registry.clone(),
                self.repository.clone(),
                reference.to_string(),
            )
        } else {
            Reference::with_tag(
                self.registry.clone(),
                self.repository.clone(),
                reference.to_string(),
            )
        }
    }

    fn map_error(&self, reference: &str, action: &str, err: OciDistributionError) -> StoreError {
        match err {
            OciDistributionError::ImageManifestNotFoundError(_)
            | OciDistributionError::ServerError { code: 404, .. } => {
                StoreError::NotFound(reference.to_string())
            }
            other => StoreError::Registry {
                registry: self.registry.clone(),
                message: format!("Failed to {} {}: {}", action, reference, other),
            },
        }
    }

    async fn authenticate(&self, oci_ref: &Reference, operation: RegistryOperation) -> StoreResult<()> {
        self.client
            .auth(oci_ref, &self.auth.to_oci_auth(), operation)
            .await
            .map_err(|e| StoreError::Registry {
                registry: self.registry.clone(),
                message: format!("Authentication failed: {}", e),
            })?;
        Ok(())
    }

    async fn pull_manifest(&self, reference: &str) -> StoreResult<(Vec<u8>, String)> {
        let oci_ref = self.reference(reference);
        self.client
            .pull_manifest_raw(&oci_ref, &self.auth.to_oci_auth(), ACCEPTED_MANIFEST_TYPES)
            .await
            .map_err(|e| self.map_error(reference, "pull manifest", e))
    }

    async fn push_manifest(&self, reference: &str, media_type: &str, body: &[u8]) -> StoreResult<()> {
        let oci_ref = self.reference(reference);
        self.authenticate(&oci_ref, RegistryOperation::Push).await?;

        let content_type = HeaderValue::from_str(media_type).map_err(|e| StoreError::Registry {
            registry: self.registry.clone(),
            message: format!("Invalid media type '{}': {}", media_type, e),
        })?;
        self.client
            .push_manifest_raw(&oci_ref, body.to_vec(), content_type)
            .await
            .map_err(|e| self.map_error(reference, "push manifest", e))?;
        Ok(())
    }
}

#[async_trait]
impl Store for RegistryStore {
    async fn fetch(&self, desc: &Descriptor) -> StoreResult<Vec<u8>> {
        if is_manifest_like(&desc.media_type) {
            let (bytes, _) = self.pull_manifest(&desc.digest).await?;
            desc.verify(&bytes)?;
            return Ok(bytes);
        }

        let oci_ref = self.reference(&desc.digest);
        self.authenticate(&oci_ref, RegistryOperation::Pull).await?;

        let layer = OciDescriptor {
            media_type: desc.media_type.clone(),
            digest: desc.digest.clone(),
            size: desc.size as i64,
            ..Default::default()
        };
        let mut data: Vec<u8> = Vec::new();
        self.client
            .pull_blob(&oci_ref, &layer, &mut data)
            .await
            .map_err(|e| self.map_error(&desc.digest, "pull blob", e))?;

        tracing::debug!(digest = %desc.digest, size = data.len(), "Pulled blob");
        desc.verify(&data)?;
        Ok(data)
    }

    async fn fetch_reference(&self, reference: &str) -> StoreResult<(Descriptor, Vec<u8>)> {
        let (bytes, digest) = self.pull_manifest(reference).await?;
        let media_type =
            detect_media_type(&bytes).unwrap_or_else(|| MEDIA_TYPE_IMAGE_MANIFEST.to_string());
        let desc = Descriptor::new(media_type, digest, bytes.len() as u64);
        desc.verify(&bytes)?;

        tracing::debug!(reference, digest = %desc.digest, "Fetched manifest");
        Ok((desc, bytes))
    }

    async fn push(&self, desc: &Descriptor, content: &[u8]) -> StoreResult<()> {
        desc.verify(content)?;

        if is_manifest_like(&desc.media_type) {
            self.push_manifest(&desc.digest, &desc.media_type, content)
                .await?;
            self.pushed
                .lock()
                .insert(desc.digest.clone(), content.to_vec());
        } else {
            let oci_ref = self.reference(&desc.digest);
            self.authenticate(&oci_ref, RegistryOperation::Push).await?;
            self.client
                .push_blob(&oci_ref, content, &desc.digest)
                .await
                .map_err(|e| self.map_error(&desc.digest, "push blob", e))?;
        }

        tracing::debug!(digest = %desc.digest, size = desc.size, "Pushed content");
        Ok(())
    }

    /// Registries tag by re-putting the manifest body under the tag.
    async fn tag(&self, desc: &Descriptor, reference: &str) -> StoreResult<()> {
        let cached = self.pushed.lock().get(&desc.digest).cloned();
        let body = match cached {
            Some(body) => body,
            None => self.fetch(desc).await?,
        };
        self.push_manifest(reference, &desc.media_type, &body).await?;

        tracing::debug!(reference, digest = %desc.digest, "Tagged manifest");
        Ok(())
    }

    async fn resolve(&self, reference: &str) -> StoreResult<Descriptor> {
        let (desc, _) = self.fetch_reference(reference).await?;
        Ok(desc)
    }

    /// A manifest PUT under a tag also stores it, so tagged manifests are
    /// never pushed by digest first.
    async fn push_tagged(
        &self,
        desc: &Descriptor,
        content: &[u8],
        references: &[String],
    ) -> std::result::Result<(), PublishFailure> {
        if !is_manifest_like(&desc.media_type) {
            self.push(desc, content).await.map_err(PublishFailure::Push)?;
            return self
                .tag_all(desc, references)
                .await
                .map_err(PublishFailure::Tag);
        }

        desc.verify(content).map_err(PublishFailure::Push)?;
        for reference in manifest_puts(desc, references) {
            self.push_manifest(reference, &desc.media_type, content)
                .await
                .map_err(|source| {
                    if references.is_empty() {
                        PublishFailure::Push(source)
                    } else {
                        PublishFailure::Tag(TagFailure {
                            reference: reference.to_string(),
                            source,
                        })
                    }
                })?;
        }
        self.pushed
            .lock()
            .insert(desc.digest.clone(), content.to_vec());

        tracing::debug!(digest = %desc.digest, references = ?references, "Pushed tagged manifest");
        Ok(())
    }
}

/// Manifest PUTs needed to publish `desc`: one per reference, or a single PUT
/// by digest when there are none.
fn manifest_puts<'r>(desc: &'r Descriptor, references: &'r [String]) -> Vec<&'r str> {
    if references.is_empty() {
        vec![desc.digest.as_str()]
    } else {
        references.iter().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> RegistryStore {
        let target = ImageReference::parse("ghcr.io/a3s-lab/hello").unwrap();
        RegistryStore::new(&target, &RegistryConfig::default(), RegistryAuth::anonymous())
    }

    #[test]
    fn test_registry_auth_to_oci() {
        assert!(matches!(
            RegistryAuth::anonymous().to_oci_auth(),
            OciRegistryAuth::Anonymous
        ));
        assert!(matches!(
            RegistryAuth::basic("user", "pass").to_oci_auth(),
            OciRegistryAuth::Basic(_, _)
        ));
    }

    #[test]
    fn test_reference_with_tag() {
        let oci_ref = store().reference("v1");
        assert_eq!(oci_ref.to_string(), "ghcr.io/a3s-lab/hello:v1");
    }

    #[test]
    fn test_reference_with_digest() {
        let digest = "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
        let oci_ref = store().reference(digest);
        assert_eq!(oci_ref.digest(), Some(digest));
        assert!(oci_ref.tag().is_none());
    }

    #[test]
    fn test_map_error_not_found() {
        let err = store().map_error(
            "v1",
            "pull manifest",
            OciDistributionError::ImageManifestNotFoundError("v1".to_string()),
        );
        assert!(err.is_not_found());
    }

    #[test]
    fn test_manifest_puts_one_per_tag() {
        let desc = Descriptor::from_bytes(MEDIA_TYPE_IMAGE_INDEX, b"{}");
        let tags = vec!["v1".to_string(), "v2".to_string(), "latest".to_string()];

        assert_eq!(manifest_puts(&desc, &tags), vec!["v1", "v2", "latest"]);
        assert_eq!(manifest_puts(&desc, &[]), vec![desc.digest.as_str()]);
    }
}
