//! OCI manifest and image index documents.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::descriptor::Descriptor;

pub const MEDIA_TYPE_IMAGE_INDEX: &str = "application/vnd.oci.image.index.v1+json";
pub const MEDIA_TYPE_IMAGE_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
pub const MEDIA_TYPE_IMAGE_CONFIG: &str = "application/vnd.oci.image.config.v1+json";

pub const DOCKER_MEDIA_TYPE_MANIFEST: &str =
    "application/vnd.docker.distribution.manifest.v2+json";
pub const DOCKER_MEDIA_TYPE_MANIFEST_LIST: &str =
    "application/vnd.docker.distribution.manifest.list.v2+json";

/// Annotation carrying a tag in an OCI image layout `index.json`.
pub const ANNOTATION_REF_NAME: &str = "org.opencontainers.image.ref.name";

/// Schema version stamped on every index this crate writes.
pub const INDEX_SCHEMA_VERSION: u32 = 2;

/// Returns true for single-platform image manifests (OCI or Docker schema 2).
pub fn is_image_manifest(media_type: &str) -> bool {
    media_type == MEDIA_TYPE_IMAGE_MANIFEST || media_type == DOCKER_MEDIA_TYPE_MANIFEST
}

/// Returns true for multi-platform indexes (OCI index or Docker manifest list).
pub fn is_index(media_type: &str) -> bool {
    media_type == MEDIA_TYPE_IMAGE_INDEX || media_type == DOCKER_MEDIA_TYPE_MANIFEST_LIST
}

/// Returns true for content a store tracks as a manifest rather than a plain blob.
pub fn is_manifest_like(media_type: &str) -> bool {
    is_image_manifest(media_type) || is_index(media_type)
}

/// Work out the media type of a manifest body that was fetched without one.
///
/// Uses the embedded `mediaType` field when present, otherwise guesses from
/// the document shape (`manifests` → index, `config` → image manifest).
pub fn detect_media_type(bytes: &[u8]) -> Option<String> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Probe {
        media_type: Option<String>,
        manifests: Option<serde_json::Value>,
        config: Option<serde_json::Value>,
    }

    let probe: Probe = serde_json::from_slice(bytes).ok()?;
    match probe {
        Probe {
            media_type: Some(media_type),
            ..
        } => Some(media_type),
        Probe {
            manifests: Some(_), ..
        } => Some(MEDIA_TYPE_IMAGE_INDEX.to_string()),
        Probe { config: Some(_), .. } => Some(MEDIA_TYPE_IMAGE_MANIFEST.to_string()),
        _ => None,
    }
}

/// Image manifest, decoded leniently: only `config` is required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageManifest {
    #[serde(default)]
    pub schema_version: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_type: Option<String>,

    pub config: Descriptor,

    #[serde(default)]
    pub layers: Vec<Descriptor>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<Descriptor>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
}

/// Image index: an ordered list of manifest descriptors.
///
/// `manifests` order is significant and is never re-sorted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageIndex {
    pub schema_version: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_type: Option<String>,

    #[serde(default)]
    pub manifests: Vec<Descriptor>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<Descriptor>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
}

impl Default for ImageIndex {
    fn default() -> Self {
        Self {
            schema_version: INDEX_SCHEMA_VERSION,
            media_type: Some(MEDIA_TYPE_IMAGE_INDEX.to_string()),
            artifact_type: None,
            manifests: Vec::new(),
            subject: None,
            annotations: None,
        }
    }
}
