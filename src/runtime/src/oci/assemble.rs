//! Index assembly.
//!
//! Builds the index document, encodes it canonically and describes the
//! resulting bytes. No store access happens here; the descriptor only
//! becomes valid once the bytes are published.

use a3s_index_core::manifest::{INDEX_SCHEMA_VERSION, MEDIA_TYPE_IMAGE_INDEX};
use a3s_index_core::{Descriptor, ImageIndex, IndexError, Result};

/// An encoded index ready to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedIndex {
    /// The index document
    pub index: ImageIndex,
    /// Canonical encoding of `index`
    pub content: Vec<u8>,
    /// Descriptor of `content`
    pub descriptor: Descriptor,
}

/// Assemble an index from `base` metadata and `manifests`, in the given order.
///
/// `artifactType`, `subject` and `annotations` are carried over from `base`
/// exactly as set; absent fields stay absent in the output. `base.manifests`
/// is not consulted.
pub fn pack_index(base: &ImageIndex, manifests: Vec<Descriptor>) -> Result<PackedIndex> {
    let index = ImageIndex {
        schema_version: INDEX_SCHEMA_VERSION,
        media_type: Some(MEDIA_TYPE_IMAGE_INDEX.to_string()),
        artifact_type: base.artifact_type.clone(),
        manifests,
        subject: base.subject.clone(),
        annotations: base.annotations.clone(),
    };

    // Struct field order plus BTreeMap keys make this encoding canonical
    let content =
        serde_json::to_vec(&index).map_err(|e| IndexError::Serialization(e.to_string()))?;
    let descriptor = Descriptor::from_bytes(MEDIA_TYPE_IMAGE_INDEX, &content);

    Ok(PackedIndex {
        index,
        content,
        descriptor,
    })
}
