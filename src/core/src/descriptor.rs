//! Content descriptors, platforms and digests.
//!
//! Field order mirrors the OCI image-spec JSON layout. All string maps are
//! `BTreeMap`s so that serialization is canonical: the same value always
//! encodes to the same bytes, and therefore the same digest.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use crate::error::StoreError;

/// The only digest algorithm accepted by the stores.
pub const SHA256: &str = "sha256";

/// Compute the `sha256:<hex>` digest of `bytes`.
pub fn sha256_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{}:{}", SHA256, hex::encode(hasher.finalize()))
}

/// Split a digest into `(algorithm, encoded)` after checking its format.
pub fn parse_digest(digest: &str) -> std::result::Result<(&str, &str), StoreError> {
    let (algorithm, encoded) = digest
        .split_once(':')
        .ok_or_else(|| StoreError::InvalidDigest(digest.to_string()))?;

    if algorithm != SHA256 {
        return Err(StoreError::InvalidDigest(format!(
            "{}: unsupported algorithm '{}'",
            digest, algorithm
        )));
    }
    if encoded.len() != 64
        || !encoded
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
    {
        return Err(StoreError::InvalidDigest(format!(
            "{}: expected 64 lowercase hex characters",
            digest
        )));
    }

    Ok((algorithm, encoded))
}

/// Returns true if `reference` is a well-formed digest rather than a tag.
pub fn is_digest(reference: &str) -> bool {
    parse_digest(reference).is_ok()
}

/// Target platform of an image manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    #[serde(default)]
    pub architecture: String,

    #[serde(default)]
    pub os: String,

    #[serde(rename = "os.version", default, skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,

    #[serde(rename = "os.features", default, skip_serializing_if = "Option::is_none")]
    pub os_features: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<String>>,
}

impl Platform {
    pub fn new(os: impl Into<String>, architecture: impl Into<String>) -> Self {
        Self {
            architecture: architecture.into(),
            os: os.into(),
            os_version: None,
            os_features: None,
            variant: None,
            features: None,
        }
    }

    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.architecture)?;
        if let Some(ref variant) = self.variant {
            write!(f, "/{}", variant)?;
        }
        Ok(())
    }
}

/// Content-addressed pointer to a byte sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    pub media_type: String,

    pub digest: String,

    pub size: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urls: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,

    /// Base64-encoded embedded content, kept verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_type: Option<String>,
}

impl Descriptor {
    pub fn new(media_type: impl Into<String>, digest: impl Into<String>, size: u64) -> Self {
        Self {
            media_type: media_type.into(),
            digest: digest.into(),
            size,
            urls: None,
            annotations: None,
            data: None,
            platform: None,
            artifact_type: None,
        }
    }

    /// Describe `bytes` exactly: sha256 digest and byte length.
    pub fn from_bytes(media_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self::new(media_type, sha256_digest(bytes), bytes.len() as u64)
    }

    /// A copy of this descriptor with `platform` attached.
    pub fn with_platform(&self, platform: Platform) -> Self {
        Self {
            platform: Some(platform),
            ..self.clone()
        }
    }

    /// A copy of this descriptor with an annotation added.
    pub fn with_annotation(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut annotations = self.annotations.clone().unwrap_or_default();
        annotations.insert(key.into(), value.into());
        Self {
            annotations: Some(annotations),
            ..self.clone()
        }
    }

    /// Check that `bytes` is exactly the content this descriptor denotes.
    pub fn verify(&self, bytes: &[u8]) -> std::result::Result<(), StoreError> {
        parse_digest(&self.digest)?;

        let actual_size = bytes.len() as u64;
        if actual_size != self.size {
            return Err(StoreError::SizeMismatch {
                digest: self.digest.clone(),
                expected: self.size,
                actual: actual_size,
            });
        }

        let actual = sha256_digest(bytes);
        if actual != self.digest {
            return Err(StoreError::DigestMismatch {
                expected: self.digest.clone(),
                actual,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY_SHA256: &str =
        "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn test_sha256_digest_of_empty_input() {
        assert_eq!(sha256_digest(b""), EMPTY_SHA256);
    }

    #[test]
    fn test_parse_digest() {
        let (algorithm, encoded) = parse_digest(EMPTY_SHA256).unwrap();
        assert_eq!(algorithm, "sha256");
        assert_eq!(encoded.len(), 64);
    }

    #[test]
    fn test_parse_digest_rejects_tags_and_bad_hex() {
        assert!(parse_digest("latest").is_err());
        assert!(parse_digest("sha256:abc").is_err());
        assert!(parse_digest("md5:d41d8cd98f00b204e9800998ecf8427e").is_err());
        assert!(parse_digest(&EMPTY_SHA256.to_uppercase()).is_err());
    }

    #[test]
    fn test_is_digest() {
        assert!(is_digest(EMPTY_SHA256));
        assert!(!is_digest("v1.0"));
    }

    #[test]
    fn test_descriptor_from_bytes() {
        let desc = Descriptor::from_bytes("text/plain", b"hello");
        assert_eq!(desc.size, 5);
        assert_eq!(
            desc.digest,
            "sha256:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert!(desc.verify(b"hello").is_ok());
    }

    #[test]
    fn test_verify_detects_size_and_digest_mismatch() {
        let desc = Descriptor::from_bytes("text/plain", b"hello");
        assert!(matches!(
            desc.verify(b"hello!"),
            Err(StoreError::SizeMismatch { .. })
        ));
        assert!(matches!(
            desc.verify(b"HELLO"),
            Err(StoreError::DigestMismatch { .. })
        ));
    }

    #[test]
    fn test_with_platform_leaves_original_untouched() {
        let desc = Descriptor::from_bytes("application/vnd.oci.image.manifest.v1+json", b"{}");
        let enriched = desc.with_platform(Platform::new("linux", "amd64"));
        assert!(desc.platform.is_none());
        assert_eq!(enriched.platform, Some(Platform::new("linux", "amd64")));
        assert_eq!(enriched.digest, desc.digest);
    }

    #[test]
    fn test_descriptor_omits_unset_fields() {
        let desc = Descriptor::new("application/octet-stream", EMPTY_SHA256, 0);
        let json = serde_json::to_string(&desc).unwrap();
        assert_eq!(
            json,
            format!(
                r#"{{"mediaType":"application/octet-stream","digest":"{}","size":0}}"#,
                EMPTY_SHA256
            )
        );
    }

    #[test]
    fn test_platform_field_names() {
        let mut platform = Platform::new("windows", "amd64");
        platform.os_version = Some("10.0.17763.1040".to_string());
        let json = serde_json::to_string(&platform).unwrap();
        assert_eq!(
            json,
            r#"{"architecture":"amd64","os":"windows","os.version":"10.0.17763.1040"}"#
        );
    }

    #[test]
    fn test_platform_decodes_missing_fields_as_empty() {
        let platform: Platform = serde_json::from_str(r#"{"os":"linux","rootfs":{}}"#).unwrap();
        assert_eq!(platform, Platform::new("linux", ""));

        assert!(serde_json::from_str::<Platform>(r#"{"os":42}"#).is_err());
        assert!(serde_json::from_str::<Platform>("not json").is_err());
    }

    #[test]
    fn test_platform_display() {
        assert_eq!(Platform::new("linux", "amd64").to_string(), "linux/amd64");
        assert_eq!(
            Platform::new("linux", "arm").with_variant("v7").to_string(),
            "linux/arm/v7"
        );
    }

    #[test]
    fn test_annotations_serialize_sorted() {
        let desc = Descriptor::new("text/plain", EMPTY_SHA256, 0)
            .with_annotation("zeta", "1")
            .with_annotation("alpha", "2");
        let json = serde_json::to_string(&desc).unwrap();
        assert!(json.contains(r#""annotations":{"alpha":"2","zeta":"1"}"#));
    }
}
