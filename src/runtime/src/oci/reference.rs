//! Reference parsing for registry and image-layout targets.
//!
//! Parses references like `ghcr.io/a3s-lab/hello:v1` into structured
//! components, and target arguments like `ghcr.io/a3s-lab/hello:v1,v2,v3`
//! into a primary reference plus extra tags.

use a3s_index_core::{parse_digest, IndexError, Result};

/// Default registry when none is specified.
const DEFAULT_REGISTRY: &str = "docker.io";

/// Parsed registry reference.
///
/// Unlike image pulls, an absent tag is meaningful here (an untagged push),
/// so no default tag is filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// Registry hostname (e.g., "ghcr.io", "docker.io")
    pub registry: String,
    /// Repository path (e.g., "library/nginx", "a3s-lab/hello")
    pub repository: String,
    /// Tag (e.g., "latest", "v0.1.0")
    pub tag: Option<String>,
    /// Digest (e.g., "sha256:abc123...")
    pub digest: Option<String>,
}

impl ImageReference {
    /// Parse a registry reference string.
    ///
    /// Supports formats:
    /// - `nginx` → docker.io/library/nginx
    /// - `nginx:1.25` → docker.io/library/nginx:1.25
    /// - `ghcr.io/org/image:tag` → ghcr.io/org/image:tag
    /// - `ghcr.io/org/image@sha256:abc...` → ghcr.io/org/image@sha256:abc...
    /// - `localhost:5000/image` → localhost:5000/image
    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(IndexError::InvalidReference("empty reference".to_string()));
        }

        // Split off digest first (@ separator)
        let (name_tag, digest) = match reference.rfind('@') {
            Some(at_pos) => {
                let digest = &reference[at_pos + 1..];
                parse_digest(digest).map_err(|e| {
                    IndexError::InvalidReference(format!("'{}': {}", reference, e))
                })?;
                (&reference[..at_pos], Some(digest.to_string()))
            }
            None => (reference, None),
        };

        let (name, tag) = split_tag(name_tag);
        if let Some(ref tag) = tag {
            validate_tag(tag).map_err(|e| {
                IndexError::InvalidReference(format!("'{}': {}", reference, e))
            })?;
        }
        let (registry, repository) = Self::split_registry_repository(name)?;

        Ok(ImageReference {
            registry,
            repository,
            tag,
            digest,
        })
    }

    /// Split a name into registry and repository components.
    fn split_registry_repository(name: &str) -> Result<(String, String)> {
        // The first component is a registry host if it contains a dot or
        // colon, or is "localhost"
        if let Some(slash_pos) = name.find('/') {
            let first = &name[..slash_pos];
            if first.contains('.') || first.contains(':') || first == "localhost" {
                let repo = &name[slash_pos + 1..];
                if repo.is_empty() {
                    return Err(IndexError::InvalidReference(format!(
                        "empty repository in '{}'",
                        name
                    )));
                }
                return Ok((first.to_string(), repo.to_string()));
            }
        }

        let repository = if name.contains('/') {
            name.to_string()
        } else {
            // Single name like "nginx" → "library/nginx" for Docker Hub
            format!("library/{}", name)
        };

        Ok((DEFAULT_REGISTRY.to_string(), repository))
    }

    /// The store-relative reference: digest if present, else tag.
    pub fn store_reference(&self) -> Option<&str> {
        self.digest.as_deref().or(self.tag.as_deref())
    }

    /// Repository name without tag or digest.
    pub fn name(&self) -> String {
        format!("{}/{}", self.registry, self.repository)
    }

    /// Get the full reference string.
    pub fn full_reference(&self) -> String {
        let mut s = self.name();
        if let Some(ref tag) = self.tag {
            s.push(':');
            s.push_str(tag);
        }
        if let Some(ref digest) = self.digest {
            s.push('@');
            s.push_str(digest);
        }
        s
    }
}

impl std::fmt::Display for ImageReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.full_reference())
    }
}

/// Image-layout reference: `<dir>[:<tag>]` or `<dir>@<digest>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutReference {
    /// Layout directory
    pub path: String,
    /// Tag or digest inside the layout
    pub reference: Option<String>,
}

impl LayoutReference {
    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(IndexError::InvalidReference("empty layout path".to_string()));
        }

        if let Some(at_pos) = reference.rfind('@') {
            let digest = &reference[at_pos + 1..];
            parse_digest(digest)
                .map_err(|e| IndexError::InvalidReference(format!("'{}': {}", reference, e)))?;
            return Ok(Self {
                path: reference[..at_pos].to_string(),
                reference: Some(digest.to_string()),
            });
        }

        let (path, tag) = split_tag(reference);
        if let Some(ref tag) = tag {
            validate_tag(tag)
                .map_err(|e| IndexError::InvalidReference(format!("'{}': {}", reference, e)))?;
        }
        Ok(Self {
            path: path.to_string(),
            reference: tag,
        })
    }
}

/// Split a `<target>[,<tag>...]` argument into the primary reference and extra tags.
///
/// Empty entries (as in `repo:v1,,v2`) are an error.
pub fn split_extra_tags(raw: &str) -> Result<(String, Vec<String>)> {
    let mut parts = raw.split(',').map(str::trim);
    let primary = parts.next().unwrap_or_default().to_string();

    let mut extra = Vec::new();
    for part in parts {
        if part.is_empty() {
            return Err(IndexError::InvalidReference(format!(
                "empty tag in '{}'",
                raw
            )));
        }
        validate_tag(part)
            .map_err(|e| IndexError::InvalidReference(format!("'{}': {}", raw, e)))?;
        extra.push(part.to_string());
    }
    Ok((primary, extra))
}

/// Split `name[:tag]` on the last colon after the last slash.
fn split_tag(name_tag: &str) -> (&str, Option<String>) {
    let search_from = name_tag.rfind('/').map(|p| p + 1).unwrap_or(0);
    match name_tag[search_from..].rfind(':') {
        Some(colon) => {
            let colon = search_from + colon;
            let after = &name_tag[colon + 1..];
            // A bare `host:port` is not a tag
            if search_from == 0 && !after.is_empty() && after.chars().all(|c| c.is_ascii_digit())
            {
                (name_tag, None)
            } else {
                (&name_tag[..colon], Some(after.to_string()))
            }
        }
        None => (name_tag, None),
    }
}

/// Tags follow the distribution grammar: `[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}`.
fn validate_tag(tag: &str) -> std::result::Result<(), String> {
    let mut chars = tag.chars();
    let first = chars.next().ok_or_else(|| "empty tag".to_string())?;
    if tag.len() > 128 {
        return Err(format!("tag '{}' is longer than 128 characters", tag));
    }
    if !(first.is_ascii_alphanumeric() || first == '_') {
        return Err(format!("tag '{}' must start with a letter, digit or '_'", tag));
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-') {
        return Err(format!("tag '{}' contains invalid characters", tag));
    }
    Ok(())
}

/// Returns true if `reference` is a valid tag for use as an extra reference.
pub fn is_valid_tag(reference: &str) -> bool {
    validate_tag(reference).is_ok()
}
