//! Opening the store a command operates on.

use std::path::Path;

use a3s_index_core::{is_digest, IndexConfig, IndexError};
use a3s_index_runtime::oci::is_valid_tag;
use a3s_index_runtime::{
    ImageReference, LayoutReference, LayoutStore, RegistryAuth, RegistryStore, Store,
};
use clap::Args;

/// Where the index lives.
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Treat the target as an OCI image layout directory
    #[arg(long)]
    pub oci_layout: bool,

    /// Talk to the registry over plain HTTP
    #[arg(long)]
    pub plain_http: bool,
}

/// A parsed target argument together with its store.
pub struct Target {
    /// Store holding the target repository
    pub store: Box<dyn Store>,
    /// Repository name or layout directory, for display
    pub name: String,
    /// Tag or digest given with the target, if any
    pub reference: Option<String>,
    /// Extra tags given after commas
    pub extra_tags: Vec<String>,
}

impl Target {
    /// Parse `raw` (`<name>[:<tag>][,<tag>...]`) and open its store.
    pub fn open(raw: &str, args: &TargetArgs, config: &IndexConfig) -> Result<Self, IndexError> {
        let (primary, extra_tags) = a3s_index_runtime::oci::split_extra_tags(raw)?;

        if args.oci_layout {
            let layout = LayoutReference::parse(&primary)?;
            tracing::debug!(path = %layout.path, "Opening image layout");
            let store = LayoutStore::open(Path::new(&layout.path)).map_err(|e| {
                IndexError::Config(format!("cannot open layout '{}': {}", layout.path, e))
            })?;
            return Ok(Self {
                store: Box::new(store),
                name: layout.path,
                reference: layout.reference,
                extra_tags,
            });
        }

        let image = ImageReference::parse(&primary)?;
        tracing::debug!(reference = %image, extra_tags = ?extra_tags, "Opening registry target");
        let mut registry = config.registry.clone();
        registry.plain_http |= args.plain_http;
        let auth = RegistryAuth::from_config(&registry);
        let store = RegistryStore::new(&image, &registry, auth);

        Ok(Self {
            store: Box::new(store),
            name: image.name(),
            reference: image.store_reference().map(str::to_string),
            extra_tags,
        })
    }

    /// The reference as `name:tag` or `name@digest`.
    pub fn display(&self, reference: &str) -> String {
        if is_digest(reference) {
            format!("{}@{}", self.name, reference)
        } else {
            format!("{}:{}", self.name, reference)
        }
    }
}

/// Check that a source argument is a tag or digest inside the target repository.
pub fn validate_source(source: &str) -> Result<(), IndexError> {
    if is_digest(source) || is_valid_tag(source) {
        Ok(())
    } else {
        Err(IndexError::InvalidReference(format!(
            "'{}' is neither a tag nor a digest",
            source
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use a3s_index_core::sha256_digest;

    fn layout_args() -> TargetArgs {
        TargetArgs {
            oci_layout: true,
            ..TargetArgs::default()
        }
    }

    #[test]
    fn test_open_layout_with_extra_tags() {
        let tmp = tempfile::TempDir::new().unwrap();
        let raw = format!("{}:v1,v2,latest", tmp.path().display());

        let target = Target::open(&raw, &layout_args(), &IndexConfig::default()).unwrap();

        assert_eq!(target.name, tmp.path().display().to_string());
        assert_eq!(target.reference.as_deref(), Some("v1"));
        assert_eq!(target.extra_tags, vec!["v2", "latest"]);
        assert!(tmp.path().join("oci-layout").exists());
    }

    #[test]
    fn test_open_registry_target() {
        let target = Target::open(
            "localhost:5000/hello:v1,v2",
            &TargetArgs::default(),
            &IndexConfig::default(),
        )
        .unwrap();

        assert_eq!(target.name, "localhost:5000/hello");
        assert_eq!(target.reference.as_deref(), Some("v1"));
        assert_eq!(target.extra_tags, vec!["v2"]);
        assert_eq!(target.display("v2"), "localhost:5000/hello:v2");
    }

    #[test]
    fn test_open_rejects_empty_extra_tag() {
        let err = Target::open(
            "ghcr.io/a3s-lab/hello:v1,,v2",
            &TargetArgs::default(),
            &IndexConfig::default(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, IndexError::InvalidReference(_)));
    }

    #[test]
    fn test_validate_source() {
        assert!(validate_source("linux-amd64").is_ok());
        assert!(validate_source(&sha256_digest(b"x")).is_ok());
        assert!(validate_source("ghcr.io/org/image:tag").is_err());
        assert!(validate_source("").is_err());
    }
}
