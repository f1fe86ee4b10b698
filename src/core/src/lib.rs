//! A3S Index Core - Foundational Types
//!
//! OCI data model (descriptors, manifests, indexes), error types and
//! configuration shared by the runtime and the CLI.

pub mod config;
pub mod descriptor;
pub mod error;
pub mod manifest;

// Re-export commonly used types
pub use config::{IndexConfig, LogLevel, RegistryConfig};
pub use descriptor::{is_digest, parse_digest, sha256_digest, Descriptor, Platform};
pub use error::{IndexError, Result, StoreError};
pub use manifest::{ImageIndex, ImageManifest};

/// A3S Index version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
