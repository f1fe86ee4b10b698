//! A3S Index Runtime - index composer engine.
//!
//! Resolves source manifests, extracts their platforms, assembles image
//! indexes and publishes them to OCI image layouts or remote registries.

#![allow(clippy::result_large_err)]

pub mod oci;

// Re-export common types
pub use oci::{Composed, CreateRequest, IndexComposer, UpdateRequest};
pub use oci::{ImageReference, LayoutReference, LayoutStore, MemoryStore, RegistryAuth, RegistryStore};
pub use oci::{PublishFailure, Store, StoreResult, TagFailure};

/// A3S Index Runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
