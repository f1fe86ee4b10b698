//! OCI image index composition.
//!
//! Composes image indexes out of existing manifests and publishes them
//! through a content store. It supports:
//!
//! - Source resolution by tag or digest, in input order
//! - Platform extraction from image configs
//! - Canonical index assembly
//! - Publishing under any number of tags with a single push
//!
//! # Architecture
//!
//! ```text
//! sources ──► resolve ──► platform ──► assemble ──► publish ──► store
//!                │                                     │
//!                └──────────── Store (trait) ◄─────────┘
//!                      memory │ layout │ registry
//! ```

mod assemble;
mod compose;
mod layout;
mod memory;
mod platform;
mod publish;
pub mod reference;
mod registry;
mod resolve;
pub mod store;

pub use assemble::{pack_index, PackedIndex};
pub use compose::{Composed, CreateRequest, IndexComposer, UpdateRequest};
pub use layout::LayoutStore;
pub use memory::{MemoryStats, MemoryStore};
pub use platform::extract_platform;
pub use publish::{collect_references, publish_index};
pub use reference::{is_valid_tag, split_extra_tags, ImageReference, LayoutReference};
pub use registry::{RegistryAuth, RegistryStore};
pub use resolve::{fetch_source, resolve_manifests, ResolvedSource};
pub use store::{PublishFailure, Store, StoreResult, TagFailure};
