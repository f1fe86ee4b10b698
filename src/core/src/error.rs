use thiserror::Error;

/// Errors raised by a content store adapter.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No content or tag exists for the reference
    #[error("not found: {0}")]
    NotFound(String),

    /// Content with this digest is already stored
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Content bytes do not hash to the descriptor digest
    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    /// Content length does not match the descriptor size
    #[error("size mismatch for {digest}: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        digest: String,
        expected: u64,
        actual: u64,
    },

    /// Malformed or unsupported digest string
    #[error("invalid digest: {0}")]
    InvalidDigest(String),

    /// Remote registry failure
    #[error("Registry error: {registry} - {message}")]
    Registry { registry: String, message: String },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Store metadata could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Returns true if the error means the content or tag does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// A3S Index error types
#[derive(Error, Debug)]
pub enum IndexError {
    /// A source reference could not be fetched
    #[error("failed to resolve {reference}: {source}")]
    ReferenceResolution {
        reference: String,
        #[source]
        source: StoreError,
    },

    /// A manifest body is not well-formed
    #[error("failed to decode manifest {digest}: {message}")]
    ManifestDecode { digest: String, message: String },

    /// A config blob is not a well-formed platform record
    #[error("failed to decode platform from config {digest}: {message}")]
    PlatformDecode { digest: String, message: String },

    /// A blob referenced by a manifest is missing from the store
    #[error("content {digest} is unavailable: {source}")]
    ContentUnavailable {
        digest: String,
        #[source]
        source: StoreError,
    },

    /// The assembled index could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Pushing the index or tagging it failed
    #[error("failed to publish {}: {source}", .reference.as_deref().unwrap_or("index"))]
    Publish {
        reference: Option<String>,
        #[source]
        source: StoreError,
    },

    /// The operation was cancelled between steps
    #[error("operation cancelled")]
    Cancelled,

    /// A reference string could not be parsed
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    /// The content fetched for an update is not an image index
    #[error("{reference} is not an image index (media type {media_type})")]
    NotAnIndex {
        reference: String,
        media_type: String,
    },

    /// A digest requested for removal is not listed in the index
    #[error("manifest {digest} does not exist in the index")]
    ManifestNotInIndex { digest: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl IndexError {
    /// The reference this error names, if any.
    pub fn reference(&self) -> Option<&str> {
        match self {
            IndexError::ReferenceResolution { reference, .. } => Some(reference),
            IndexError::Publish { reference, .. } => reference.as_deref(),
            IndexError::NotAnIndex { reference, .. } => Some(reference),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for IndexError {
    fn from(err: serde_json::Error) -> Self {
        IndexError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for IndexError {
    fn from(err: serde_yaml::Error) -> Self {
        IndexError::Config(err.to_string())
    }
}

/// Result type alias for A3S Index operations
pub type Result<T> = std::result::Result<T, IndexError>;
