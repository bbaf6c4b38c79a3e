pub mod config;
pub mod errors;
pub mod types;

// Re-export commonly used items for convenience
pub use config::{Config, StorageBackend};
pub use errors::{AnnotateError, ConfigError, DetectionError, StorageError};
pub use types::{
    Annotation, AnnotateRequest, BlobTriggerRequest, InvokeResponse, LineSegment, LineSet,
    RawSegment, SavedAnnotation, StatusResponse,
};
