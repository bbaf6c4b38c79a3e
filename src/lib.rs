// Library exports for the wall line annotator
//
// decode → (detect) → draw → PNG → blob storage, behind an HTTP adapter and
// an Azure Functions blob-trigger adapter

// Core modules
pub mod api;
pub mod core;
pub mod orchestration;
pub mod services;
pub mod utils;

// Re-export commonly used types and functions
pub use core::{
    config::{Config, StorageBackend},
    errors::{AnnotateError, ConfigError, DetectionError, StorageError},
    types::{Annotation, LineSegment, LineSet, RawSegment, SavedAnnotation},
};

pub use orchestration::AnnotationPipeline;

pub use services::{
    storage::build_sink, Annotator, AzureBlobSink, BlobSink, DetectionParams, LineDetector,
    LineStyle, LocalDirSink, MemorySink,
};

pub use utils::{decode_rgb, encode_png, Metrics};
