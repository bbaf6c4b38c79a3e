pub mod annotator;
pub mod detection;
pub mod rendering;
pub mod storage;

// Re-export commonly used services
pub use annotator::Annotator;
pub use detection::{DetectionParams, LineDetector};
pub use rendering::LineStyle;
pub use storage::{AzureBlobSink, BlobSink, LocalDirSink, MemorySink};
