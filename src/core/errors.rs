// Error types for the annotation service
//
// One thiserror enum per layer:
// - AnnotateError: decoding, drawing and encoding an image, plus the sink write
// - DetectionError: invalid detector parameters and OpenCV failures
// - StorageError: blob sink failures
// - ConfigError: environment parsing and validation

use thiserror::Error;

/// Annotation errors (decode, input, encode, sink)
#[derive(Debug, Error)]
pub enum AnnotateError {
    #[error("Failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to encode annotated image: {0}")]
    Encode(#[source] image::ImageError),

    #[error("Line detection failed: {0}")]
    Detection(#[from] DetectionError),

    #[error("Failed to store annotated image: {0}")]
    Sink(#[from] StorageError),

    #[error("Annotation task failed: {0}")]
    TaskJoin(String),
}

/// Line detection errors
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("Invalid detection parameters: {0}")]
    InvalidParameters(String),

    #[error("Unsupported Sobel aperture size {0} (expected 3, 5 or 7)")]
    UnsupportedAperture(i32),

    #[error("OpenCV error: {0}")]
    OpenCv(#[from] opencv::Error),
}

/// Blob storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid storage connection string: {0}")]
    InvalidConnectionString(String),

    #[error("Storage connection string is missing `{0}`")]
    MissingSetting(&'static str),

    #[error("Storage account key is not valid base64: {0}")]
    InvalidAccountKey(#[from] base64::DecodeError),

    #[error("Storage request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Storage rejected upload of {key} (HTTP {status}): {body}")]
    Rejected {
        key: String,
        status: u16,
        body: String,
    },

    #[error("Failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("AzureWebJobsStorage must be set when STORAGE_BACKEND=azure")]
    MissingConnectionString,

    #[error("Unknown storage backend: {0} (expected azure, local or memory)")]
    UnknownStorageBackend(String),

    #[error("Invalid detection config: {0}")]
    InvalidDetectionConfig(#[from] DetectionError),

    #[error("Invalid rendering config: {0}")]
    InvalidRenderingConfig(String),

    #[error("Invalid output config: {0}")]
    InvalidOutputConfig(String),

    #[error("Environment variable {name} has invalid value {value:?}")]
    EnvVarError { name: &'static str, value: String },
}

pub type AnnotateResult<T> = Result<T, AnnotateError>;
pub type DetectionResult<T> = Result<T, DetectionError>;
pub type StorageResult<T> = Result<T, StorageError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
