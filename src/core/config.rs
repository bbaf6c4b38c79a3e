use crate::core::errors::ConfigError;
use crate::services::detection::{
    CannyParams, DetectionParams, HoughParams, CANNY_APERTURE_SIZE, CANNY_HIGH_THRESHOLD,
    CANNY_LOW_THRESHOLD, HOUGH_MAX_LINE_GAP, HOUGH_MIN_LINE_LENGTH, HOUGH_RHO, HOUGH_THETA,
    HOUGH_THRESHOLD,
};
use crate::services::rendering::{LineStyle, LINE_COLOR, LINE_THICKNESS};
use std::env;
use std::fmt;
use std::str::FromStr;
use tracing::Level;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub log_level: Level,
    pub max_body_bytes: usize,
}

/// Where annotated images go
#[derive(Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// Azure Blob Storage via connection string
    Azure { connection_string: String },
    /// Files under a local directory
    Local { root: String },
    /// Process memory (tests and dry runs)
    Memory,
}

impl fmt::Debug for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Azure { .. } => f.write_str("Azure { connection_string: <redacted> }"),
            Self::Local { root } => f.debug_struct("Local").field("root", root).finish(),
            Self::Memory => f.write_str("Memory"),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Container annotated images are written to
    pub output_container: String,
    /// Prefix prepended to the source name to form the output key
    pub output_prefix: String,
}

/// Trigger adapter configuration
#[derive(Debug, Clone)]
pub struct TriggerConfig {
    /// Name used for images posted over HTTP without an explicit name
    pub default_blob_name: String,
    /// Ignore blob events for names that already carry the output prefix
    pub skip_annotated_blobs: bool,
}

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub trigger: TriggerConfig,
    pub detection: DetectionParams,
    pub style: LineStyle,
}

/// Read and parse an optional environment variable.
fn env_parse<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::EnvVarError { name, value }),
        _ => Ok(None),
    }
}

fn env_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    Ok(env_parse(name)?.unwrap_or(default))
}

fn env_string(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

impl Config {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let config = Self::load_from_env()?;
        config.validate()?;
        Ok(config)
    }

    fn load_from_env() -> Result<Self, ConfigError> {
        // Parse log level
        let log_level = env::var("LOG_LEVEL")
            .ok()
            .and_then(|s| match s.to_lowercase().as_str() {
                "trace" => Some(Level::TRACE),
                "debug" => Some(Level::DEBUG),
                "info" => Some(Level::INFO),
                "warn" | "warning" => Some(Level::WARN),
                "error" => Some(Level::ERROR),
                _ => None,
            })
            .unwrap_or(Level::INFO);

        // The Functions host tells a custom handler which port to listen on
        let port = match env_parse::<u16>("FUNCTIONS_CUSTOMHANDLER_PORT")? {
            Some(port) => port,
            None => env_or("SERVER_PORT", 7071)?,
        };

        let backend = match env_string("STORAGE_BACKEND", "azure").to_lowercase().as_str() {
            "azure" => StorageBackend::Azure {
                connection_string: env::var("AzureWebJobsStorage")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .ok_or(ConfigError::MissingConnectionString)?,
            },
            "local" => StorageBackend::Local {
                root: env_string("LOCAL_OUTPUT_DIR", "output"),
            },
            "memory" => StorageBackend::Memory,
            other => return Err(ConfigError::UnknownStorageBackend(other.to_string())),
        };

        Ok(Self {
            server: ServerConfig {
                port,
                host: env_string("SERVER_HOST", "0.0.0.0"),
                log_level,
                max_body_bytes: env_or("MAX_BODY_BYTES", 50 * 1024 * 1024)?,
            },
            storage: StorageConfig {
                backend,
                output_container: env_string("OUTPUT_CONTAINER", "pdf-images"),
                output_prefix: env_string("OUTPUT_PREFIX", "annotated_"),
            },
            trigger: TriggerConfig {
                default_blob_name: env_string("DEFAULT_BLOB_NAME", "from_http_request.png"),
                skip_annotated_blobs: env_or("SKIP_ANNOTATED_BLOBS", true)?,
            },
            detection: DetectionParams {
                canny: CannyParams {
                    low_threshold: env_or("CANNY_LOW_THRESHOLD", CANNY_LOW_THRESHOLD)?,
                    high_threshold: env_or("CANNY_HIGH_THRESHOLD", CANNY_HIGH_THRESHOLD)?,
                    aperture_size: env_or("CANNY_APERTURE_SIZE", CANNY_APERTURE_SIZE)?,
                },
                hough: HoughParams {
                    rho: HOUGH_RHO,
                    theta: HOUGH_THETA,
                    threshold: env_or("HOUGH_THRESHOLD", HOUGH_THRESHOLD)?,
                    min_line_length: env_or("HOUGH_MIN_LINE_LENGTH", HOUGH_MIN_LINE_LENGTH)?,
                    max_line_gap: env_or("HOUGH_MAX_LINE_GAP", HOUGH_MAX_LINE_GAP)?,
                },
            },
            style: LineStyle {
                color: LINE_COLOR,
                thickness: env_or("LINE_THICKNESS", LINE_THICKNESS)?,
            },
        })
    }

    /// Configuration for tests and local tools: in-memory storage, default detection.
    pub fn in_memory() -> Self {
        Self {
            server: ServerConfig {
                port: 7071,
                host: "127.0.0.1".to_string(),
                log_level: Level::INFO,
                max_body_bytes: 50 * 1024 * 1024,
            },
            storage: StorageConfig {
                backend: StorageBackend::Memory,
                output_container: "pdf-images".to_string(),
                output_prefix: "annotated_".to_string(),
            },
            trigger: TriggerConfig {
                default_blob_name: "from_http_request.png".to_string(),
                skip_annotated_blobs: true,
            },
            detection: DetectionParams::default(),
            style: LineStyle::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.detection.validate()?;

        if !(1..=50).contains(&self.style.thickness) {
            return Err(ConfigError::InvalidRenderingConfig(format!(
                "line thickness must be between 1 and 50, got {}",
                self.style.thickness
            )));
        }

        if self.storage.output_container.is_empty() {
            return Err(ConfigError::InvalidOutputConfig(
                "output container must not be empty".to_string(),
            ));
        }
        if self.storage.output_prefix.is_empty() && self.trigger.skip_annotated_blobs {
            return Err(ConfigError::InvalidOutputConfig(
                "an empty output prefix would skip every blob; disable SKIP_ANNOTATED_BLOBS".to_string(),
            ));
        }

        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::InvalidOutputConfig(
                "MAX_BODY_BYTES must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn server_port(&self) -> u16 {
        self.server.port
    }

    pub fn server_host(&self) -> &str {
        &self.server.host
    }

    pub fn log_level(&self) -> Level {
        self.server.log_level
    }

    pub fn output_container(&self) -> &str {
        &self.storage.output_container
    }

    pub fn output_prefix(&self) -> &str {
        &self.storage.output_prefix
    }
}

// Note: No Default implementation because Config::new() can fail
// Use Config::in_memory() when no environment is wanted
