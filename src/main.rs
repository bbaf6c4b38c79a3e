// Main entry point for the wall line annotator (Functions custom handler)

use wall_annotator::{
    api::{self, AppState},
    build_sink, AnnotationPipeline, Config, Metrics,
};

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Arc::new(Config::new().context("Failed to load configuration")?);

    // Initialize logging
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "wall_annotator={level},tower_http={level}",
            level = match config.log_level() {
                tracing::Level::TRACE => "trace",
                tracing::Level::DEBUG => "debug",
                tracing::Level::INFO => "info",
                tracing::Level::WARN => "warn",
                tracing::Level::ERROR => "error",
            }
        ))
    });

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("=== WALL LINE ANNOTATOR ===");

    let sink = build_sink(&config.storage.backend).context("Failed to initialize blob storage")?;
    info!("Storage: {}", sink.describe());
    info!(
        "Output: {}/{}<name> (skip annotated: {})",
        config.output_container(),
        config.output_prefix(),
        config.trigger.skip_annotated_blobs
    );
    info!(
        "Detection: canny {}/{} hough threshold={} min_len={} max_gap={}",
        config.detection.canny.low_threshold,
        config.detection.canny.high_threshold,
        config.detection.hough.threshold,
        config.detection.hough.min_line_length,
        config.detection.hough.max_line_gap
    );

    let metrics = Metrics::new();
    let pipeline = AnnotationPipeline::from_config(&config, sink, metrics)?;
    let app = api::router(AppState::new(config.clone(), pipeline));

    let addr = format!("{}:{}", config.server_host(), config.server_port());
    info!("{}", "=".repeat(70));
    info!("Server starting on http://{}", addr);
    info!("{}", "-".repeat(70));
    info!("Endpoints:");
    info!("  GET  /                  - Root endpoint");
    info!("  GET  /health            - Health check");
    info!("  GET  /metrics           - Prometheus metrics");
    info!("  GET  /stats             - Detailed statistics");
    info!("  POST {}  - Annotate a base64 image", api::ANNOTATE_ROUTE);
    info!("  POST {}        - Blob trigger invocation", api::BLOB_TRIGGER_ROUTE);
    info!("{}", "=".repeat(70));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
