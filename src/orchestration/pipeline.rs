// Annotation pipeline: decoded image → annotate → persist

use image::RgbImage;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument};

use crate::core::config::Config;
use crate::core::errors::{AnnotateError, AnnotateResult, DetectionResult};
use crate::core::types::{RawSegment, SavedAnnotation};
use crate::services::annotator::Annotator;
use crate::services::storage::BlobSink;
use crate::utils::Metrics;

const PNG_CONTENT_TYPE: &str = "image/png";

/// Shared by both trigger adapters. Cheap to clone.
#[derive(Clone)]
pub struct AnnotationPipeline {
    annotator: Arc<Annotator>,
    sink: Arc<dyn BlobSink>,
    container: String,
    prefix: String,
    metrics: Metrics,
}

impl AnnotationPipeline {
    pub fn new(
        annotator: Annotator,
        sink: Arc<dyn BlobSink>,
        container: impl Into<String>,
        prefix: impl Into<String>,
        metrics: Metrics,
    ) -> Self {
        Self {
            annotator: Arc::new(annotator),
            sink,
            container: container.into(),
            prefix: prefix.into(),
            metrics,
        }
    }

    /// Pipeline configured from `config`, writing to `sink`.
    pub fn from_config(config: &Config, sink: Arc<dyn BlobSink>, metrics: Metrics) -> DetectionResult<Self> {
        let annotator = Annotator::new(config.detection, config.style)?;
        Ok(Self::new(
            annotator,
            sink,
            config.output_container(),
            config.output_prefix(),
            metrics,
        ))
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn sink(&self) -> &Arc<dyn BlobSink> {
        &self.sink
    }

    /// Output key for a source blob name.
    pub fn output_key(&self, blob_name: &str) -> String {
        format!("{}{}", self.prefix, blob_name)
    }

    /// Whether `blob_name` is one of our own outputs.
    pub fn is_annotated_name(&self, blob_name: &str) -> bool {
        !self.prefix.is_empty() && blob_name.starts_with(&self.prefix)
    }

    /// Annotate `image` and write the PNG to `<container>/<prefix><blob_name>`.
    ///
    /// A missing image (it could not be decoded) is logged and skipped with
    /// `Ok(None)`; nothing is written. Exactly one write happens otherwise.
    #[instrument(skip(self, image, lines), fields(container = %self.container))]
    pub async fn annotate_and_save(
        &self,
        image: Option<RgbImage>,
        blob_name: &str,
        lines: Option<Vec<RawSegment>>,
    ) -> AnnotateResult<Option<SavedAnnotation>> {
        let Some(image) = image else {
            error!("Image could not be decoded, skipping {}", blob_name);
            self.metrics.record_skip();
            return Ok(None);
        };

        if blob_name.is_empty() {
            self.metrics.record_failure();
            return Err(AnnotateError::InvalidInput("blob name must not be empty".to_string()));
        }

        // Detection and encoding are CPU-bound
        let annotate_start = Instant::now();
        let annotator = self.annotator.clone();
        let annotation = tokio::task::spawn_blocking(move || annotator.annotate(&image, lines.as_deref()))
            .await
            .map_err(|e| AnnotateError::TaskJoin(e.to_string()))
            .and_then(|result| result)
            .inspect_err(|_| self.metrics.record_failure())?;
        self.metrics.record_annotation(
            annotation.segments.len(),
            annotation.auto_detected,
            annotate_start.elapsed(),
        );

        let key = self.output_key(blob_name);
        let bytes_written = annotation.png_bytes.len();
        let upload_start = Instant::now();
        let upload = self
            .sink
            .put(&self.container, &key, annotation.png_bytes, PNG_CONTENT_TYPE)
            .await;
        self.metrics
            .record_upload(upload.is_ok(), bytes_written, upload_start.elapsed());
        if let Err(e) = upload {
            self.metrics.record_failure();
            error!("Upload of {}/{} failed: {}", self.container, key, e);
            return Err(e.into());
        }

        info!(
            "Saved {}/{} ({} bytes, {} segments{})",
            self.container,
            key,
            bytes_written,
            annotation.segments.len(),
            if annotation.auto_detected { ", auto-detected" } else { "" }
        );

        Ok(Some(SavedAnnotation {
            container: self.container.clone(),
            key,
            bytes_written,
            segment_count: annotation.segments.len(),
            auto_detected: annotation.auto_detected,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::StorageError;
    use crate::services::storage::MemorySink;
    use crate::utils::decode_rgb;
    use async_trait::async_trait;
    use image::Rgb;

    struct FailingSink;

    #[async_trait]
    impl BlobSink for FailingSink {
        async fn put(&self, _: &str, key: &str, _: Vec<u8>, _: &str) -> crate::core::errors::StorageResult<()> {
            Err(StorageError::Rejected {
                key: key.to_string(),
                status: 403,
                body: "AuthorizationFailure".to_string(),
            })
        }

        fn describe(&self) -> String {
            "failing".to_string()
        }
    }

    fn pipeline(sink: Arc<dyn BlobSink>) -> AnnotationPipeline {
        AnnotationPipeline::new(Annotator::default(), sink, "pdf-images", "annotated_", Metrics::new())
    }

    #[tokio::test]
    async fn test_saves_under_prefixed_key() {
        let sink = MemorySink::new();
        let pipeline = pipeline(Arc::new(sink.clone()));
        let image = RgbImage::from_pixel(50, 50, Rgb([255, 255, 255]));

        let saved = pipeline
            .annotate_and_save(Some(image), "page1.png", Some(vec![vec![0, 25, 49, 25]]))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(saved.key, "annotated_page1.png");
        assert_eq!(saved.segment_count, 1);
        assert!(!saved.auto_detected);

        let stored = sink.get("pdf-images", "annotated_page1.png").unwrap();
        assert_eq!(stored.content_type, "image/png");
        assert_eq!(stored.bytes.len(), saved.bytes_written);
        let decoded = decode_rgb(&stored.bytes).unwrap();
        assert_eq!(*decoded.get_pixel(10, 25), Rgb([0, 255, 0]));
        assert_eq!(*decoded.get_pixel(10, 10), Rgb([255, 255, 255]));
    }

    #[tokio::test]
    async fn test_missing_image_is_skipped() {
        let sink = MemorySink::new();
        let pipeline = pipeline(Arc::new(sink.clone()));

        let result = pipeline.annotate_and_save(None, "broken.png", None).await.unwrap();

        assert!(result.is_none());
        assert!(sink.is_empty());
        assert_eq!(pipeline.metrics().snapshot().images_skipped, 1);
    }

    #[tokio::test]
    async fn test_sink_failure_propagates() {
        let pipeline = pipeline(Arc::new(FailingSink));
        let image = RgbImage::new(10, 10);

        let err = pipeline.annotate_and_save(Some(image), "x.png", None).await.unwrap_err();

        assert!(matches!(err, AnnotateError::Sink(StorageError::Rejected { status: 403, .. })));
        let snapshot = pipeline.metrics().snapshot();
        assert_eq!(snapshot.upload_failures, 1);
        assert_eq!(snapshot.annotation_failures, 1);
    }

    #[test]
    fn test_annotated_name_detection() {
        let pipeline = pipeline(Arc::new(MemorySink::new()));
        assert!(pipeline.is_annotated_name("annotated_page1.png"));
        assert!(!pipeline.is_annotated_name("page1.png"));
        assert_eq!(pipeline.output_key("a.png"), "annotated_a.png");
    }
}
