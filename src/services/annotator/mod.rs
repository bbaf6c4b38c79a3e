// Annotation routine: (image, lines?) → PNG bytes
//
// Synchronous. The caller's image is never modified; lines are drawn on a
// clone. Where the bytes end up is decided by the caller.

use image::RgbImage;
use std::time::Instant;
use tracing::{debug, info};

use crate::core::errors::{AnnotateResult, DetectionResult};
use crate::core::types::{Annotation, LineSet, RawSegment};
use crate::services::detection::{DetectionParams, LineDetector};
use crate::services::rendering::{draw_lines_mut, LineStyle};
use crate::utils::image_ops::encode_png;

#[derive(Debug, Clone, Default)]
pub struct Annotator {
    detector: LineDetector,
    style: LineStyle,
}

impl Annotator {
    pub fn new(detection: DetectionParams, style: LineStyle) -> DetectionResult<Self> {
        Ok(Self {
            detector: LineDetector::new(detection)?,
            style,
        })
    }

    pub fn style(&self) -> &LineStyle {
        &self.style
    }

    pub fn detector(&self) -> &LineDetector {
        &self.detector
    }

    /// Draw `lines` (or auto-detected lines when `lines` is `None` or empty) on a
    /// copy of `image` and PNG-encode the result.
    ///
    /// Raw segments without exactly four values are skipped.
    pub fn annotate(&self, image: &RgbImage, lines: Option<&[RawSegment]>) -> AnnotateResult<Annotation> {
        let (segments, auto_detected) = match lines {
            Some(raw) if !raw.is_empty() => (LineSet::from_raw(raw), false),
            _ => {
                let start = Instant::now();
                let detected = self.detector.detect(image)?;
                info!(
                    "Auto-detected {} lines in {:.1}ms",
                    detected.len(),
                    start.elapsed().as_secs_f64() * 1000.0
                );
                (detected, true)
            }
        };

        self.render(image, segments, auto_detected)
    }

    fn render(&self, image: &RgbImage, segments: LineSet, auto_detected: bool) -> AnnotateResult<Annotation> {
        let mut annotated = image.clone();
        draw_lines_mut(&mut annotated, &segments, &self.style);
        debug!("Drew {} segments on {}x{} image", segments.len(), image.width(), image.height());

        let png_bytes = encode_png(&annotated)?;
        Ok(Annotation {
            png_bytes,
            segments,
            auto_detected,
            width: annotated.width(),
            height: annotated.height(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::LineSegment;
    use crate::utils::image_ops::decode_rgb;
    use image::Rgb;

    #[test]
    fn test_explicit_lines_are_drawn() {
        let image = RgbImage::new(300, 300);
        let annotation = Annotator::default()
            .annotate(&image, Some(vec![vec![100, 100, 200, 200]].as_slice()))
            .unwrap();

        assert!(!annotation.auto_detected);
        assert_eq!(annotation.segments.as_slice(), &[LineSegment::new(100, 100, 200, 200)]);
        let decoded = decode_rgb(&annotation.png_bytes).unwrap();
        assert_eq!(*decoded.get_pixel(150, 150), Rgb([0, 255, 0]));
        assert_eq!(*decoded.get_pixel(10, 10), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_input_image_is_not_mutated() {
        let image = RgbImage::new(50, 50);
        let before = image.clone();
        Annotator::default()
            .annotate(&image, Some(vec![vec![0, 0, 49, 49]].as_slice()))
            .unwrap();
        assert_eq!(image, before);
    }

    #[test]
    fn test_empty_lines_trigger_detection() {
        let image = RgbImage::new(64, 64);
        let annotation = Annotator::default().annotate(&image, Some(&[][..])).unwrap();
        assert!(annotation.auto_detected);
        assert!(annotation.segments.is_empty());
        assert_eq!((annotation.width, annotation.height), (64, 64));
    }

    #[test]
    fn test_only_malformed_lines_draw_nothing() {
        let image = RgbImage::new(40, 40);
        let annotation = Annotator::default()
            .annotate(&image, Some(vec![vec![1, 2, 3], vec![]].as_slice()))
            .unwrap();
        assert!(!annotation.auto_detected);
        assert!(annotation.segments.is_empty());
        assert_eq!(decode_rgb(&annotation.png_bytes).unwrap(), image);
    }
}
