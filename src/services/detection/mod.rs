// Automatic line detection: BGR → gray → Canny → probabilistic Hough (OpenCV)

use image::RgbImage;
use opencv::core::{Mat, Scalar, Vec3b, Vec4i, VecN, Vector};
use opencv::imgproc;
use opencv::prelude::*;
use std::f64::consts::PI;
use tracing::debug;

use crate::core::errors::{DetectionError, DetectionResult};
use crate::core::types::{LineSegment, LineSet};

/// Lower hysteresis threshold.
pub const CANNY_LOW_THRESHOLD: f64 = 50.0;
/// Upper hysteresis threshold.
pub const CANNY_HIGH_THRESHOLD: f64 = 150.0;
/// Sobel kernel size.
pub const CANNY_APERTURE_SIZE: i32 = 3;

/// Distance resolution of the accumulator, in pixels.
pub const HOUGH_RHO: f64 = 1.0;
/// Angle resolution of the accumulator, in radians.
pub const HOUGH_THETA: f64 = PI / 180.0;
/// Minimum number of votes for a line.
pub const HOUGH_THRESHOLD: i32 = 100;
/// Segments shorter than this are dropped.
pub const HOUGH_MIN_LINE_LENGTH: f64 = 100.0;
/// Largest gap between points joined into one segment.
pub const HOUGH_MAX_LINE_GAP: f64 = 10.0;

/// Canny edge detector parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CannyParams {
    pub low_threshold: f64,
    pub high_threshold: f64,
    pub aperture_size: i32,
}

impl Default for CannyParams {
    fn default() -> Self {
        Self {
            low_threshold: CANNY_LOW_THRESHOLD,
            high_threshold: CANNY_HIGH_THRESHOLD,
            aperture_size: CANNY_APERTURE_SIZE,
        }
    }
}

/// Probabilistic Hough transform parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoughParams {
    pub rho: f64,
    pub theta: f64,
    pub threshold: i32,
    pub min_line_length: f64,
    pub max_line_gap: f64,
}

impl Default for HoughParams {
    fn default() -> Self {
        Self {
            rho: HOUGH_RHO,
            theta: HOUGH_THETA,
            threshold: HOUGH_THRESHOLD,
            min_line_length: HOUGH_MIN_LINE_LENGTH,
            max_line_gap: HOUGH_MAX_LINE_GAP,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DetectionParams {
    pub canny: CannyParams,
    pub hough: HoughParams,
}

impl DetectionParams {
    pub fn validate(&self) -> DetectionResult<()> {
        let canny = &self.canny;
        if !matches!(canny.aperture_size, 3 | 5 | 7) {
            return Err(DetectionError::UnsupportedAperture(canny.aperture_size));
        }
        if !(canny.low_threshold >= 0.0 && canny.low_threshold <= canny.high_threshold) {
            return Err(DetectionError::InvalidParameters(format!(
                "canny thresholds must satisfy 0 <= low <= high, got low={} high={}",
                canny.low_threshold, canny.high_threshold
            )));
        }

        let hough = &self.hough;
        if !(hough.rho > 0.0) {
            return Err(DetectionError::InvalidParameters(format!(
                "hough rho must be > 0, got {}",
                hough.rho
            )));
        }
        if !(hough.theta > 0.0 && hough.theta <= PI) {
            return Err(DetectionError::InvalidParameters(format!(
                "hough theta must be in (0, π], got {}",
                hough.theta
            )));
        }
        if hough.threshold <= 0 {
            return Err(DetectionError::InvalidParameters(
                "hough threshold must be > 0".to_string(),
            ));
        }
        if hough.min_line_length < 0.0 || hough.max_line_gap < 0.0 {
            return Err(DetectionError::InvalidParameters(
                "hough line length and gap must be >= 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Finds straight segments in colour images.
#[derive(Debug, Clone, Default)]
pub struct LineDetector {
    params: DetectionParams,
}

impl LineDetector {
    pub fn new(params: DetectionParams) -> DetectionResult<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &DetectionParams {
        &self.params
    }

    /// Detect segments in `image`. An image without lines yields an empty set.
    pub fn detect(&self, image: &RgbImage) -> DetectionResult<LineSet> {
        if image.width() == 0 || image.height() == 0 {
            return Ok(LineSet::new());
        }

        let bgr = rgb_to_bgr_mat(image)?;
        let mut gray = Mat::default();
        imgproc::cvt_color_def(&bgr, &mut gray, imgproc::COLOR_BGR2GRAY)?;

        let canny = &self.params.canny;
        let mut edges = Mat::default();
        imgproc::canny(
            &gray,
            &mut edges,
            canny.low_threshold,
            canny.high_threshold,
            canny.aperture_size,
            false,
        )?;

        let hough = &self.params.hough;
        let mut found = Vector::<Vec4i>::new();
        imgproc::hough_lines_p(
            &edges,
            &mut found,
            hough.rho,
            hough.theta,
            hough.threshold,
            hough.min_line_length,
            hough.max_line_gap,
        )?;

        let lines: LineSet = found
            .iter()
            .map(|l| LineSegment::new(l[0], l[1], l[2], l[3]))
            .collect();
        debug!(
            "Detected {} segments in {}x{} image",
            lines.len(),
            image.width(),
            image.height()
        );
        Ok(lines)
    }
}

/// Copy an RGB raster into an 8-bit, 3-channel BGR Mat.
fn rgb_to_bgr_mat(image: &RgbImage) -> opencv::Result<Mat> {
    let (width, height) = image.dimensions();
    let mut mat = Mat::new_rows_cols_with_default(
        height as i32,
        width as i32,
        opencv::core::CV_8UC3,
        Scalar::all(0.0),
    )?;

    for (x, y, pixel) in image.enumerate_pixels() {
        let [r, g, b] = pixel.0;
        *mat.at_2d_mut::<Vec3b>(y as i32, x as i32)? = VecN([b, g, r]);
    }

    Ok(mat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_default_params() {
        let params = DetectionParams::default();
        assert_eq!(params.canny.low_threshold, 50.0);
        assert_eq!(params.canny.high_threshold, 150.0);
        assert_eq!(params.canny.aperture_size, 3);
        assert_eq!(params.hough.rho, 1.0);
        assert!((params.hough.theta - PI / 180.0).abs() < 1e-12);
        assert_eq!(params.hough.threshold, 100);
        assert_eq!(params.hough.min_line_length, 100.0);
        assert_eq!(params.hough.max_line_gap, 10.0);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_rejects_unsupported_aperture() {
        let mut params = DetectionParams::default();
        params.canny.aperture_size = 4;
        assert!(matches!(
            LineDetector::new(params),
            Err(DetectionError::UnsupportedAperture(4))
        ));
    }

    #[test]
    fn test_rejects_inverted_thresholds() {
        let mut params = DetectionParams::default();
        params.canny.low_threshold = 200.0;
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_bgr_mat_swaps_channels() {
        let image = RgbImage::from_pixel(3, 2, Rgb([10, 20, 30]));
        let mat = rgb_to_bgr_mat(&image).unwrap();
        assert_eq!((mat.rows(), mat.cols()), (2, 3));
        let pixel = *mat.at_2d::<Vec3b>(1, 2).unwrap();
        assert_eq!((pixel[0], pixel[1], pixel[2]), (30, 20, 10));
    }

    #[test]
    fn test_uniform_image_has_no_lines() {
        let image = RgbImage::from_pixel(200, 200, Rgb([90, 90, 90]));
        assert!(LineDetector::default().detect(&image).unwrap().is_empty());
    }

    #[test]
    fn test_tiny_image_is_handled() {
        let image = RgbImage::new(1, 1);
        assert!(LineDetector::default().detect(&image).unwrap().is_empty());
    }

    #[test]
    fn test_detects_horizontal_boundary() {
        // Bright block in the lower half: one long horizontal edge at y≈149
        let mut image = RgbImage::new(300, 300);
        for y in 150..300 {
            for x in 50..250 {
                image.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }

        let lines = LineDetector::default().detect(&image).unwrap();
        let horizontal = lines
            .iter()
            .find(|l| (l.y1 - l.y2).abs() <= 2 && (l.x1 - l.x2).abs() >= 100)
            .expect("horizontal boundary should be detected");
        assert!((148..=151).contains(&horizontal.y1));
    }

    #[test]
    fn test_detection_is_deterministic() {
        let mut image = RgbImage::new(240, 240);
        for y in 60..180 {
            for x in 20..220 {
                image.put_pixel(x, y, Rgb([200, 200, 200]));
            }
        }
        let detector = LineDetector::default();
        assert_eq!(detector.detect(&image).unwrap(), detector.detect(&image).unwrap());
    }

    #[test]
    fn test_saturated_red_wall_is_detected() {
        // Dark red lower half: a luma step of about 45 levels
        let mut image = RgbImage::new(300, 300);
        for y in 150..300 {
            for x in 0..300 {
                image.put_pixel(x, y, Rgb([150, 0, 0]));
            }
        }
        let lines = LineDetector::default().detect(&image).unwrap();
        assert!(lines.iter().any(|l| l.length() >= 100.0));
    }
}
