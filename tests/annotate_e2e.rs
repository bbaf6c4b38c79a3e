// End-to-end annotate scenarios through the public API

use image::{Rgb, RgbImage};
use std::sync::Arc;
use wall_annotator::services::rendering::distance_sq_to_segment;
use wall_annotator::{decode_rgb, AnnotationPipeline, Annotator, LineSegment, MemorySink, Metrics};

const GREEN: Rgb<u8> = Rgb([0, 255, 0]);

fn gradient_image(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| Rgb([(x % 200) as u8, (y % 200) as u8, 40]))
}

#[test]
fn diagonal_on_black_canvas() {
    let image = RgbImage::new(300, 300);
    let annotation = Annotator::default()
        .annotate(&image, Some(vec![vec![100, 100, 200, 200]].as_slice()))
        .unwrap();
    let output = decode_rgb(&annotation.png_bytes).unwrap();
    let segment = LineSegment::new(100, 100, 200, 200);

    assert_eq!(output.dimensions(), (300, 300));
    assert_eq!(*output.get_pixel(100, 100), GREEN);
    assert_eq!(*output.get_pixel(200, 200), GREEN);
    assert_eq!(*output.get_pixel(150, 150), GREEN);

    for (x, y, pixel) in output.enumerate_pixels() {
        let d2 = distance_sq_to_segment(x as f64, y as f64, &segment);
        if d2 > 1.0 + 1e-9 {
            assert_eq!(*pixel, Rgb([0, 0, 0]), "unexpected pixel at ({x}, {y})");
        } else {
            assert_eq!(*pixel, GREEN, "pixel at ({x}, {y}) should be drawn");
        }
    }
}

#[test]
fn changes_stay_within_one_pixel_of_segments() {
    let image = gradient_image(240, 180);
    let raw = vec![vec![10, 20, 230, 20], vec![50, 170, 120, 5], vec![200, 100, 200, 100]];
    let segments: Vec<LineSegment> = raw.iter().filter_map(|v| LineSegment::from_values(v)).collect();

    let annotation = Annotator::default().annotate(&image, Some(raw.as_slice())).unwrap();
    let output = decode_rgb(&annotation.png_bytes).unwrap();

    for (x, y, pixel) in output.enumerate_pixels() {
        if pixel != image.get_pixel(x, y) {
            let near = segments
                .iter()
                .any(|s| distance_sq_to_segment(x as f64, y as f64, s) <= 1.0 + 1e-9);
            assert!(near, "pixel ({x}, {y}) changed away from every segment");
        }
    }
}

#[test]
fn malformed_segments_are_skipped() {
    let image = RgbImage::new(100, 100);
    let raw = vec![vec![0, 50, 99, 50], vec![1, 2], vec![5, 5, 5, 5, 5]];
    let annotation = Annotator::default().annotate(&image, Some(raw.as_slice())).unwrap();

    assert_eq!(annotation.segments.as_slice(), &[LineSegment::new(0, 50, 99, 50)]);
    let output = decode_rgb(&annotation.png_bytes).unwrap();
    assert_eq!(*output.get_pixel(40, 50), GREEN);
    assert_eq!(*output.get_pixel(40, 10), Rgb([0, 0, 0]));
}

#[test]
fn output_keeps_input_dimensions() {
    for (w, h) in [(1, 1), (17, 3), (320, 240)] {
        let image = gradient_image(w, h);
        let annotation = Annotator::default().annotate(&image, None).unwrap();
        assert_eq!((annotation.width, annotation.height), (w, h));
        assert_eq!(decode_rgb(&annotation.png_bytes).unwrap().dimensions(), (w, h));
    }
}

#[test]
fn horizontal_edge_is_auto_detected() {
    let mut image = RgbImage::new(300, 300);
    for y in 150..300 {
        for x in 40..260 {
            image.put_pixel(x, y, Rgb([255, 255, 255]));
        }
    }

    let annotation = Annotator::default().annotate(&image, Some(&[][..])).unwrap();

    assert!(annotation.auto_detected);
    assert!(annotation.segments.iter().any(|s| s.length() >= 100.0));
    let output = decode_rgb(&annotation.png_bytes).unwrap();
    assert!(output.pixels().any(|p| *p == GREEN));
}

#[tokio::test]
async fn pipeline_writes_annotated_object() {
    let sink = MemorySink::new();
    let pipeline = AnnotationPipeline::new(
        Annotator::default(),
        Arc::new(sink.clone()),
        "pdf-images",
        "annotated_",
        Metrics::new(),
    );

    let saved = pipeline
        .annotate_and_save(Some(RgbImage::new(300, 300)), "plan.png", Some(vec![vec![100, 100, 200, 200]]))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(saved.key, "annotated_plan.png");
    assert_eq!(sink.keys(), vec!["pdf-images/annotated_plan.png".to_string()]);

    let skipped = pipeline.annotate_and_save(None, "broken.png", None).await.unwrap();
    assert!(skipped.is_none());
    assert_eq!(sink.len(), 1);
}
