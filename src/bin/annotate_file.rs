//! Annotate a local image and write the PNG next to it.
//! Run with: cargo run --release --bin annotate_file -- <image_path> [x1,y1,x2,y2 ...]

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;
use wall_annotator::{decode_rgb, Annotator, RawSegment};

fn parse_segment(arg: &str) -> Result<RawSegment> {
    arg.split(',')
        .map(|v| v.trim().parse::<i32>().with_context(|| format!("bad coordinate in {arg:?}")))
        .collect()
}

fn output_path(input: &Path) -> PathBuf {
    let name = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    input.with_file_name(format!("annotated_{name}.png"))
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("wall_annotator=debug")
        .with_target(false)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(image_path) = args.first() else {
        bail!("usage: annotate_file <image_path> [x1,y1,x2,y2 ...]");
    };
    let input = Path::new(image_path);

    let lines = args[1..]
        .iter()
        .map(String::as_str)
        .map(parse_segment)
        .collect::<Result<Vec<_>>>()?;

    info!("Loading image: {}", input.display());
    let bytes = std::fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let image = decode_rgb(&bytes)?;
    info!("Image dimensions: {}x{}", image.width(), image.height());

    let annotator = Annotator::default();
    let annotation = annotator.annotate(&image, Some(lines.as_slice()))?;

    let output = output_path(input);
    std::fs::write(&output, &annotation.png_bytes)
        .with_context(|| format!("writing {}", output.display()))?;

    println!("\n=== Results ===");
    println!(
        "{} segments ({})",
        annotation.segments.len(),
        if annotation.auto_detected { "auto-detected" } else { "given" }
    );
    for (i, s) in annotation.segments.iter().enumerate() {
        println!("  {}. ({}, {}) -> ({}, {})", i + 1, s.x1, s.y1, s.x2, s.y2);
    }
    println!("Wrote {}", output.display());

    Ok(())
}
