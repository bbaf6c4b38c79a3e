// Shared types for the annotation workflow

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Untrusted wire form of a line segment: `[x1, y1, x2, y2]`.
///
/// Anything that does not have exactly four components is skipped
/// when the segment list is turned into a [`LineSet`].
pub type RawSegment = Vec<i32>;

/// Read one wire entry leniently.
///
/// An array of JSON numbers becomes its values rounded to `i32` (saturating);
/// anything else (null, strings, nested arrays, non-numeric items) becomes an
/// empty segment, which is later skipped as malformed.
pub fn raw_segment_from_value(value: &serde_json::Value) -> RawSegment {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .map(|v| v.as_f64().map(|f| f.round() as i32))
        .collect::<Option<Vec<_>>>()
        .unwrap_or_default()
}

fn lenient_segments<'de, D>(deserializer: D) -> Result<Option<Vec<RawSegment>>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries: Option<Vec<serde_json::Value>> = Option::deserialize(deserializer)?;
    Ok(entries.map(|entries| entries.iter().map(raw_segment_from_value).collect()))
}

/// A straight line segment between two pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineSegment {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl LineSegment {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Build a segment from raw values. Returns `None` unless exactly four are given.
    pub fn from_values(values: &[i32]) -> Option<Self> {
        match *values {
            [x1, y1, x2, y2] => Some(Self::new(x1, y1, x2, y2)),
            _ => None,
        }
    }

    pub fn start(&self) -> (i32, i32) {
        (self.x1, self.y1)
    }

    pub fn end(&self) -> (i32, i32) {
        (self.x2, self.y2)
    }

    /// Euclidean length in pixels.
    pub fn length(&self) -> f64 {
        let dx = f64::from(self.x2 - self.x1);
        let dy = f64::from(self.y2 - self.y1);
        dx.hypot(dy)
    }
}

/// Ordered list of segments. Later segments are drawn on top of earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LineSet {
    segments: Vec<LineSegment>,
}

impl LineSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep the well-formed entries of `raw`, in order.
    pub fn from_raw(raw: &[RawSegment]) -> Self {
        let segments = raw
            .iter()
            .filter_map(|values| {
                let segment = LineSegment::from_values(values);
                if segment.is_none() {
                    tracing::debug!("Skipping malformed segment with {} values", values.len());
                }
                segment
            })
            .collect();
        Self { segments }
    }

    pub fn push(&mut self, segment: LineSegment) {
        self.segments.push(segment);
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LineSegment> {
        self.segments.iter()
    }

    pub fn as_slice(&self) -> &[LineSegment] {
        &self.segments
    }

    pub fn into_vec(self) -> Vec<LineSegment> {
        self.segments
    }
}

impl From<Vec<LineSegment>> for LineSet {
    fn from(segments: Vec<LineSegment>) -> Self {
        Self { segments }
    }
}

impl FromIterator<LineSegment> for LineSet {
    fn from_iter<I: IntoIterator<Item = LineSegment>>(iter: I) -> Self {
        Self {
            segments: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a LineSet {
    type Item = &'a LineSegment;
    type IntoIter = std::slice::Iter<'a, LineSegment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}

/// Result of a single `annotate` call
#[derive(Debug, Clone)]
pub struct Annotation {
    /// PNG-encoded annotated copy
    pub png_bytes: Vec<u8>,
    /// Segments that were drawn, in drawing order
    pub segments: LineSet,
    /// True when the segments came from auto-detection
    pub auto_detected: bool,
    pub width: u32,
    pub height: u32,
}

/// An annotation that has been written to the sink
#[derive(Debug, Clone, Serialize)]
pub struct SavedAnnotation {
    pub container: String,
    pub key: String,
    pub bytes_written: usize,
    pub segment_count: usize,
    pub auto_detected: bool,
}

/// Body of `POST /api/annotatewalls`
#[derive(Debug, Clone, Deserialize)]
pub struct AnnotateRequest {
    /// Base64 image, optionally with a data-URL header (`data:image/png;base64,`)
    pub base64: String,
    /// Segments to draw; auto-detected when absent. Unreadable entries are kept
    /// as empty segments so they are skipped without rejecting the request.
    #[serde(default, deserialize_with = "lenient_segments")]
    pub lines: Option<Vec<RawSegment>>,
    /// Name the output key is derived from
    #[serde(default)]
    pub name: Option<String>,
}

/// Success body of the HTTP adapter
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn done() -> Self {
        Self {
            status: "done".to_string(),
        }
    }
}

/// Invocation payload the Functions host posts for a blob trigger
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BlobTriggerRequest {
    pub data: BlobTriggerData,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlobTriggerData {
    /// Base64-encoded blob content
    pub blob: String,
}

impl BlobTriggerRequest {
    /// The `{name}` binding of the trigger path, if the host sent one.
    pub fn blob_name(&self) -> Option<&str> {
        self.metadata
            .get("name")
            .or_else(|| self.metadata.get("Name"))
            .and_then(|value| value.as_str())
    }
}

/// Response envelope expected by the Functions host from a custom handler
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InvokeResponse {
    pub outputs: HashMap<String, serde_json::Value>,
    pub logs: Vec<String>,
    pub return_value: Option<serde_json::Value>,
}

impl InvokeResponse {
    pub fn with_log(message: impl Into<String>) -> Self {
        Self {
            logs: vec![message.into()],
            ..Self::default()
        }
    }
}
