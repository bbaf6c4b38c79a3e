use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Latency samples kept per stage; older samples are dropped.
pub const MAX_LATENCY_SAMPLES: usize = 1024;

/// Global metrics collector for the application.
///
/// Tracks annotation outcomes, drawn/detected segments, stage latencies and
/// per-endpoint request counts. Cheap to clone; clones share counters.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    // Annotation outcomes
    images_annotated: AtomicUsize,
    images_skipped: AtomicUsize,
    annotation_failures: AtomicUsize,

    // Segments
    segments_drawn: AtomicU64,
    auto_detections: AtomicUsize,

    // Storage
    bytes_uploaded: AtomicU64,
    upload_failures: AtomicUsize,

    // Stage latencies (most recent MAX_LATENCY_SAMPLES)
    annotate_duration_ms: RwLock<VecDeque<u64>>,
    upload_duration_ms: RwLock<VecDeque<u64>>,

    // Per-endpoint request counters
    endpoint_counters: DashMap<String, AtomicUsize>,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                images_annotated: AtomicUsize::new(0),
                images_skipped: AtomicUsize::new(0),
                annotation_failures: AtomicUsize::new(0),
                segments_drawn: AtomicU64::new(0),
                auto_detections: AtomicUsize::new(0),
                bytes_uploaded: AtomicU64::new(0),
                upload_failures: AtomicUsize::new(0),
                annotate_duration_ms: RwLock::new(VecDeque::with_capacity(MAX_LATENCY_SAMPLES)),
                upload_duration_ms: RwLock::new(VecDeque::with_capacity(MAX_LATENCY_SAMPLES)),
                endpoint_counters: DashMap::new(),
                start_time: Instant::now(),
            }),
        }
    }

    pub fn record_annotation(&self, segments: usize, auto_detected: bool, duration: Duration) {
        self.inner.segments_drawn.fetch_add(segments as u64, Ordering::Relaxed);
        if auto_detected {
            self.inner.auto_detections.fetch_add(1, Ordering::Relaxed);
        }
        push_sample(&self.inner.annotate_duration_ms, duration);
    }

    pub fn record_upload(&self, success: bool, bytes: usize, duration: Duration) {
        if success {
            self.inner.bytes_uploaded.fetch_add(bytes as u64, Ordering::Relaxed);
            self.inner.images_annotated.fetch_add(1, Ordering::Relaxed);
        } else {
            self.inner.upload_failures.fetch_add(1, Ordering::Relaxed);
        }
        push_sample(&self.inner.upload_duration_ms, duration);
    }

    pub fn record_skip(&self) {
        self.inner.images_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.inner.annotation_failures.fetch_add(1, Ordering::Relaxed);
    }

    // Endpoint Metrics
    pub fn record_endpoint_request(&self, endpoint: &str) {
        self.inner.endpoint_counters
            .entry(endpoint.to_string())
            .or_insert_with(|| AtomicUsize::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn endpoint_requests(&self, endpoint: &str) -> usize {
        self.inner
            .endpoint_counters
            .get(endpoint)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    // Get snapshot for reporting
    pub fn snapshot(&self) -> MetricsSnapshot {
        let annotate = samples(&self.inner.annotate_duration_ms);
        let annotate_avg_ms = avg(&annotate);
        let annotate_p95_ms = percentile(&annotate, 0.95);

        let upload = samples(&self.inner.upload_duration_ms);
        let upload_avg_ms = avg(&upload);
        let upload_p95_ms = percentile(&upload, 0.95);

        let mut endpoint_requests: Vec<(String, usize)> = self
            .inner
            .endpoint_counters
            .iter()
            .map(|e| (e.key().clone(), e.value().load(Ordering::Relaxed)))
            .collect();
        endpoint_requests.sort();

        MetricsSnapshot {
            images_annotated: self.inner.images_annotated.load(Ordering::Relaxed),
            images_skipped: self.inner.images_skipped.load(Ordering::Relaxed),
            annotation_failures: self.inner.annotation_failures.load(Ordering::Relaxed),
            segments_drawn: self.inner.segments_drawn.load(Ordering::Relaxed),
            auto_detections: self.inner.auto_detections.load(Ordering::Relaxed),
            bytes_uploaded: self.inner.bytes_uploaded.load(Ordering::Relaxed),
            upload_failures: self.inner.upload_failures.load(Ordering::Relaxed),
            annotate_avg_ms,
            annotate_p95_ms,
            upload_avg_ms,
            upload_p95_ms,
            endpoint_requests,
            uptime_seconds: self.inner.start_time.elapsed().as_secs(),
        }
    }

    /// Generate Prometheus-format metrics
    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        let mut out = format!(
            r#"# HELP images_annotated_total Annotated images written to storage
# TYPE images_annotated_total counter
images_annotated_total {{}} {}

# HELP images_skipped_total Images skipped because they could not be decoded or were already annotated
# TYPE images_skipped_total counter
images_skipped_total {{}} {}

# HELP annotation_failures_total Requests that ended in an error
# TYPE annotation_failures_total counter
annotation_failures_total {{}} {}

# HELP segments_drawn_total Line segments drawn
# TYPE segments_drawn_total counter
segments_drawn_total {{}} {}

# HELP auto_detections_total Annotations that used automatic line detection
# TYPE auto_detections_total counter
auto_detections_total {{}} {}

# HELP bytes_uploaded_total PNG bytes written to storage
# TYPE bytes_uploaded_total counter
bytes_uploaded_total {{}} {}

# HELP upload_failures_total Failed storage writes
# TYPE upload_failures_total counter
upload_failures_total {{}} {}

# HELP stage_avg_duration_ms Average stage duration in milliseconds
# TYPE stage_avg_duration_ms gauge
stage_avg_duration_ms {{stage="annotate"}} {}
stage_avg_duration_ms {{stage="upload"}} {}

# HELP uptime_seconds Application uptime in seconds
# TYPE uptime_seconds counter
uptime_seconds {{}} {}
"#,
            snapshot.images_annotated,
            snapshot.images_skipped,
            snapshot.annotation_failures,
            snapshot.segments_drawn,
            snapshot.auto_detections,
            snapshot.bytes_uploaded,
            snapshot.upload_failures,
            snapshot.annotate_avg_ms,
            snapshot.upload_avg_ms,
            snapshot.uptime_seconds,
        );

        if !snapshot.endpoint_requests.is_empty() {
            out.push_str("\n# HELP endpoint_requests_total Requests per endpoint\n");
            out.push_str("# TYPE endpoint_requests_total counter\n");
            for (endpoint, count) in &snapshot.endpoint_requests {
                out.push_str(&format!("endpoint_requests_total {{endpoint=\"{endpoint}\"}} {count}\n"));
            }
        }
        out
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub images_annotated: usize,
    pub images_skipped: usize,
    pub annotation_failures: usize,
    pub segments_drawn: u64,
    pub auto_detections: usize,
    pub bytes_uploaded: u64,
    pub upload_failures: usize,
    pub annotate_avg_ms: u64,
    pub annotate_p95_ms: u64,
    pub upload_avg_ms: u64,
    pub upload_p95_ms: u64,
    pub endpoint_requests: Vec<(String, usize)>,
    pub uptime_seconds: u64,
}

fn push_sample(buffer: &RwLock<VecDeque<u64>>, duration: Duration) {
    let mut buffer = buffer.write();
    if buffer.len() == MAX_LATENCY_SAMPLES {
        buffer.pop_front();
    }
    buffer.push_back(duration.as_millis() as u64);
}

fn samples(buffer: &RwLock<VecDeque<u64>>) -> Vec<u64> {
    buffer.read().iter().copied().collect()
}

fn percentile(values: &[u64], p: f64) -> u64 {
    if values.is_empty() {
        return 0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let idx = ((values.len() as f64 - 1.0) * p) as usize;
    sorted[idx]
}

fn avg(values: &[u64]) -> u64 {
    if values.is_empty() {
        return 0;
    }
    values.iter().sum::<u64>() / values.len() as u64
}
