pub mod image_ops;
pub mod metrics;

// Re-export commonly used items
pub use image_ops::{
    decode_base64_image,
    decode_rgb,
    decode_rgb_async,
    encode_png,
    strip_data_url_header,
};
pub use metrics::{Metrics, MetricsSnapshot};
