pub mod pipeline;

pub use pipeline::AnnotationPipeline;
