pub mod pipeline;

pub use pipeline::{IngestError, IngestOutcome, IngestionPipeline};
