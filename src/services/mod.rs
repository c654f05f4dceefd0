pub mod ingest;

pub use ingest::{IngestError, IngestOutcome, OrderIngestor};
