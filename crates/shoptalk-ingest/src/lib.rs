//! shoptalk-ingest
//!
//! The manual ingestion pipeline: pre-extracted pages are chunked with
//! section awareness, embedded figures are described through an external
//! vision service, and every surviving chunk is embedded and persisted.
//! Re-ingesting a manual replaces its chunks wholesale.

pub mod pages;
pub mod pipeline;
pub mod vision;

pub use pipeline::{IngestReport, ManualIngestor};
pub use vision::HttpVisionDescriber;
