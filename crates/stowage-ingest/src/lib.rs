//! # stowage-ingest
//!
//! Extraction of objects from a public S3 bucket into landing tables.
//!
//! This crate provides:
//! - The [`ObjectSource`] seam with simulated and public-S3 implementations
//! - JSON and CSV payload decoding
//! - The landing loader that appends decoded records to landing tables
//! - The extractor that walks the configured key → table mapping

pub mod extractor;
pub mod landing;
pub mod payload;
pub mod source;

pub use extractor::{ExtractionReport, FileOutcome, S3Extractor};
pub use landing::LandingLoader;
pub use payload::{decode, PayloadFormat, Record};
pub use source::{source_for, ObjectSource, PublicS3Source, SimulatedSource};
