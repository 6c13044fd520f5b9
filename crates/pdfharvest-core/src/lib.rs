//! Core library for regex-driven PDF data extraction.
//!
//! This crate provides:
//! - PDF text acquisition per page
//! - Configurable pattern sets for invoices and reports
//! - Typed records with confidence and completeness
//! - Aggregate statistics, anomaly detection, grouping and monthly trends
//! - CSV, spreadsheet, JSON and chart outputs

pub mod analysis;
pub mod batch;
pub mod charts;
pub mod error;
pub mod export;
pub mod extraction;
pub mod models;
pub mod pdf;

#[cfg(test)]
mod test_support;

pub use analysis::Analyzer;
pub use batch::{BatchProcessor, FileOutcome};
pub use charts::{ChartOutcome, ChartRenderer};
pub use error::{HarvestError, Result};
pub use export::{ExportOutcome, Exporter, Target};
pub use extraction::{PatternSet, PatternSetDef, RecordBuilder};
pub use models::config::HarvestConfig;
pub use models::record::{BatchResult, DocumentType, FailedFile, Record};
pub use models::report::AggregateReport;
pub use pdf::{PdfExtractor, PdfProcessor};
