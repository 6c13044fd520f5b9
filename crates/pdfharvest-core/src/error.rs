//! Error types for the pdfharvest-core library.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the pdfharvest library.
///
/// Per-file, pattern and output failures have their own types. This one
/// covers errors that stop a run before any file is read.
#[derive(Error, Debug)]
pub enum HarvestError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors related to PDF processing.
#[derive(Error, Debug)]
pub enum PdfError {
    /// The file could not be read from disk.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The path does not name a PDF file.
    #[error("not a PDF file: {0}")]
    NotPdf(PathBuf),

    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// Failed to extract text from PDF.
    #[error("failed to extract text: {0}")]
    TextExtraction(String),

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,
}

/// Why a single input file produced no record.
#[derive(Error, Debug)]
pub enum FileError {
    /// The PDF could not be read or decoded.
    #[error(transparent)]
    Pdf(#[from] PdfError),

    /// None of the declared fields matched anywhere in the document.
    #[error("no fields matched")]
    NoFields,
}

/// Errors in a pattern set or analysis definition. Always fatal at startup.
#[derive(Error, Debug)]
pub enum PatternConfigError {
    /// The pattern set declares no fields.
    #[error("pattern set for {0} declares no fields")]
    Empty(String),

    /// A field has an empty name.
    #[error("field #{0} has an empty name")]
    EmptyFieldName(usize),

    /// The same field name is declared twice.
    #[error("field {0} is declared more than once")]
    DuplicateField(String),

    /// A field has no candidate patterns.
    #[error("field {0} has no candidate patterns")]
    NoPatterns(String),

    /// A candidate pattern does not compile.
    #[error("pattern #{index} for field {field} is invalid: {source}")]
    InvalidRegex {
        field: String,
        index: usize,
        #[source]
        source: regex::Error,
    },

    /// The line-item pattern is invalid or lacks required groups.
    #[error("line-item pattern is invalid: {0}")]
    LineItem(String),

    /// A grouping or trend key names a field the pattern set does not declare.
    #[error("unknown field {field} referenced by {context}")]
    UnknownField { field: String, context: String },

    /// The anomaly threshold is not a positive finite number.
    #[error("anomaly threshold must be a positive finite number, got {0}")]
    InvalidThreshold(f64),
}

/// A raw value could not be converted to its declared type.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("cannot read {raw:?} as {expected}")]
pub struct CoercionError {
    /// Raw matched text.
    pub raw: String,
    /// Name of the expected value type.
    pub expected: &'static str,
}

/// Errors raised while writing an output target.
#[derive(Error, Debug)]
pub enum ExportError {
    /// I/O error writing the target.
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV serialization failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Spreadsheet writer failed.
    #[error("spreadsheet error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// Chart rendering failed.
    #[error("chart error: {0}")]
    Chart(String),
}

/// Result type for the pdfharvest library.
pub type Result<T> = std::result::Result<T, HarvestError>;
