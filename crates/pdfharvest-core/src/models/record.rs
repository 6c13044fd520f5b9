//! Extracted record data models.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Kind of document being processed. Selects the pattern set for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    /// Vendor invoice.
    Invoice,
    /// Business or financial report.
    Report,
}

impl DocumentType {
    /// Lowercase name used in file names and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Invoice => "invoice",
            Self::Report => "report",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared type of a field's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    /// Free text.
    String,
    /// Monetary amount.
    Currency,
    /// Plain decimal number, optionally a percentage.
    Number,
    /// Calendar date.
    Date,
    /// Whole number.
    Integer,
}

impl ValueType {
    /// Whether values of this type take part in numeric statistics.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Currency | Self::Number | Self::Integer)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Currency => "currency",
            Self::Number => "number",
            Self::Date => "date",
            Self::Integer => "integer",
        }
    }
}

/// A coerced field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    Currency(Decimal),
    Number(Decimal),
    Date(NaiveDate),
    Integer(i64),
}

impl FieldValue {
    /// Numeric view of the value, if it is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Currency(d) | Self::Number(d) => d.to_f64(),
            Self::Integer(i) => Some(*i as f64),
            Self::Text(_) | Self::Date(_) => None,
        }
    }

    /// Date view of the value.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Key used when grouping records by this value. Dates group by month.
    pub fn group_key(&self) -> String {
        match self {
            Self::Date(d) => d.format("%Y-%m").to_string(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Currency(d) => write!(f, "{:.2}", d),
            Self::Number(d) => write!(f, "{}", d),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Self::Integer(i) => write!(f, "{}", i),
        }
    }
}

/// How reliable a match is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// The first-listed pattern matched.
    High,
    /// A fallback pattern matched.
    Low,
}

/// A field extracted from a document and coerced to its declared type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedField {
    /// Field name.
    pub field: String,
    /// Raw matched text.
    pub raw: String,
    /// Typed value.
    pub value: FieldValue,
    /// Match confidence.
    pub confidence: Confidence,
}

/// One priced row of an invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Item description.
    pub description: String,
    /// Quantity (defaults to 1 when the row has none).
    pub quantity: Decimal,
    /// Unit price, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<Decimal>,
    /// Row total.
    pub amount: Decimal,
}

/// Structured data extracted from one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Source file name.
    pub source: String,

    /// Document type the record was extracted as.
    pub document_type: DocumentType,

    /// Number of pages in the source document.
    pub page_count: u32,

    /// Extracted fields keyed by name.
    pub fields: BTreeMap<String, ExtractedField>,

    /// Declared fields that were not extracted, in declaration order.
    #[serde(default)]
    pub missing: Vec<String>,

    /// Invoice line items.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub line_items: Vec<LineItem>,

    /// Fraction of scored fields present (0.0 - 1.0): the required fields,
    /// or every declared field when none is required.
    pub completeness: f64,
}

impl Record {
    /// Look up an extracted field.
    pub fn get(&self, field: &str) -> Option<&ExtractedField> {
        self.fields.get(field)
    }

    /// Numeric value of a field.
    pub fn numeric(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(|f| f.value.as_f64())
    }

    /// Date value of a field.
    pub fn date(&self, field: &str) -> Option<NaiveDate> {
        self.get(field).and_then(|f| f.value.as_date())
    }
}

/// A file the batch could not turn into a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedFile {
    /// File name.
    pub filename: String,
    /// Why extraction failed.
    pub reason: String,
}

/// Outcome of processing one directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    /// Document type of the run.
    pub document_type: DocumentType,
    /// Records in file iteration order.
    pub records: Vec<Record>,
    /// Files that failed extraction.
    pub failures: Vec<FailedFile>,
}

impl BatchResult {
    pub fn new(document_type: DocumentType) -> Self {
        Self {
            document_type,
            records: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Total number of files seen.
    pub fn total(&self) -> usize {
        self.records.len() + self.failures.len()
    }
}
