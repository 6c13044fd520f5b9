//! Aggregate analysis models.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::record::DocumentType;

/// Summary statistics for one numeric field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldStats {
    /// Field name.
    pub field: String,
    /// Number of records carrying the field.
    pub count: usize,
    pub sum: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,
    /// Population standard deviation, present from two samples on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stddev: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

/// A record flagged for an unusual numeric value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    /// Index of the record in the batch.
    pub record_index: usize,
    /// Source file of the record.
    pub source: String,
    /// Field that deviates.
    pub field: String,
    pub value: f64,
    /// Signed deviation from the mean, in standard deviations.
    pub z_score: f64,
    pub mean: f64,
    pub stddev: f64,
    /// Human-readable reason.
    pub reason: String,
}

/// Records partitioned by the values of one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupBreakdown {
    /// Field the records were grouped by.
    pub field: String,
    /// Sub-report per group key.
    pub groups: BTreeMap<String, AggregateReport>,
}

/// One month of a trend series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    /// Month as `YYYY-MM`.
    pub period: String,
    pub sum: f64,
    /// Percent change against the previous month.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_pct: Option<f64>,
}

/// Monthly sums of a numeric field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSeries {
    /// Numeric field summed.
    pub field: String,
    /// Date field the months come from.
    pub date_field: String,
    /// Points in chronological order.
    pub points: Vec<TrendPoint>,
}

/// Statistics derived from a batch result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateReport {
    pub document_type: DocumentType,
    pub record_count: usize,
    pub failure_count: usize,
    /// Anomaly threshold used, in standard deviations.
    pub threshold: f64,
    /// Per-field statistics in declaration order.
    pub fields: Vec<FieldStats>,
    pub anomalies: Vec<Anomaly>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grouping: Option<GroupBreakdown>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trends: Vec<TrendSeries>,
}

impl AggregateReport {
    /// Statistics for a field.
    pub fn stats(&self, field: &str) -> Option<&FieldStats> {
        self.fields.iter().find(|s| s.field == field)
    }
}
