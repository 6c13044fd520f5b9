//! Configuration structures for the extraction pipeline.

use serde::{Deserialize, Serialize};

use crate::extraction::PatternSetDef;
use crate::models::record::DocumentType;

/// Main configuration for a pdfharvest run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Field extraction configuration.
    pub extraction: ExtractionConfig,

    /// Aggregation and anomaly detection configuration.
    pub analysis: AnalysisConfig,

    /// Output target configuration.
    pub output: OutputConfig,
}

/// Field extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// chrono format strings tried in order when reading dates.
    pub date_formats: Vec<String>,

    /// Replacement pattern set for invoices.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_patterns: Option<PatternSetDef>,

    /// Replacement pattern set for reports.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_patterns: Option<PatternSetDef>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            date_formats: default_date_formats(),
            invoice_patterns: None,
            report_patterns: None,
        }
    }
}

impl ExtractionConfig {
    /// Pattern set definition for a document type: the custom one if
    /// configured, the built-in one otherwise.
    pub fn pattern_set(&self, document_type: DocumentType) -> PatternSetDef {
        let custom = match document_type {
            DocumentType::Invoice => self.invoice_patterns.as_ref(),
            DocumentType::Report => self.report_patterns.as_ref(),
        };
        custom
            .cloned()
            .unwrap_or_else(|| document_type.default_pattern_set())
    }
}

/// Month-first numeric formats come before day-first ones; four-digit years
/// come before two-digit ones.
pub fn default_date_formats() -> Vec<String> {
    [
        "%m/%d/%Y", "%d/%m/%Y", "%m-%d-%Y", "%d-%m-%Y", "%m.%d.%Y", "%d.%m.%Y",
        "%Y-%m-%d", "%Y/%m/%d", "%B %d, %Y", "%b %d, %Y", "%d %B %Y", "%d %b %Y",
        "%m/%d/%y", "%d/%m/%y", "%m-%d-%y", "%d-%m-%y", "%m.%d.%y", "%d.%m.%y",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Aggregation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Deviation from the mean, in standard deviations, that flags an anomaly.
    pub anomaly_threshold: f64,

    /// Grouping keys for invoices, outermost first.
    pub invoice_group_by: Vec<String>,

    /// Grouping keys for reports, outermost first.
    pub report_group_by: Vec<String>,

    /// Compute monthly trends when the schema has a date field.
    pub trends: bool,

    /// Date field used for trends (default: first date field).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend_field: Option<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            anomaly_threshold: 2.0,
            invoice_group_by: vec!["vendor".to_string()],
            report_group_by: Vec::new(),
            trends: true,
            trend_field: None,
        }
    }
}

impl AnalysisConfig {
    /// Grouping keys for a document type.
    pub fn group_by(&self, document_type: DocumentType) -> &[String] {
        match document_type {
            DocumentType::Invoice => &self.invoice_group_by,
            DocumentType::Report => &self.report_group_by,
        }
    }

    /// Set the grouping keys for a document type.
    pub fn set_group_by(&mut self, document_type: DocumentType, keys: Vec<String>) {
        match document_type {
            DocumentType::Invoice => self.invoice_group_by = keys,
            DocumentType::Report => self.report_group_by = keys,
        }
    }
}

/// Output target configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Write `records.csv`.
    pub csv: bool,

    /// Write `records.xlsx`.
    pub xlsx: bool,

    /// Write `data.json` and `analysis.json`.
    pub json: bool,

    /// Render charts into `charts/`.
    pub charts: bool,

    /// Chart width in pixels.
    pub chart_width: u32,

    /// Chart height in pixels.
    pub chart_height: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            csv: true,
            xlsx: true,
            json: true,
            charts: true,
            chart_width: 1000,
            chart_height: 600,
        }
    }
}

impl HarvestConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}
