//! Output targets: CSV, spreadsheet and JSON files.
//!
//! Every target is written independently. A failure in one target is
//! reported in its [`ExportOutcome`] and does not stop the others.

mod json;
mod records;
mod workbook;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::ExportError;
use crate::extraction::PatternSet;
use crate::models::config::OutputConfig;
use crate::models::record::BatchResult;
use crate::models::report::AggregateReport;

pub use json::write_json;
pub use records::{record_columns, write_records_csv};
pub use workbook::write_records_xlsx;

/// A data output target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// `records.csv`
    Csv,
    /// `records.xlsx`
    Xlsx,
    /// `data.json`
    Data,
    /// `analysis.json`
    Analysis,
}

impl Target {
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Csv => "records.csv",
            Self::Xlsx => "records.xlsx",
            Self::Data => "data.json",
            Self::Analysis => "analysis.json",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Result of writing one target.
#[derive(Debug)]
pub struct ExportOutcome {
    pub target: Target,
    pub path: PathBuf,
    pub result: Result<(), ExportError>,
}

impl ExportOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Create the output directory if needed.
pub fn ensure_dir(dir: &Path) -> Result<(), ExportError> {
    fs::create_dir_all(dir).map_err(|source| ExportError::Io {
        path: dir.to_path_buf(),
        source,
    })
}

/// Writes the enabled data targets into an output directory.
pub struct Exporter<'a> {
    dir: PathBuf,
    patterns: &'a PatternSet,
    config: OutputConfig,
}

impl<'a> Exporter<'a> {
    pub fn new(dir: impl Into<PathBuf>, patterns: &'a PatternSet) -> Self {
        Self {
            dir: dir.into(),
            patterns,
            config: OutputConfig::default(),
        }
    }

    pub fn with_config(mut self, config: OutputConfig) -> Self {
        self.config = config;
        self
    }

    /// Targets enabled by the configuration, in write order.
    pub fn targets(&self) -> Vec<Target> {
        let mut targets = Vec::new();
        if self.config.csv {
            targets.push(Target::Csv);
        }
        if self.config.xlsx {
            targets.push(Target::Xlsx);
        }
        if self.config.json {
            targets.push(Target::Data);
            targets.push(Target::Analysis);
        }
        targets
    }

    /// Write every enabled target.
    pub fn export(&self, batch: &BatchResult, report: &AggregateReport) -> Vec<ExportOutcome> {
        self.targets()
            .into_iter()
            .map(|target| {
                let path = self.dir.join(target.file_name());
                let result = match target {
                    Target::Csv => write_records_csv(&path, batch, self.patterns),
                    Target::Xlsx => write_records_xlsx(&path, batch, self.patterns),
                    Target::Data => write_json(&path, batch),
                    Target::Analysis => write_json(&path, report),
                };

                match &result {
                    Ok(()) => info!("Wrote {}", path.display()),
                    Err(e) => warn!("Failed to write {}: {}", path.display(), e),
                }

                ExportOutcome {
                    target,
                    path,
                    result,
                }
            })
            .collect()
    }
}
