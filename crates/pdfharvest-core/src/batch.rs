//! Batch processing of a directory of PDF files.

use std::path::{Path, PathBuf};
use std::time::Instant;

use glob::{MatchOptions, Pattern, glob_with};
use tracing::{debug, info, warn};

use crate::error::{FileError, HarvestError, Result};
use crate::extraction::{PatternSet, RecordBuilder};
use crate::models::record::{BatchResult, FailedFile, Record};
use crate::pdf::read_pdf;

/// Outcome of one file, reported to progress callbacks.
#[derive(Debug, Clone, Copy)]
pub enum FileOutcome<'a> {
    Record(&'a Record),
    Failed(&'a FailedFile),
}

/// Turns a directory of PDFs into a [`BatchResult`].
pub struct BatchProcessor<'a> {
    patterns: &'a PatternSet,
    builder: RecordBuilder,
}

impl<'a> BatchProcessor<'a> {
    pub fn new(patterns: &'a PatternSet, builder: RecordBuilder) -> Self {
        Self { patterns, builder }
    }

    /// List the PDF files in a directory (extension matched case-insensitively).
    pub fn discover(dir: &Path) -> Result<Vec<PathBuf>> {
        if !dir.is_dir() {
            return Err(HarvestError::Config(format!(
                "input directory not found: {}",
                dir.display()
            )));
        }

        let pattern = format!("{}/*.pdf", Pattern::escape(&dir.to_string_lossy()));
        let options = MatchOptions {
            case_sensitive: false,
            ..MatchOptions::new()
        };

        let files: Vec<PathBuf> = glob_with(&pattern, options)
            .map_err(|e| HarvestError::Config(e.to_string()))?
            .filter_map(|r| r.ok())
            .filter(|p| p.is_file())
            .collect();

        debug!("Found {} PDF files in {}", files.len(), dir.display());
        Ok(files)
    }

    /// Extract one file into a record.
    pub fn process_file(&self, path: &Path) -> std::result::Result<Record, FileError> {
        let content = read_pdf(path)?;
        let source = file_name(path);

        let record = self
            .builder
            .build_from_pages(&source, &content.pages, self.patterns);

        if record.fields.is_empty() {
            return Err(FileError::NoFields);
        }
        Ok(record)
    }

    /// Process every PDF in a directory.
    pub fn process_dir(&self, dir: &Path) -> Result<BatchResult> {
        self.process_dir_with(dir, |_, _| {})
    }

    /// Process every PDF in a directory, calling `on_file` after each one.
    pub fn process_dir_with<F>(&self, dir: &Path, on_file: F) -> Result<BatchResult>
    where
        F: FnMut(&Path, FileOutcome<'_>),
    {
        let files = Self::discover(dir)?;
        Ok(self.process_files(&files, on_file))
    }

    /// Process the given files in order. Never fails as a whole.
    pub fn process_files<F>(&self, files: &[PathBuf], mut on_file: F) -> BatchResult
    where
        F: FnMut(&Path, FileOutcome<'_>),
    {
        let start = Instant::now();
        let mut result = BatchResult::new(self.patterns.document_type());

        for path in files {
            debug!("Processing {}", path.display());

            match self.process_file(path) {
                Ok(record) => {
                    result.records.push(record);
                    if let Some(record) = result.records.last() {
                        on_file(path, FileOutcome::Record(record));
                    }
                }
                Err(e) => {
                    warn!("Failed to process {}: {}", path.display(), e);
                    result.failures.push(FailedFile {
                        filename: file_name(path),
                        reason: e.to_string(),
                    });
                    if let Some(failure) = result.failures.last() {
                        on_file(path, FileOutcome::Failed(failure));
                    }
                }
            }
        }

        info!(
            "Processed {} files ({} records, {} failed) in {:?}",
            result.total(),
            result.records.len(),
            result.failures.len(),
            start.elapsed()
        );

        result
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
