//! JSON output for `data.json` and `analysis.json`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::error::ExportError;

/// Write a value as pretty-printed JSON.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ExportError> {
    let io_error = |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(io_error)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.write_all(b"\n").map_err(io_error)?;
    writer.flush().map_err(io_error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::{PatternSet, RecordBuilder};
    use crate::models::record::{BatchResult, DocumentType, FailedFile};
    use crate::pdf::PdfPage;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_batch_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        let set = PatternSet::builtin(DocumentType::Report).unwrap();
        let page = PdfPage {
            number: 1,
            text: "Quarterly Report\nDate: March 31, 2023\nRevenue: $1,200,000.00\n\
                   Profit Margin: 12.5%\nCustomers: 340\n"
                .to_string(),
        };

        let mut batch = BatchResult::new(DocumentType::Report);
        batch
            .records
            .push(RecordBuilder::new().build_from_pages("q1.pdf", &[page], &set));
        batch.failures.push(FailedFile {
            filename: "scan.pdf".to_string(),
            reason: "no fields matched".to_string(),
        });

        write_json(&path, &batch).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let back: BatchResult = serde_json::from_str(&text).unwrap();

        assert_eq!(back.document_type, batch.document_type);
        assert_eq!(back.records[0].fields, batch.records[0].fields);
        assert_eq!(back.records[0].missing, batch.records[0].missing);
        assert_eq!(back.failures, batch.failures);
        assert!((back.records[0].completeness - batch.records[0].completeness).abs() < 1e-9);
    }
}
