//! Spreadsheet output.

use std::path::Path;

use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};

use super::records::{format_line_items, record_columns};
use crate::error::ExportError;
use crate::extraction::PatternSet;
use crate::models::record::{BatchResult, FieldValue, Record};

/// Write `records.xlsx` with a `Records` sheet and a `Failures` sheet.
pub fn write_records_xlsx(
    path: &Path,
    batch: &BatchResult,
    patterns: &PatternSet,
) -> Result<(), ExportError> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();

    let records = workbook.add_worksheet();
    records.set_name("Records")?;
    write_records_sheet(records, &header, batch, patterns)?;

    let failures = workbook.add_worksheet();
    failures.set_name("Failures")?;
    failures.write_string_with_format(0, 0, "filename", &header)?;
    failures.write_string_with_format(0, 1, "reason", &header)?;
    for (i, failure) in batch.failures.iter().enumerate() {
        let row = i as u32 + 1;
        failures.write_string(row, 0, &failure.filename)?;
        failures.write_string(row, 1, &failure.reason)?;
    }

    workbook.save(path)?;
    Ok(())
}

fn write_records_sheet(
    sheet: &mut Worksheet,
    header: &Format,
    batch: &BatchResult,
    patterns: &PatternSet,
) -> Result<(), XlsxError> {
    let money = Format::new().set_num_format("#,##0.00");
    let ratio = Format::new().set_num_format("0.00");

    for (col, name) in record_columns(patterns).iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, name, header)?;
    }

    let has_line_items = patterns.line_item().is_some();

    for (i, record) in batch.records.iter().enumerate() {
        let row = i as u32 + 1;
        let mut col: u16 = 0;

        sheet.write_string(row, col, &record.source)?;
        col += 1;

        for field in patterns.field_names() {
            write_value(sheet, row, col, record, field, &money)?;
            col += 1;
        }

        if has_line_items {
            sheet.write_string(row, col, format_line_items(&record.line_items))?;
            col += 1;
        }

        sheet.write_number_with_format(row, col, record.completeness, &ratio)?;
    }

    Ok(())
}

fn write_value(
    sheet: &mut Worksheet,
    row: u32,
    col: u16,
    record: &Record,
    field: &str,
    money: &Format,
) -> Result<(), XlsxError> {
    let Some(extracted) = record.get(field) else {
        return Ok(());
    };

    match &extracted.value {
        FieldValue::Currency(_) => {
            if let Some(v) = extracted.value.as_f64() {
                sheet.write_number_with_format(row, col, v, money)?;
            }
        }
        FieldValue::Number(_) | FieldValue::Integer(_) => {
            if let Some(v) = extracted.value.as_f64() {
                sheet.write_number(row, col, v)?;
            }
        }
        FieldValue::Date(_) | FieldValue::Text(_) => {
            sheet.write_string(row, col, extracted.value.to_string())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::{DocumentType, FailedFile};

    #[test]
    fn test_writes_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.xlsx");
        let set = PatternSet::builtin(DocumentType::Invoice).unwrap();

        let mut batch = BatchResult::new(DocumentType::Invoice);
        batch.failures.push(FailedFile {
            filename: "bad.pdf".to_string(),
            reason: "failed to parse PDF".to_string(),
        });

        write_records_xlsx(&path, &batch, &set).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn test_unwritable_path_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("records.xlsx");
        let set = PatternSet::builtin(DocumentType::Report).unwrap();
        let batch = BatchResult::new(DocumentType::Report);

        assert!(write_records_xlsx(&path, &batch, &set).is_err());
    }
}
