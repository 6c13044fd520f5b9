//! Flat per-record rows and the CSV writer.

use std::path::Path;

use crate::error::ExportError;
use crate::extraction::PatternSet;
use crate::models::record::{BatchResult, LineItem, Record};

/// Column holding the source file name.
pub(crate) const SOURCE_COLUMN: &str = "source";
/// Column holding the rendered line items.
pub(crate) const LINE_ITEMS_COLUMN: &str = "line_items";
/// Column holding the completeness ratio.
pub(crate) const COMPLETENESS_COLUMN: &str = "completeness";

/// Header row: source, declared fields, line items (when the set scans for
/// them), completeness.
pub fn record_columns(patterns: &PatternSet) -> Vec<String> {
    let mut columns = vec![SOURCE_COLUMN.to_string()];
    columns.extend(patterns.field_names().map(str::to_string));
    if patterns.line_item().is_some() {
        columns.push(LINE_ITEMS_COLUMN.to_string());
    }
    columns.push(COMPLETENESS_COLUMN.to_string());
    columns
}

/// Text cells for one record, aligned with [`record_columns`].
pub(crate) fn record_row(record: &Record, patterns: &PatternSet) -> Vec<String> {
    let mut row = vec![record.source.clone()];
    row.extend(patterns.field_names().map(|field| {
        record
            .get(field)
            .map(|f| f.value.to_string())
            .unwrap_or_default()
    }));
    if patterns.line_item().is_some() {
        row.push(format_line_items(&record.line_items));
    }
    row.push(format!("{:.2}", record.completeness));
    row
}

/// Render line items as `description qty x unit_price = amount` joined by `; `.
pub(crate) fn format_line_items(items: &[LineItem]) -> String {
    items
        .iter()
        .map(|item| match item.unit_price {
            Some(price) => format!(
                "{} {} x {:.2} = {:.2}",
                item.description, item.quantity, price, item.amount
            ),
            None => format!("{} {} = {:.2}", item.description, item.quantity, item.amount),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Write `records.csv`.
pub fn write_records_csv(
    path: &Path,
    batch: &BatchResult,
    patterns: &PatternSet,
) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record(record_columns(patterns))?;
    for record in &batch.records {
        wtr.write_record(record_row(record, patterns))?;
    }

    wtr.flush().map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::RecordBuilder;
    use crate::models::record::DocumentType;
    use crate::pdf::PdfPage;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    fn record(set: &PatternSet, text: &str) -> Record {
        let page = PdfPage {
            number: 1,
            text: text.to_string(),
        };
        RecordBuilder::new().build_from_pages("inv.pdf", &[page], set)
    }

    #[test]
    fn test_invoice_columns() {
        let set = PatternSet::builtin(DocumentType::Invoice).unwrap();
        let columns = record_columns(&set);

        assert_eq!(columns.first().map(String::as_str), Some("source"));
        assert_eq!(columns.last().map(String::as_str), Some("completeness"));
        assert!(columns.contains(&"line_items".to_string()));
        assert_eq!(columns[1], "invoice_number");
    }

    #[test]
    fn test_report_columns_have_no_line_items() {
        let set = PatternSet::builtin(DocumentType::Report).unwrap();
        assert!(!record_columns(&set).contains(&"line_items".to_string()));
    }

    #[test]
    fn test_csv_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.csv");
        let set = PatternSet::builtin(DocumentType::Invoice).unwrap();

        let mut batch = BatchResult::new(DocumentType::Invoice);
        batch.records.push(record(
            &set,
            "Vendor: ACME Corp\nInvoice #: INV-1\nDate: 03/18/2023\nTotal: $1,250.50\n",
        ));

        write_records_csv(&path, &batch, &set).unwrap();

        let mut rdr = csv::Reader::from_path(&path).unwrap();
        let headers = rdr.headers().unwrap().clone();
        let row = rdr.records().next().unwrap().unwrap();

        let cell = |name: &str| {
            let i = headers.iter().position(|h| h == name).unwrap();
            row.get(i).unwrap().to_string()
        };

        assert_eq!(cell("source"), "inv.pdf");
        assert_eq!(cell("invoice_number"), "INV-1");
        assert_eq!(cell("date"), "2023-03-18");
        assert_eq!(cell("total_amount"), "1250.50");
        assert_eq!(cell("tax"), "");
    }

    #[test]
    fn test_format_line_items() {
        let items = vec![
            LineItem {
                description: "Widget".to_string(),
                quantity: Decimal::from(2),
                unit_price: Some(Decimal::from(5)),
                amount: Decimal::from(10),
            },
            LineItem {
                description: "Setup".to_string(),
                quantity: Decimal::ONE,
                unit_price: None,
                amount: Decimal::from(40),
            },
        ];

        assert_eq!(
            format_line_items(&items),
            "Widget 2 x 5.00 = 10.00; Setup 1 = 40.00"
        );
    }
}
