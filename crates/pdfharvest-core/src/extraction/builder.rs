//! Record construction from per-page field matches.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use super::coerce::coerce;
use super::extractor::{FieldExtractor, FieldMatches};
use super::patterns::PatternSet;
use crate::models::config::{ExtractionConfig, default_date_formats};
use crate::models::record::{Confidence, ExtractedField, LineItem, Record};
use crate::pdf::PdfPage;

/// Builds typed records from extracted matches.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    date_formats: Vec<String>,
}

impl RecordBuilder {
    /// Create a builder with the default date formats.
    pub fn new() -> Self {
        Self {
            date_formats: default_date_formats(),
        }
    }

    /// Create a builder from extraction configuration.
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new().with_date_formats(config.date_formats.clone())
    }

    /// Set the chrono formats tried for date fields.
    pub fn with_date_formats(mut self, formats: Vec<String>) -> Self {
        if !formats.is_empty() {
            self.date_formats = formats;
        }
        self
    }

    /// Run the extractor over every page and build the record.
    pub fn build_from_pages(
        &self,
        source: &str,
        pages: &[PdfPage],
        patterns: &PatternSet,
    ) -> Record {
        let extractor = FieldExtractor::new(patterns);

        let page_matches: Vec<FieldMatches> = pages
            .iter()
            .map(|page| extractor.extract(&page.text, page.number))
            .collect();

        let line_items: Vec<LineItem> = pages
            .iter()
            .flat_map(|page| extractor.extract_line_items(&page.text))
            .collect();

        self.build(
            source,
            pages.len() as u32,
            merge_pages(page_matches),
            line_items,
            patterns,
        )
    }

    /// Coerce merged matches into a record.
    pub fn build(
        &self,
        source: &str,
        page_count: u32,
        matches: FieldMatches,
        line_items: Vec<LineItem>,
        patterns: &PatternSet,
    ) -> Record {
        let mut fields = BTreeMap::new();
        let mut missing = Vec::new();

        for pattern in patterns.patterns() {
            let Some(m) = matches.get(&pattern.field) else {
                if pattern.required {
                    debug!("{}: required field {} not found", source, pattern.field);
                }
                missing.push(pattern.field.clone());
                continue;
            };

            match coerce(&m.raw, pattern.value_type, &self.date_formats) {
                Ok(value) => {
                    fields.insert(
                        pattern.field.clone(),
                        ExtractedField {
                            field: pattern.field.clone(),
                            raw: m.raw.clone(),
                            value,
                            confidence: m.confidence,
                        },
                    );
                }
                Err(e) => {
                    warn!("{}: dropping field {}: {}", source, pattern.field, e);
                    missing.push(pattern.field.clone());
                }
            }
        }

        let scored = patterns.scored_fields();
        let present = scored.iter().filter(|f| fields.contains_key(**f)).count();
        let completeness = if scored.is_empty() {
            0.0
        } else {
            present as f64 / scored.len() as f64
        };

        debug!(
            "{}: {}/{} scored fields, {} extracted, {} line items",
            source,
            present,
            scored.len(),
            fields.len(),
            line_items.len()
        );

        Record {
            source: source.to_string(),
            document_type: patterns.document_type(),
            page_count,
            fields,
            missing,
            line_items,
            completeness,
        }
    }
}

impl Default for RecordBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Merge per-page matches. The earliest page wins, except that a later
/// high-confidence match replaces an earlier low-confidence one.
pub fn merge_pages(pages: Vec<FieldMatches>) -> FieldMatches {
    let mut merged = FieldMatches::new();

    for page in pages {
        for (field, m) in page {
            let replace = match merged.get(&field) {
                None => true,
                Some(existing) => {
                    existing.confidence == Confidence::Low && m.confidence == Confidence::High
                }
            };
            if replace {
                merged.insert(field, m);
            }
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::{FieldMatch, PatternDef, PatternSetDef};
    use crate::models::record::{DocumentType, FieldValue, ValueType};
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn page(number: u32, text: &str) -> PdfPage {
        PdfPage {
            number,
            text: text.to_string(),
        }
    }

    fn field_match(field: &str, raw: &str, confidence: Confidence, page: u32) -> FieldMatch {
        FieldMatch {
            field: field.to_string(),
            raw: raw.to_string(),
            confidence,
            pattern_index: if confidence == Confidence::High { 0 } else { 1 },
            page,
        }
    }

    #[test]
    fn test_complete_record_has_full_completeness() {
        let set = PatternSet::builtin(DocumentType::Invoice).unwrap();
        let text = "Vendor: ACME Corp\n\
            Invoice #: INV-7\n\
            Date: 03/18/2023\n\
            Due Date: 04/18/2023\n\
            Subtotal: $100.00\n\
            Tax: $7.00\n\
            Total: $107.00\n";

        let record = RecordBuilder::new().build_from_pages("a.pdf", &[page(1, text)], &set);

        assert_eq!(record.completeness, 1.0);
        assert!(record.missing.is_empty());
        assert!(record.fields.values().all(|f| f.confidence == Confidence::High));
        assert_eq!(
            record.get("total_amount").unwrap().value,
            FieldValue::Currency(Decimal::from_str("107.00").unwrap())
        );
    }

    #[test]
    fn test_required_fields_on_first_pattern_give_full_completeness() {
        let set = PatternSet::builtin(DocumentType::Invoice).unwrap();
        let text = "Vendor: ACME Corp\nInvoice #: INV-7\nDate: 03/18/2023\nTotal: $107.00\n";

        let record = RecordBuilder::new().build_from_pages("a.pdf", &[page(1, text)], &set);

        assert_eq!(record.completeness, 1.0);
        for field in set.scored_fields() {
            assert_eq!(record.get(field).unwrap().confidence, Confidence::High, "{}", field);
        }
        assert!(record.fields.values().all(|f| f.confidence == Confidence::High));
        assert!(record.missing.contains(&"tax".to_string()));
    }

    #[test]
    fn test_completeness_without_required_fields_counts_declared() {
        let def = PatternSetDef {
            fields: vec![
                PatternDef {
                    field: "title".to_string(),
                    patterns: vec![r"Title: (.+)".to_string()],
                    value_type: ValueType::String,
                    required: false,
                },
                PatternDef {
                    field: "amount".to_string(),
                    patterns: vec![r"Amount: (\S+)".to_string()],
                    value_type: ValueType::Currency,
                    required: false,
                },
            ],
            line_item: None,
        };
        let set = PatternSet::compile(DocumentType::Report, &def).unwrap();

        let record = RecordBuilder::new().build_from_pages("r.pdf", &[page(1, "Title: Q1")], &set);
        assert_eq!(record.completeness, 0.5);
    }

    #[test]
    fn test_partial_decimal_amount_is_kept_whole() {
        let set = PatternSet::builtin(DocumentType::Invoice).unwrap();
        let text = "Vendor: ACME Corp\nInvoice #: INV-8\nDate: 03/18/2023\nTotal: $1234.5\n";

        let record = RecordBuilder::new().build_from_pages("b.pdf", &[page(1, text)], &set);

        assert_eq!(
            record.get("total_amount").unwrap().value,
            FieldValue::Currency(Decimal::from_str("1234.5").unwrap())
        );
    }

    #[test]
    fn test_missing_required_field_lowers_completeness() {
        let set = PatternSet::builtin(DocumentType::Invoice).unwrap();
        let text = "Vendor: ACME Corp\nDate: 03/18/2023\nTotal: $107.00\n";

        let record = RecordBuilder::new().build_from_pages("b.pdf", &[page(1, text)], &set);

        assert!(record.get("invoice_number").is_none());
        assert!(record.missing.contains(&"invoice_number".to_string()));
        assert!(record.completeness < 1.0);
    }

    #[test]
    fn test_coercion_failure_demotes_field() {
        let set = PatternSet::builtin(DocumentType::Invoice).unwrap();
        let text = "Vendor: ACME Corp\nInvoice #: INV-9\nDate: 13/45/2023\nTotal: $5.00\n";

        let record = RecordBuilder::new().build_from_pages("c.pdf", &[page(1, text)], &set);

        assert!(record.get("date").is_none());
        assert!(record.missing.contains(&"date".to_string()));
        assert!(record.get("total_amount").is_some());
    }

    #[test]
    fn test_fields_merge_across_pages() {
        let set = PatternSet::builtin(DocumentType::Invoice).unwrap();
        let pages = [
            page(1, "Vendor: ACME Corp\nInvoice #: INV-1\nDate: 03/18/2023"),
            page(2, "Widget 2 $5.00 $10.00\nTotal: $10.00"),
        ];

        let record = RecordBuilder::new().build_from_pages("d.pdf", &pages, &set);

        assert_eq!(record.page_count, 2);
        assert!(record.get("invoice_number").is_some());
        assert!(record.get("total_amount").is_some());
        assert_eq!(record.line_items.len(), 1);
    }

    #[test]
    fn test_merge_prefers_high_confidence() {
        let first = FieldMatches::from([(
            "vendor".to_string(),
            field_match("vendor", "Page header", Confidence::Low, 1),
        )]);
        let second = FieldMatches::from([(
            "vendor".to_string(),
            field_match("vendor", "ACME Corp", Confidence::High, 2),
        )]);
        let third = FieldMatches::from([(
            "vendor".to_string(),
            field_match("vendor", "Other", Confidence::High, 3),
        )]);

        let merged = merge_pages(vec![first, second, third]);
        assert_eq!(merged["vendor"].raw, "ACME Corp");
        assert_eq!(merged["vendor"].page, 2);
    }

    #[test]
    fn test_record_only_has_declared_fields() {
        let set = PatternSet::builtin(DocumentType::Report).unwrap();
        let matches = FieldMatches::from([
            ("title".to_string(), field_match("title", "Q1", Confidence::High, 1)),
            ("invented".to_string(), field_match("invented", "x", Confidence::High, 1)),
        ]);

        let record = RecordBuilder::new().build("e.pdf", 1, matches, Vec::new(), &set);
        assert!(record.get("title").is_some());
        assert!(record.get("invented").is_none());
    }
}
