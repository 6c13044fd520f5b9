//! Pattern-based field extraction from page text.

use std::collections::BTreeMap;

use regex::{Captures, Regex};
use rust_decimal::Decimal;
use tracing::trace;

use super::coerce::parse_amount;
use super::patterns::{ExtractionPattern, PatternSet};
use crate::models::record::{Confidence, LineItem};

/// Raw match for one field, before type coercion.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMatch {
    /// Field name.
    pub field: String,
    /// Captured text.
    pub raw: String,
    /// High when the first candidate matched.
    pub confidence: Confidence,
    /// Index of the candidate pattern that matched.
    pub pattern_index: usize,
    /// Page the match came from (1-indexed, 0 when unknown).
    pub page: u32,
}

/// Field matches keyed by field name.
pub type FieldMatches = BTreeMap<String, FieldMatch>;

/// Applies a pattern set to text. Holds no state beyond the borrowed set.
pub struct FieldExtractor<'a> {
    patterns: &'a PatternSet,
}

impl<'a> FieldExtractor<'a> {
    pub fn new(patterns: &'a PatternSet) -> Self {
        Self { patterns }
    }

    /// Extract every declared field from one page of text. Fields without a
    /// match are left out.
    pub fn extract(&self, text: &str, page: u32) -> FieldMatches {
        let mut matches = FieldMatches::new();

        for pattern in self.patterns.patterns() {
            if let Some(m) = match_field(pattern, text, page) {
                trace!(
                    "{} matched candidate #{} on page {}: {:?}",
                    m.field, m.pattern_index, page, m.raw
                );
                matches.insert(m.field.clone(), m);
            }
        }

        matches
    }

    /// Extract line items from one page of text.
    pub fn extract_line_items(&self, text: &str) -> Vec<LineItem> {
        match self.patterns.line_item() {
            Some(re) => parse_line_items(re, text),
            None => Vec::new(),
        }
    }
}

/// Named group marking a match to skip. `(?P<exclude>Due\s+)?Date` consumes
/// "Due Date" as a skipped match and scanning continues after it.
const EXCLUDE_GROUP: &str = "exclude";

/// Try a field's candidates in order and return the first non-empty capture.
pub fn match_field(pattern: &ExtractionPattern, text: &str, page: u32) -> Option<FieldMatch> {
    pattern
        .candidates
        .iter()
        .enumerate()
        .find_map(|(index, re)| {
            let raw = re
                .captures_iter(text)
                .filter(|caps| caps.name(EXCLUDE_GROUP).is_none())
                .find_map(|caps| capture_value(&caps))?;
            Some(FieldMatch {
                field: pattern.field.clone(),
                raw,
                confidence: if index == 0 {
                    Confidence::High
                } else {
                    Confidence::Low
                },
                pattern_index: index,
                page,
            })
        })
}

/// The named group `value`, else group 1, else the whole match.
fn capture_value(caps: &Captures<'_>) -> Option<String> {
    let m = caps
        .name("value")
        .or_else(|| caps.get(1))
        .or_else(|| caps.get(0))?;
    let value = m.as_str().trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn parse_line_items(re: &Regex, text: &str) -> Vec<LineItem> {
    re.captures_iter(text)
        .filter_map(|caps| {
            let description = caps.name("description")?.as_str().trim().to_string();
            let amount = parse_amount(caps.name("amount")?.as_str()).ok()?;
            let quantity = caps
                .name("quantity")
                .and_then(|m| parse_amount(m.as_str()).ok())
                .unwrap_or(Decimal::ONE);
            let unit_price = caps
                .name("unit_price")
                .and_then(|m| parse_amount(m.as_str()).ok());

            if description.is_empty() {
                return None;
            }

            Some(LineItem {
                description,
                quantity,
                unit_price,
                amount,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::DocumentType;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    const INVOICE: &str = "ACME Corp\n\
        123 Business Ave\n\
        Invoice #: INV-2023-001\n\
        Date: 03/18/2023\n\
        Due Date: 04/18/2023\n\
        Professional Services 10 $150.00 $1,500.00\n\
        Software License 1 $2,000.00 $2,000.00\n\
        Subtotal: $3,500.00\n\
        Tax (7%): $245.00\n\
        Total: $3,745.00\n";

    fn invoice_set() -> PatternSet {
        PatternSet::builtin(DocumentType::Invoice).unwrap()
    }

    #[test]
    fn test_extract_invoice_fields() {
        let set = invoice_set();
        let matches = FieldExtractor::new(&set).extract(INVOICE, 1);

        assert_eq!(matches["invoice_number"].raw, "INV-2023-001");
        assert_eq!(matches["date"].raw, "03/18/2023");
        assert_eq!(matches["due_date"].raw, "04/18/2023");
        assert_eq!(matches["subtotal"].raw, "3,500.00");
        assert_eq!(matches["tax"].raw, "245.00");
        assert_eq!(matches["total_amount"].raw, "3,745.00");
        assert_eq!(matches["total_amount"].confidence, Confidence::High);
    }

    #[test]
    fn test_vendor_falls_back_to_first_line() {
        let set = invoice_set();
        let matches = FieldExtractor::new(&set).extract(INVOICE, 1);

        let vendor = &matches["vendor"];
        assert_eq!(vendor.raw, "ACME Corp");
        assert_eq!(vendor.confidence, Confidence::Low);
        assert_eq!(vendor.pattern_index, 1);
    }

    #[test]
    fn test_labelled_vendor_is_high_confidence() {
        let set = invoice_set();
        let text = "INVOICE\nVendor: Globex Ltd\nTotal: $10.00";
        let matches = FieldExtractor::new(&set).extract(text, 1);

        assert_eq!(matches["vendor"].raw, "Globex Ltd");
        assert_eq!(matches["vendor"].confidence, Confidence::High);
    }

    #[test]
    fn test_total_falls_back_to_dollar_amount() {
        let set = invoice_set();
        let text = "Globex Ltd\nPlease pay $1,234.50 by Friday";
        let matches = FieldExtractor::new(&set).extract(text, 1);

        let total = &matches["total_amount"];
        assert_eq!(total.raw, "1,234.50");
        assert_eq!(total.confidence, Confidence::Low);
        assert_eq!(total.pattern_index, 2);
    }

    #[test]
    fn test_subtotal_is_not_taken_as_total() {
        let set = invoice_set();
        let text = "Subtotal: $90.00\nTotal: $99.00";
        let matches = FieldExtractor::new(&set).extract(text, 1);

        assert_eq!(matches["total_amount"].raw, "99.00");
    }

    #[test]
    fn test_spaced_sub_total_is_not_taken_as_total() {
        let set = invoice_set();
        let text = "Sub Total: $90.00\nTotal: $99.00";
        let matches = FieldExtractor::new(&set).extract(text, 1);

        assert_eq!(matches["total_amount"].raw, "99.00");
        assert_eq!(matches["total_amount"].confidence, Confidence::High);
    }

    #[test]
    fn test_amounts_are_captured_whole() {
        let set = invoice_set();
        let pattern = set.field("total_amount").unwrap();

        for (text, expected) in [
            ("Total: 1.234,56 EUR", "1.234,56"),
            ("Total: $1234.5", "1234.5"),
            ("Total: 1 234,56 EUR", "1 234,56"),
            ("Total: $1,250.50.", "1,250.50"),
        ] {
            let m = match_field(pattern, text, 1).unwrap();
            assert_eq!(m.raw, expected, "{}", text);
        }
    }

    #[test]
    fn test_due_date_is_not_taken_as_invoice_date() {
        let set = invoice_set();
        let text = "Due Date: 04/18/2023\nInvoice Date: 03/18/2023";
        let matches = FieldExtractor::new(&set).extract(text, 1);

        assert_eq!(matches["date"].raw, "03/18/2023");
        assert_eq!(matches["date"].confidence, Confidence::High);
        assert_eq!(matches["due_date"].raw, "04/18/2023");
    }

    #[test]
    fn test_missing_fields_are_omitted() {
        let set = invoice_set();
        let matches = FieldExtractor::new(&set).extract("Globex Ltd\nThank you", 1);

        assert!(matches.contains_key("vendor"));
        assert!(!matches.contains_key("total_amount"));
        assert!(!matches.contains_key("invoice_number"));
    }

    #[test]
    fn test_line_items() {
        let set = invoice_set();
        let items = FieldExtractor::new(&set).extract_line_items(INVOICE);

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].description, "Professional Services");
        assert_eq!(items[0].quantity, Decimal::from(10));
        assert_eq!(items[0].unit_price, Some(Decimal::from_str("150.00").unwrap()));
        assert_eq!(items[0].amount, Decimal::from_str("1500.00").unwrap());
        assert_eq!(items[1].description, "Software License");
    }

    #[test]
    fn test_report_fields() {
        let set = PatternSet::builtin(DocumentType::Report).unwrap();
        let text = "Financial Performance Report\n\
            Date: 03/18/2023\n\
            Report ID: REP-2023-Q1\n\
            Executive Summary:\n\
            Strong revenue growth this quarter\n\
            with improved margins.\n\
            \n\
            Key Metrics:\n\
            Revenue: $4,250,000\n\
            Net Profit: $825,000\n\
            Profit Margin: 19.4%\n\
            Operating Expenses: $1,125,000\n\
            Customer Count: 16,800\n";
        let matches = FieldExtractor::new(&set).extract(text, 1);

        assert_eq!(matches["title"].raw, "Financial Performance Report");
        assert_eq!(matches["report_id"].raw, "REP-2023-Q1");
        assert_eq!(
            matches["summary"].raw,
            "Strong revenue growth this quarter\nwith improved margins."
        );
        assert_eq!(matches["revenue"].raw, "4,250,000");
        assert_eq!(matches["net_profit"].raw, "825,000");
        assert_eq!(matches["profit_margin"].raw, "19.4%");
        assert_eq!(matches["operating_expenses"].raw, "1,125,000");
        assert_eq!(matches["customer_count"].raw, "16,800");
    }
}
