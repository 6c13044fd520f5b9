//! Pattern set definitions and compilation.
//!
//! A pattern set is declared as plain data ([`PatternSetDef`]) so it can be
//! loaded from configuration, and compiled once into a [`PatternSet`] at
//! startup. Compilation validates the whole set; a bad definition never
//! reaches document processing.

use std::collections::HashSet;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::PatternConfigError;
use crate::models::record::{DocumentType, ValueType};

/// Amount: space-grouped ("1 234,56") or any run of digits and separators
/// ending in a digit ("1,234.56", "1.234,56", "1234.5"). The run is taken
/// whole so coercion sees the full number.
const AMOUNT: &str = r"\d{1,3}(?:[ \x{a0}]\d{3})+(?:[.,]\d{1,2})?|\d(?:[\d.,]*\d)?";

/// Numeric date such as 03/18/2023, 18.03.23 or 3-18-2023.
const NUMERIC_DATE: &str = r"\d{1,2}[/.\-]\d{1,2}[/.\-]\d{2,4}";

/// Long date such as March 18, 2023.
const LONG_DATE: &str = r"[A-Za-z]{3,9}\.?\s+\d{1,2},?\s+\d{4}";

/// First non-empty line of the text.
const FIRST_LINE: &str = r"\A\s*(\S[^\n]*?)[ \t]*(?:\r?\n|\z)";

/// Declaration of one field: candidate patterns in priority order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternDef {
    /// Field name.
    pub field: String,
    /// Candidate regular expressions, first is primary. The value is the
    /// `value` named group, else group 1, else the whole match. Matches in
    /// which an `exclude` named group took part are skipped.
    pub patterns: Vec<String>,
    /// Declared value type.
    pub value_type: ValueType,
    /// Whether the field is expected in every document.
    #[serde(default)]
    pub required: bool,
}

impl PatternDef {
    fn new(field: &str, value_type: ValueType, required: bool, patterns: Vec<String>) -> Self {
        Self {
            field: field.to_string(),
            patterns,
            value_type,
            required,
        }
    }
}

/// Declaration of a whole pattern set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternSetDef {
    /// Fields in declaration order.
    pub fields: Vec<PatternDef>,
    /// Optional line-item row pattern with `description` and `amount`
    /// named groups, and optionally `quantity` and `unit_price`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_item: Option<String>,
}

impl DocumentType {
    /// Built-in pattern set for this document type.
    pub fn default_pattern_set(&self) -> PatternSetDef {
        match self {
            Self::Invoice => invoice_pattern_set(),
            Self::Report => report_pattern_set(),
        }
    }
}

fn invoice_pattern_set() -> PatternSetDef {
    PatternSetDef {
        fields: vec![
            PatternDef::new(
                "invoice_number",
                ValueType::String,
                true,
                vec![
                    r"(?i)\bInvoice\s*(?:#|No\.?|Number)\s*:?\s*([A-Z0-9][A-Z0-9\-/]*)".to_string(),
                    r"(?i)\bInvoice[^\S\n]*:?[^\S\n]*([A-Z0-9\-/]*\d[A-Z0-9\-/]*)".to_string(),
                    r"(?i)\b(INV[\-/]?\d[A-Z0-9\-/]*)".to_string(),
                ],
            ),
            PatternDef::new(
                "vendor",
                ValueType::String,
                true,
                vec![
                    r"(?im)^[^\S\n]*(?:From|Vendor|Seller|Supplier)[^\S\n]*:[^\S\n]*(\S[^\n]*?)[^\S\n]*$"
                        .to_string(),
                    FIRST_LINE.to_string(),
                ],
            ),
            PatternDef::new(
                "date",
                ValueType::Date,
                true,
                vec![
                    format!(
                        r"(?i)\b(?P<exclude>Due\s+)?(?:Invoice\s+)?Date\s*:?\s*(?P<value>{NUMERIC_DATE})"
                    ),
                    format!(
                        r"(?i)\b(?P<exclude>Due\s+)?(?:Invoice\s+)?Date\s*:?\s*(?P<value>{LONG_DATE})"
                    ),
                    r"(?i)\b(?P<exclude>Due\s+)?Dated?\s*:?\s*(?P<value>\d{4}-\d{2}-\d{2})".to_string(),
                ],
            ),
            PatternDef::new(
                "due_date",
                ValueType::Date,
                false,
                vec![
                    format!(r"(?i)\bDue\s+Date\s*:?\s*({NUMERIC_DATE})"),
                    format!(r"(?i)\b(?:Payment\s+)?Due\s+(?:by|on)\s*:?\s*({NUMERIC_DATE}|{LONG_DATE})"),
                ],
            ),
            PatternDef::new(
                "subtotal",
                ValueType::Currency,
                false,
                vec![format!(r"(?i)\bSub-?\s*total\s*:?\s*\$?\s*({AMOUNT})")],
            ),
            PatternDef::new(
                "tax",
                ValueType::Currency,
                false,
                vec![
                    format!(r"(?i)\b(?:Sales\s+)?Tax(?:\s*\([^)\n]*\))?\s*:\s*\$?\s*({AMOUNT})"),
                    format!(r"(?i)\bVAT(?:\s*\([^)\n]*\))?\s*:?\s*\$?\s*({AMOUNT})"),
                ],
            ),
            PatternDef::new(
                "total_amount",
                ValueType::Currency,
                true,
                vec![
                    format!(
                        r"(?i)\b(?P<exclude>Sub[^\S\n]*-?[^\S\n]*)?(?:Grand\s+|Invoice\s+)?Total(?:\s+(?:Due|Amount))?\s*:\s*\$?\s*(?P<value>{AMOUNT})"
                    ),
                    format!(r"(?i)\bAmount\s+Due\s*:?\s*\$?\s*({AMOUNT})"),
                    r"\$\s*(\d{1,3}(?:,\d{3})*\.\d{2})".to_string(),
                ],
            ),
        ],
        line_item: Some(
            r"(?m)^[^\S\n]*(?P<description>[A-Za-z][A-Za-z0-9 &'.,/\-]*?)[^\S\n]+(?P<quantity>\d+(?:\.\d+)?)[^\S\n]+\$?(?P<unit_price>[\d,]*\d\.\d{2})[^\S\n]+\$?(?P<amount>[\d,]*\d\.\d{2})[^\S\n]*$"
                .to_string(),
        ),
    }
}

fn report_pattern_set() -> PatternSetDef {
    PatternSetDef {
        fields: vec![
            PatternDef::new(
                "title",
                ValueType::String,
                true,
                vec![
                    r"(?im)^[^\S\n]*(?:Report\s+)?Title[^\S\n]*:[^\S\n]*(\S[^\n]*?)[^\S\n]*$".to_string(),
                    FIRST_LINE.to_string(),
                ],
            ),
            PatternDef::new(
                "date",
                ValueType::Date,
                true,
                vec![
                    format!(r"(?i)\b(?:Report\s+)?Date\s*:?\s*({NUMERIC_DATE})"),
                    format!(r"(?i)\b(?:Report\s+)?Date\s*:?\s*({LONG_DATE})"),
                    r"(?i)\bDated?\s*:?\s*(\d{4}-\d{2}-\d{2})".to_string(),
                ],
            ),
            PatternDef::new(
                "report_id",
                ValueType::String,
                false,
                vec![r"(?i)\bReport\s+(?:ID|No\.?|Number)\s*:?\s*([A-Z0-9][A-Z0-9\-/]*)".to_string()],
            ),
            PatternDef::new(
                "summary",
                ValueType::String,
                false,
                vec![
                    r"(?is)\b(?:Executive\s+Summary|Summary|Abstract)\s*:\s*(.+?)(?:\n[^\S\n]*\n|\n[^\S\n]*[A-Z][A-Za-z ]*:|\z)"
                        .to_string(),
                ],
            ),
            PatternDef::new(
                "revenue",
                ValueType::Currency,
                false,
                vec![
                    format!(r"(?i)\b(?:Total\s+)?Revenue\s*:\s*\$?\s*({AMOUNT})"),
                    format!(r"(?i)\bSales\s*:\s*\$?\s*({AMOUNT})"),
                ],
            ),
            PatternDef::new(
                "net_profit",
                ValueType::Currency,
                false,
                vec![
                    format!(r"(?i)\bNet\s+(?:Profit|Income)\s*:\s*\$?\s*(-?(?:{AMOUNT}))"),
                    format!(r"(?i)\bProfit\s*:\s*\$?\s*(-?(?:{AMOUNT}))"),
                ],
            ),
            PatternDef::new(
                "operating_expenses",
                ValueType::Currency,
                false,
                vec![
                    format!(r"(?i)\bOperating\s+Expenses\s*:\s*\$?\s*({AMOUNT})"),
                    format!(r"(?i)\bExpenses\s*:\s*\$?\s*({AMOUNT})"),
                ],
            ),
            PatternDef::new(
                "profit_margin",
                ValueType::Number,
                false,
                vec![r"(?i)\b(?:Profit\s+)?Margin\s*:\s*(-?\d+(?:\.\d+)?\s*%?)".to_string()],
            ),
            PatternDef::new(
                "customer_count",
                ValueType::Integer,
                false,
                vec![
                    r"(?i)\bCustomer\s+Count\s*:\s*(\d{1,3}(?:,\d{3})+|\d+)".to_string(),
                    r"(?i)\b(?:Total\s+)?Customers\s*:\s*(\d{1,3}(?:,\d{3})+|\d+)".to_string(),
                ],
            ),
        ],
        line_item: None,
    }
}

/// A compiled field declaration.
#[derive(Debug, Clone)]
pub struct ExtractionPattern {
    /// Field name.
    pub field: String,
    /// Candidate patterns in priority order.
    pub candidates: Vec<Regex>,
    /// Declared value type.
    pub value_type: ValueType,
    /// Whether the field is required.
    pub required: bool,
}

/// The compiled pattern set for one document type.
#[derive(Debug, Clone)]
pub struct PatternSet {
    document_type: DocumentType,
    patterns: Vec<ExtractionPattern>,
    line_item: Option<Regex>,
}

impl PatternSet {
    /// Compile and validate a pattern set definition.
    pub fn compile(
        document_type: DocumentType,
        def: &PatternSetDef,
    ) -> Result<Self, PatternConfigError> {
        if def.fields.is_empty() {
            return Err(PatternConfigError::Empty(document_type.to_string()));
        }

        let mut seen = HashSet::new();
        let mut patterns = Vec::with_capacity(def.fields.len());

        for (i, field_def) in def.fields.iter().enumerate() {
            let name = field_def.field.trim();
            if name.is_empty() {
                return Err(PatternConfigError::EmptyFieldName(i));
            }
            if !seen.insert(name.to_string()) {
                return Err(PatternConfigError::DuplicateField(name.to_string()));
            }
            if field_def.patterns.is_empty() {
                return Err(PatternConfigError::NoPatterns(name.to_string()));
            }

            let candidates = field_def
                .patterns
                .iter()
                .enumerate()
                .map(|(index, p)| {
                    Regex::new(p).map_err(|source| PatternConfigError::InvalidRegex {
                        field: name.to_string(),
                        index,
                        source,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            patterns.push(ExtractionPattern {
                field: name.to_string(),
                candidates,
                value_type: field_def.value_type,
                required: field_def.required,
            });
        }

        let line_item = match &def.line_item {
            Some(p) => {
                let re = Regex::new(p).map_err(|e| PatternConfigError::LineItem(e.to_string()))?;
                for group in ["description", "amount"] {
                    if !re.capture_names().flatten().any(|n| n == group) {
                        return Err(PatternConfigError::LineItem(format!(
                            "missing named group `{}`",
                            group
                        )));
                    }
                }
                Some(re)
            }
            None => None,
        };

        Ok(Self {
            document_type,
            patterns,
            line_item,
        })
    }

    /// Compile the built-in pattern set for a document type.
    pub fn builtin(document_type: DocumentType) -> Result<Self, PatternConfigError> {
        Self::compile(document_type, &document_type.default_pattern_set())
    }

    pub fn document_type(&self) -> DocumentType {
        self.document_type
    }

    /// Fields in declaration order.
    pub fn patterns(&self) -> &[ExtractionPattern] {
        &self.patterns
    }

    /// Declared field names in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|p| p.field.as_str())
    }

    /// Look up a field declaration.
    pub fn field(&self, name: &str) -> Option<&ExtractionPattern> {
        self.patterns.iter().find(|p| p.field == name)
    }

    /// Names of fields that take part in numeric statistics.
    pub fn numeric_fields(&self) -> Vec<&str> {
        self.patterns
            .iter()
            .filter(|p| p.value_type.is_numeric())
            .map(|p| p.field.as_str())
            .collect()
    }

    /// Fields completeness is measured against: the required fields, or
    /// every declared field when none is required.
    pub fn scored_fields(&self) -> Vec<&str> {
        let required: Vec<&str> = self
            .patterns
            .iter()
            .filter(|p| p.required)
            .map(|p| p.field.as_str())
            .collect();
        if required.is_empty() {
            self.field_names().collect()
        } else {
            required
        }
    }

    /// Names of date fields.
    pub fn date_fields(&self) -> Vec<&str> {
        self.patterns
            .iter()
            .filter(|p| p.value_type == ValueType::Date)
            .map(|p| p.field.as_str())
            .collect()
    }

    /// Line-item row pattern, if the set has one.
    pub fn line_item(&self) -> Option<&Regex> {
        self.line_item.as_ref()
    }

    /// Ensure a field referenced from configuration is declared.
    pub fn require_field(&self, field: &str, context: &str) -> Result<(), PatternConfigError> {
        if self.field(field).is_some() {
            Ok(())
        } else {
            Err(PatternConfigError::UnknownField {
                field: field.to_string(),
                context: context.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_sets_compile() {
        let invoice = PatternSet::builtin(DocumentType::Invoice).unwrap();
        assert!(invoice.field("total_amount").is_some());
        assert!(invoice.line_item().is_some());

        let report = PatternSet::builtin(DocumentType::Report).unwrap();
        assert!(report.field("title").is_some());
        assert!(report.line_item().is_none());
    }

    #[test]
    fn test_field_order_is_declaration_order() {
        let invoice = PatternSet::builtin(DocumentType::Invoice).unwrap();
        let names: Vec<&str> = invoice.field_names().collect();
        assert_eq!(names[0], "invoice_number");
        assert_eq!(names.last(), Some(&"total_amount"));
    }

    #[test]
    fn test_invalid_regex_is_rejected() {
        let def = PatternSetDef {
            fields: vec![PatternDef::new(
                "total",
                ValueType::Currency,
                true,
                vec![r"Total: (\d+".to_string()],
            )],
            line_item: None,
        };

        let err = PatternSet::compile(DocumentType::Invoice, &def).unwrap_err();
        assert!(matches!(err, PatternConfigError::InvalidRegex { ref field, index: 0, .. } if field == "total"));
    }

    #[test]
    fn test_duplicate_field_is_rejected() {
        let field = PatternDef::new("total", ValueType::Currency, true, vec![r"(\d+)".to_string()]);
        let def = PatternSetDef {
            fields: vec![field.clone(), field],
            line_item: None,
        };

        assert!(matches!(
            PatternSet::compile(DocumentType::Invoice, &def),
            Err(PatternConfigError::DuplicateField(_))
        ));
    }

    #[test]
    fn test_empty_candidates_are_rejected() {
        let def = PatternSetDef {
            fields: vec![PatternDef::new("total", ValueType::Currency, true, vec![])],
            line_item: None,
        };

        assert!(matches!(
            PatternSet::compile(DocumentType::Invoice, &def),
            Err(PatternConfigError::NoPatterns(_))
        ));
    }

    #[test]
    fn test_line_item_requires_named_groups() {
        let def = PatternSetDef {
            fields: vec![PatternDef::new("total", ValueType::Currency, true, vec![r"(\d+)".to_string()])],
            line_item: Some(r"(?P<description>\w+)\s+(\d+\.\d{2})".to_string()),
        };

        assert!(matches!(
            PatternSet::compile(DocumentType::Invoice, &def),
            Err(PatternConfigError::LineItem(_))
        ));
    }

    #[test]
    fn test_require_field() {
        let invoice = PatternSet::builtin(DocumentType::Invoice).unwrap();
        assert!(invoice.require_field("vendor", "group_by").is_ok());
        assert!(matches!(
            invoice.require_field("customer", "group_by"),
            Err(PatternConfigError::UnknownField { .. })
        ));
    }
}
