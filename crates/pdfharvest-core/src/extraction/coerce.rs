//! Conversion of raw matched text into typed values.

use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;

use crate::error::CoercionError;
use crate::models::record::{FieldValue, ValueType};

lazy_static! {
    static ref CURRENCY_MARKS: Regex = Regex::new(
        r"(?i)[$€£¥]|\b(?:USD|EUR|GBP|PLN|CHF|JPY|CAD|AUD)\b|zł"
    ).unwrap();

    static ref NUMERIC_SHAPE: Regex = Regex::new(r"^[+-]?\d[\d.,]*$").unwrap();

    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// Coerce a raw value to the declared type.
pub fn coerce(
    raw: &str,
    value_type: ValueType,
    date_formats: &[String],
) -> Result<FieldValue, CoercionError> {
    match value_type {
        ValueType::String => normalize_text(raw).map(FieldValue::Text),
        ValueType::Currency => parse_amount(raw).map(FieldValue::Currency),
        ValueType::Number => parse_number(raw).map(FieldValue::Number),
        ValueType::Integer => parse_integer(raw).map(FieldValue::Integer),
        ValueType::Date => parse_date(raw, date_formats).map(FieldValue::Date),
    }
    .map_err(|_| CoercionError {
        raw: raw.to_string(),
        expected: value_type.as_str(),
    })
}

fn fail(raw: &str, expected: &'static str) -> CoercionError {
    CoercionError {
        raw: raw.to_string(),
        expected,
    }
}

/// Trim and collapse internal whitespace. Empty text is an error.
pub fn normalize_text(raw: &str) -> Result<String, CoercionError> {
    let text = WHITESPACE.replace_all(raw.trim(), " ").into_owned();
    if text.is_empty() {
        Err(fail(raw, "string"))
    } else {
        Ok(text)
    }
}

/// Parse a monetary amount such as "$1,234.56", "1 234,56 EUR", "1.234,56"
/// or "(12.00)".
pub fn parse_amount(raw: &str) -> Result<Decimal, CoercionError> {
    let stripped = CURRENCY_MARKS.replace_all(raw, "");
    let mut s: String = stripped
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{00a0}')
        .collect();

    let mut negative = false;
    if s.starts_with('(') && s.ends_with(')') && s.len() > 2 {
        negative = true;
        s = s[1..s.len() - 1].to_string();
    }
    if let Some(rest) = s.strip_prefix('-') {
        negative = !negative;
        s = rest.to_string();
    } else if let Some(rest) = s.strip_prefix('+') {
        s = rest.to_string();
    }

    if !NUMERIC_SHAPE.is_match(&s) {
        return Err(fail(raw, "currency"));
    }

    let normalized = normalize_separators(&s);
    let value = Decimal::from_str(&normalized).map_err(|_| fail(raw, "currency"))?;
    Ok(if negative { -value } else { value })
}

/// Decide which of `,` and `.` is the decimal separator and drop the other.
fn normalize_separators(s: &str) -> String {
    let commas = s.matches(',').count();
    let dots = s.matches('.').count();

    match (commas, dots) {
        (0, 0) => s.to_string(),
        (_, 0) => {
            // A single comma followed by other than three digits is a decimal comma
            let tail = s.rsplit(',').next().unwrap_or("");
            if commas == 1 && tail.len() != 3 {
                s.replace(',', ".")
            } else {
                s.replace(',', "")
            }
        }
        (0, 1) => s.to_string(),
        (0, _) => s.replace('.', ""),
        _ => {
            // Both present: the last one is the decimal separator
            let comma_pos = s.rfind(',');
            let dot_pos = s.rfind('.');
            match (comma_pos, dot_pos) {
                (Some(c), Some(d)) if c > d => s.replace('.', "").replace(',', "."),
                _ => s.replace(',', ""),
            }
        }
    }
}

/// Parse a plain decimal number, allowing a trailing percent sign.
pub fn parse_number(raw: &str) -> Result<Decimal, CoercionError> {
    let trimmed = raw.trim();
    let without_pct = trimmed.strip_suffix('%').unwrap_or(trimmed);
    parse_amount(without_pct).map_err(|_| fail(raw, "number"))
}

/// Parse a whole number, allowing thousands separators.
pub fn parse_integer(raw: &str) -> Result<i64, CoercionError> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '_' | ' ' | '\u{00a0}'))
        .collect();
    cleaned.parse::<i64>().map_err(|_| fail(raw, "integer"))
}

/// Parse a date by trying each chrono format in order. Four-digit year
/// formats must not swallow two-digit years, so results before year 1000
/// are skipped.
pub fn parse_date(raw: &str, formats: &[String]) -> Result<NaiveDate, CoercionError> {
    let cleaned = raw
        .trim()
        .trim_end_matches(['.', ','])
        .replace(". ", " ");
    let cleaned = WHITESPACE.replace_all(&cleaned, " ");

    formats
        .iter()
        .filter_map(|fmt| NaiveDate::parse_from_str(&cleaned, fmt).ok())
        .find(|date| date.year() >= 1000)
        .ok_or_else(|| fail(raw, "date"))
}
