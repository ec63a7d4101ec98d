//! Extracted field values.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

/// Field name to value mapping produced by one template for one document.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// A typed value extracted from invoice text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// A calendar date.
    Date(NaiveDate),
    /// A monetary amount.
    Amount(Decimal),
    /// Free text (issuer, currency, invoice number, ...).
    Text(String),
}

impl FieldValue {
    /// Render the value as text, formatting dates with `date_format`.
    ///
    /// `date_format` must already be validated; see [`validate_date_format`].
    pub fn render(&self, date_format: &str) -> String {
        match self {
            Self::Date(d) => d.format(date_format).to_string(),
            Self::Amount(a) => a.to_string(),
            Self::Text(t) => t.clone(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(t),
            _ => None,
        }
    }
}

/// Check a strftime-style format string before it is used for rendering.
///
/// chrono panics when displaying a date with an invalid format, so every
/// user-supplied format passes through here first.
pub fn validate_date_format(format: &str) -> Result<(), String> {
    use chrono::format::{Item, StrftimeItems};

    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(format!("invalid date format: {:?}", format));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_render_values() {
        let date = FieldValue::Date(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert_eq!(date.render("%Y-%m-%d"), "2024-01-15");
        assert_eq!(date.render("%d.%m.%Y"), "15.01.2024");

        let amount = FieldValue::Amount(Decimal::from_str("1939.00").unwrap());
        assert_eq!(amount.render("%Y"), "1939.00");

        let text = FieldValue::Text("OYO".to_string());
        assert_eq!(text.render("%Y"), "OYO");
    }

    #[test]
    fn test_validate_date_format() {
        assert!(validate_date_format("%Y-%m-%d").is_ok());
        assert!(validate_date_format("%d.%m.%Y").is_ok());
        assert!(validate_date_format("%Q").is_err());
    }
}
