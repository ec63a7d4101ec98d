//! Keyword and regex driven templates.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::{Result, Template};
use crate::error::TemplateError;
use crate::models::OneOrMany;
use crate::models::fields::{FieldMap, FieldValue};

/// Fields every extraction must produce.
pub const REQUIRED_FIELDS: [&str; 3] = ["date", "amount", "invoice_number"];

/// Formats tried when a template declares none, or none of its own fit.
const DEFAULT_DATE_FORMATS: [&str; 6] = [
    "%d.%m.%Y",
    "%Y-%m-%d",
    "%d/%m/%Y",
    "%d.%m.%y",
    "%d %B %Y",
    "%B %d, %Y",
];

const STATIC_PREFIX: &str = "static_";

lazy_static! {
    static ref SPACES: Regex = Regex::new(r" +").unwrap();
}

/// Serialized template definition as found in `.yml` or `.json` files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateDefinition {
    /// Issuer name, also reported as the `issuer` field.
    pub issuer: String,

    /// Patterns that must all be present for the template to apply.
    #[serde(default)]
    pub keywords: OneOrMany,

    /// Patterns none of which may be present.
    #[serde(default)]
    pub exclude_keywords: OneOrMany,

    /// Field name to pattern(s). `static_<name>` entries are literal values.
    #[serde(default)]
    pub fields: BTreeMap<String, OneOrMany>,

    #[serde(default)]
    pub options: TemplateOptions,
}

/// Per-template parsing options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateOptions {
    /// Currency reported when the document does not state one.
    pub currency: String,

    /// strftime formats for `date*` fields, tried in order.
    pub date_formats: Vec<String>,

    /// Decimal separator used by `amount*` fields.
    pub decimal_separator: char,

    /// Remove spaces instead of collapsing them.
    pub remove_whitespace: bool,

    /// Lowercase the text before matching.
    pub lowercase: bool,

    /// Regex replacements applied after whitespace handling.
    pub replace: Vec<(String, String)>,

    /// Document languages, informational.
    pub languages: Vec<String>,
}

impl Default for TemplateOptions {
    fn default() -> Self {
        Self {
            currency: "EUR".to_string(),
            date_formats: Vec::new(),
            decimal_separator: '.',
            remove_whitespace: false,
            lowercase: false,
            replace: Vec::new(),
            languages: Vec::new(),
        }
    }
}

enum FieldRule {
    Static(String),
    Patterns(Vec<Regex>),
}

/// A compiled [`TemplateDefinition`].
pub struct RegexTemplate {
    definition: TemplateDefinition,
    keywords: Vec<Regex>,
    exclude_keywords: Vec<Regex>,
    fields: Vec<(String, FieldRule)>,
    replace: Vec<(Regex, String)>,
}

impl RegexTemplate {
    /// Compile a definition, rejecting invalid patterns up front.
    pub fn new(definition: TemplateDefinition) -> Result<Self> {
        let name = definition.issuer.clone();
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| TemplateError::InvalidPattern {
                template: name.clone(),
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })
        };

        let keywords = definition
            .keywords
            .items()
            .into_iter()
            .map(&compile)
            .collect::<Result<Vec<_>>>()?;
        if keywords.is_empty() {
            return Err(TemplateError::NoKeywords {
                template: definition.issuer.clone(),
            });
        }

        let exclude_keywords = definition
            .exclude_keywords
            .items()
            .into_iter()
            .map(&compile)
            .collect::<Result<Vec<_>>>()?;

        let mut fields = Vec::with_capacity(definition.fields.len());
        for (field, spec) in &definition.fields {
            let rule = match field.strip_prefix(STATIC_PREFIX) {
                Some(name) => (name.to_string(), FieldRule::Static(spec.items().join(" "))),
                None => {
                    let patterns = spec
                        .items()
                        .into_iter()
                        .map(&compile)
                        .collect::<Result<Vec<_>>>()?;
                    (field.clone(), FieldRule::Patterns(patterns))
                }
            };
            fields.push(rule);
        }

        let replace = definition
            .options
            .replace
            .iter()
            .map(|(from, to)| compile(from).map(|re| (re, to.clone())))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            definition,
            keywords,
            exclude_keywords,
            fields,
            replace,
        })
    }

    fn coerce(&self, field: &str, raw: &str) -> Result<FieldValue> {
        let invalid = || TemplateError::FieldValue {
            template: self.definition.issuer.clone(),
            field: field.to_string(),
            value: raw.to_string(),
        };

        if field.starts_with("date") {
            parse_date(raw, &self.definition.options.date_formats)
                .map(FieldValue::Date)
                .ok_or_else(invalid)
        } else if field.starts_with("amount") {
            parse_amount(raw, self.definition.options.decimal_separator)
                .map(FieldValue::Amount)
                .ok_or_else(invalid)
        } else {
            Ok(FieldValue::Text(raw.to_string()))
        }
    }
}

impl Template for RegexTemplate {
    fn name(&self) -> &str {
        &self.definition.issuer
    }

    fn normalize(&self, text: &str) -> String {
        let options = &self.definition.options;

        let mut normalized = if options.remove_whitespace {
            SPACES.replace_all(text, "").into_owned()
        } else {
            SPACES.replace_all(text, " ").into_owned()
        };

        if options.lowercase {
            normalized = normalized.to_lowercase();
        }

        for (pattern, replacement) in &self.replace {
            normalized = pattern
                .replace_all(&normalized, replacement.as_str())
                .into_owned();
        }

        normalized
    }

    fn recognizes(&self, text: &str) -> bool {
        let matched = self.keywords.iter().all(|k| k.is_match(text))
            && !self.exclude_keywords.iter().any(|k| k.is_match(text));
        trace!("Template {} recognizes: {}", self.name(), matched);
        matched
    }

    fn extract(&self, text: &str) -> Result<FieldMap> {
        let issuer = self.definition.issuer.clone();

        let mut fields = FieldMap::new();
        fields.insert("issuer".to_string(), FieldValue::Text(issuer.clone()));
        fields.insert(
            "currency".to_string(),
            FieldValue::Text(self.definition.options.currency.clone()),
        );

        for (field, rule) in &self.fields {
            let value = match rule {
                FieldRule::Static(value) => FieldValue::Text(value.clone()),
                FieldRule::Patterns(patterns) => {
                    let Some(raw) = patterns.iter().find_map(|p| first_capture(p, text)) else {
                        debug!("Template {}: no match for field {}", issuer, field);
                        continue;
                    };
                    self.coerce(field, raw)?
                }
            };
            fields.insert(field.clone(), value);
        }

        for required in REQUIRED_FIELDS {
            if !fields.contains_key(required) {
                return Err(TemplateError::MissingField {
                    template: issuer,
                    field: required.to_string(),
                });
            }
        }

        if !fields.contains_key("desc") {
            let number = fields
                .get("invoice_number")
                .map(|v| v.render("%Y-%m-%d"))
                .unwrap_or_default();
            fields.insert(
                "desc".to_string(),
                FieldValue::Text(format!("Invoice {} from {}", number, issuer)),
            );
        }

        Ok(fields)
    }
}

/// First capture group of the first match, or the whole match without groups.
fn first_capture<'t>(pattern: &Regex, text: &'t str) -> Option<&'t str> {
    let caps = pattern.captures(text)?;
    caps.get(1)
        .or_else(|| caps.get(0))
        .map(|m| m.as_str().trim())
}

/// Parse a date with the template's formats, then the defaults.
pub fn parse_date(raw: &str, formats: &[String]) -> Option<NaiveDate> {
    let raw = raw.trim();
    formats
        .iter()
        .map(String::as_str)
        .chain(DEFAULT_DATE_FORMATS)
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
}

/// Parse an amount such as `1.234,56` or `1,234.56`.
pub fn parse_amount(raw: &str, decimal_separator: char) -> Option<Decimal> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
        .collect();

    let normalized = if decimal_separator == ',' {
        cleaned.replace('.', "").replace(',', ".")
    } else {
        cleaned.replace(',', "")
    };

    Decimal::from_str(&normalized).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn template(yaml: &str) -> RegexTemplate {
        let definition: TemplateDefinition = serde_yaml::from_str(yaml).unwrap();
        RegexTemplate::new(definition).unwrap()
    }

    const STADTWERKE: &str = r#"
issuer: Stadtwerke Musterstadt
keywords:
  - Stadtwerke Musterstadt
  - Rechnung
exclude_keywords: Gutschrift
fields:
  amount: Rechnungsbetrag\s+([\d.,]+)
  date: Rechnungsdatum:?\s+(\d{2}\.\d{2}\.\d{4})
  invoice_number: Rechnungsnummer:?\s+(\S+)
  static_vat: "19"
options:
  currency: EUR
  date_formats:
    - "%d.%m.%Y"
  decimal_separator: ","
"#;

    const TEXT: &str = "Stadtwerke Musterstadt    Rechnung\n\
        Rechnungsnummer: SW-2024-0042\n\
        Rechnungsdatum: 15.01.2024\n\
        Rechnungsbetrag   1.234,56 EUR\n";

    #[test]
    fn test_normalize_collapses_spaces() {
        let t = template(STADTWERKE);
        assert_eq!(t.normalize("a    b  c"), "a b c");
    }

    #[test]
    fn test_normalize_options() {
        let t = template(
            r#"
issuer: X
keywords: x
options:
  remove_whitespace: true
  lowercase: true
  replace:
    - ["ß", "ss"]
"#,
        );
        assert_eq!(t.normalize("Große   Straße 1"), "grossestrasse1");
    }

    #[test]
    fn test_recognizes_requires_all_keywords() {
        let t = template(STADTWERKE);
        assert!(t.recognizes(&t.normalize(TEXT)));
        assert!(!t.recognizes("Stadtwerke Musterstadt Mahnung"));
        assert!(!t.recognizes("Stadtwerke Musterstadt Rechnung Gutschrift"));
    }

    #[test]
    fn test_extract_fields() {
        let t = template(STADTWERKE);
        let fields = t.extract(&t.normalize(TEXT)).unwrap();

        assert_eq!(
            fields["date"],
            FieldValue::Date(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
        );
        assert_eq!(
            fields["amount"],
            FieldValue::Amount(Decimal::from_str("1234.56").unwrap())
        );
        assert_eq!(fields["invoice_number"], FieldValue::Text("SW-2024-0042".into()));
        assert_eq!(fields["issuer"], FieldValue::Text("Stadtwerke Musterstadt".into()));
        assert_eq!(fields["currency"], FieldValue::Text("EUR".into()));
        assert_eq!(fields["vat"], FieldValue::Text("19".into()));
        assert_eq!(
            fields["desc"],
            FieldValue::Text("Invoice SW-2024-0042 from Stadtwerke Musterstadt".into())
        );
    }

    #[test]
    fn test_missing_required_field() {
        let t = template(STADTWERKE);
        let err = t
            .extract("Stadtwerke Musterstadt Rechnung\nRechnungsnummer: 1")
            .unwrap_err();
        assert!(matches!(err, TemplateError::MissingField { field, .. } if field == "date"));
    }

    #[test]
    fn test_unparsable_amount() {
        let t = template(STADTWERKE);
        let err = t
            .extract(
                "Rechnungsnummer: 1\nRechnungsdatum: 15.01.2024\nRechnungsbetrag ,,,\n",
            )
            .unwrap_err();
        assert!(matches!(err, TemplateError::FieldValue { field, .. } if field == "amount"));
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let definition: TemplateDefinition =
            serde_yaml::from_str("issuer: X\nkeywords: \"(unclosed\"\n").unwrap();
        assert!(matches!(
            RegexTemplate::new(definition),
            Err(TemplateError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_keywords_required() {
        let definition: TemplateDefinition = serde_yaml::from_str("issuer: X\n").unwrap();
        assert!(matches!(
            RegexTemplate::new(definition),
            Err(TemplateError::NoKeywords { .. })
        ));
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1.234,56", ','), Decimal::from_str("1234.56").ok());
        assert_eq!(parse_amount("1,234.56", '.'), Decimal::from_str("1234.56").ok());
        assert_eq!(parse_amount("INR 1939.00", '.'), Decimal::from_str("1939.00").ok());
        assert_eq!(parse_amount("abc", '.'), None);
    }

    #[test]
    fn test_parse_date_falls_back_to_defaults() {
        let expected = NaiveDate::from_ymd_opt(2017, 12, 31);
        assert_eq!(parse_date("2017-12-31", &["%d.%m.%Y".to_string()]), expected);
        assert_eq!(parse_date("31.12.2017", &[]), expected);
        assert_eq!(parse_date("December 31, 2017", &[]), expected);
        assert_eq!(parse_date("yesterday", &[]), None);
    }
}
