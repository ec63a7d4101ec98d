//! Redaction profiles and the phrase rule table.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RedactionError;
use crate::models::OneOrMany;

/// Caller-supplied values identifying a person or business.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedactionProfile {
    pub zip: Option<String>,
    pub city: Option<String>,
    pub company: Option<String>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub street: Option<String>,
    pub number: Option<String>,
    /// Extra literal phrases, one or many.
    #[serde(deserialize_with = "OneOrMany::or_empty")]
    pub additional: OneOrMany,
}

/// Profile field combination a phrase was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    ZipCity,
    Company,
    FullName,
    LastName,
    StreetNumber,
    Additional,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ZipCity => "zip_city",
            Self::Company => "company",
            Self::FullName => "full_name",
            Self::LastName => "last_name",
            Self::StreetNumber => "street_number",
            Self::Additional => "additional",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One literal phrase to remove.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedactionRule {
    pub kind: RuleKind,
    pub phrase: String,
}

impl RedactionRule {
    fn new(kind: RuleKind, phrase: String) -> Self {
        Self { kind, phrase }
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// `Musterstraße` → `Musterstr.`, keeping the capitalization of a leading `Straße`.
fn abbreviate_street(street: &str) -> String {
    street.replace("straße", "str.").replace("Straße", "Str.")
}

impl RedactionProfile {
    /// Parse a profile from its JSON form.
    pub fn from_json(json: &str) -> Result<Self, RedactionError> {
        serde_json::from_str(json).map_err(|e| RedactionError::Profile(e.to_string()))
    }

    /// Parse a command-line argument that is either inline JSON or a path to a JSON file.
    pub fn from_arg(arg: &str) -> Result<Self, RedactionError> {
        let trimmed = arg.trim_start();
        if trimmed.starts_with('{') {
            return Self::from_json(trimmed);
        }

        let path = Path::new(arg);
        if !path.is_file() {
            return Err(RedactionError::Profile(format!(
                "{} is neither inline JSON nor a readable file",
                arg
            )));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Apply the rule table. A combination fires only when all its fields are non-empty.
    ///
    /// Duplicate phrases are dropped, keeping the first rule that produced them.
    pub fn rules(&self) -> Vec<RedactionRule> {
        let mut rules = Vec::new();

        if let (Some(zip), Some(city)) = (present(&self.zip), present(&self.city)) {
            rules.push(RedactionRule::new(RuleKind::ZipCity, format!("{} {}", zip, city)));
        }

        if let Some(company) = present(&self.company) {
            rules.push(RedactionRule::new(RuleKind::Company, format!("Firma {}", company)));
            rules.push(RedactionRule::new(RuleKind::Company, company.to_string()));
        }

        let lastname = present(&self.lastname);
        if let (Some(first), Some(last)) = (present(&self.firstname), lastname) {
            for title in ["Frau ", "Herr ", ""] {
                rules.push(RedactionRule::new(
                    RuleKind::FullName,
                    format!("{}{} {}", title, first, last),
                ));
            }
        }

        if let Some(last) = lastname {
            rules.push(RedactionRule::new(RuleKind::LastName, format!("Herr {}", last)));
            rules.push(RedactionRule::new(RuleKind::LastName, format!("Frau {}", last)));
        }

        if let (Some(street), Some(number)) = (present(&self.street), present(&self.number)) {
            rules.push(RedactionRule::new(
                RuleKind::StreetNumber,
                format!("{} {}", street, number),
            ));
            rules.push(RedactionRule::new(
                RuleKind::StreetNumber,
                format!("{} {}", abbreviate_street(street), number),
            ));
        }

        for phrase in self.additional.items() {
            if !phrase.is_empty() {
                rules.push(RedactionRule::new(RuleKind::Additional, phrase.to_string()));
            }
        }

        let mut seen = std::collections::HashSet::new();
        rules.retain(|rule| seen.insert(rule.phrase.clone()));
        rules
    }
}
