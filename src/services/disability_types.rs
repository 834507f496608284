//! Lenient parsing of the disability-type list submitted at registration.
//!
//! Each submitted value may be a JSON array (`[1, "3"]`), a single scalar
//! (`2`), or a comma-separated string (`1, 3`). Values that do not parse to
//! an integer are dropped and reported as warnings; the caller decides what
//! to do with them.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseWarning {
    /// A value that is not an integer identifier
    NotAnInteger(String),
    /// A bracketed value that is not valid JSON; its items were split on commas
    MalformedJson(String),
    /// The same identifier was listed more than once
    Duplicate(i32),
}

impl std::fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseWarning::NotAnInteger(value) => write!(f, "ignored non-integer value '{}'", value),
            ParseWarning::MalformedJson(value) => write!(f, "malformed JSON list '{}'", value),
            ParseWarning::Duplicate(id) => write!(f, "duplicate disability type {}", id),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDisabilityTypes {
    /// Distinct identifiers in submission order
    pub ids: Vec<i32>,
    pub warnings: Vec<ParseWarning>,
}

impl ParsedDisabilityTypes {
    fn push_token(&mut self, token: &str) {
        let token = token.trim().trim_matches('"').trim();
        if token.is_empty() {
            return;
        }

        match token.parse::<i32>() {
            Ok(id) if self.ids.contains(&id) => self.warnings.push(ParseWarning::Duplicate(id)),
            Ok(id) => self.ids.push(id),
            Err(_) => self
                .warnings
                .push(ParseWarning::NotAnInteger(token.to_string())),
        }
    }

    fn push_json(&mut self, value: &Value) {
        match value {
            Value::Array(items) => items.iter().for_each(|item| self.push_json(item)),
            Value::Number(number) => match number.as_i64().and_then(|n| i32::try_from(n).ok()) {
                Some(id) => self.push_token(&id.to_string()),
                None => self
                    .warnings
                    .push(ParseWarning::NotAnInteger(number.to_string())),
            },
            Value::String(text) => self.push_token(text),
            other => self
                .warnings
                .push(ParseWarning::NotAnInteger(other.to_string())),
        }
    }
}

/// Parses every submitted value into one de-duplicated id list.
pub fn parse_disability_types<S: AsRef<str>>(values: &[S]) -> ParsedDisabilityTypes {
    let mut parsed = ParsedDisabilityTypes::default();

    for raw in values {
        let raw = raw.as_ref().trim();
        if raw.is_empty() {
            continue;
        }

        if raw.starts_with('[') {
            match serde_json::from_str::<Value>(raw) {
                Ok(value) => parsed.push_json(&value),
                Err(_) => {
                    parsed
                        .warnings
                        .push(ParseWarning::MalformedJson(raw.to_string()));
                    raw.trim_start_matches('[')
                        .trim_end_matches(']')
                        .split(',')
                        .for_each(|token| parsed.push_token(token));
                }
            }
        } else {
            raw.split(',').for_each(|token| parsed.push_token(token));
        }
    }

    parsed
}
