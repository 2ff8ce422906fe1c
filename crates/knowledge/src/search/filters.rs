//! Field filters shared by the search backends.
//!
//! Azure AI Search receives filters as OData expressions; the local backend
//! evaluates the same predicate in memory.

use crate::types::SearchDocument;
use finagent_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Value a field must equal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Number(f64),
    Text(String),
    /// Any of the listed values; each item keeps its own type
    AnyOf(Vec<FilterValue>),
}

impl FilterValue {
    /// A number when the text parses as one, otherwise text.
    fn parse_scalar(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.parse::<f64>() {
            Ok(number) if number.is_finite() => FilterValue::Number(number),
            _ => FilterValue::Text(raw.to_string()),
        }
    }

    fn odata_clause(&self, key: &str) -> String {
        match self {
            FilterValue::Text(text) => format!("{} eq {}", key, quote(text)),
            FilterValue::Number(number) => format!("{} eq {}", key, format_number(*number)),
            FilterValue::AnyOf(values) => {
                let parts: Vec<String> = values.iter().map(|v| v.odata_clause(key)).collect();
                format!("({})", parts.join(" or "))
            }
        }
    }

    fn matches(&self, actual: &FieldValue) -> bool {
        match (self, actual) {
            (FilterValue::Number(n), FieldValue::Number(a)) => (n - a).abs() < f64::EPSILON,
            (FilterValue::Number(n), FieldValue::Text(a)) => format_number(*n) == *a,
            (FilterValue::Text(t), FieldValue::Text(a)) => t == a,
            (FilterValue::Text(t), FieldValue::Number(a)) => t.parse::<f64>().ok() == Some(*a),
            (FilterValue::AnyOf(values), actual) => values.iter().any(|v| v.matches(actual)),
        }
    }
}

/// Equality filters keyed by field name, combined with `and`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchFilters {
    fields: BTreeMap<String, FilterValue>,
}

impl SearchFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn with(mut self, field: impl Into<String>, value: FilterValue) -> Self {
        self.fields.insert(field.into(), value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: FilterValue) {
        self.fields.insert(field.into(), value);
    }

    /// Build filters from a JSON object such as `{"document_name": "q3", "page_number": [3, 4]}`.
    pub fn from_json(value: &Value) -> AppResult<Self> {
        let filters: Self = match value {
            Value::Null => return Ok(Self::default()),
            Value::Object(_) => serde_json::from_value(value.clone())
                .map_err(|e| AppError::Search(format!("Invalid filters: {}", e)))?,
            other => {
                return Err(AppError::Search(format!(
                    "Filters must be an object, got {}",
                    other
                )))
            }
        };
        filters.validate_fields()?;
        Ok(filters)
    }

    /// Parse a `key=value` assignment; comma-separated values become `AnyOf`.
    pub fn parse_assignment(&mut self, assignment: &str) -> AppResult<()> {
        let (key, value) = assignment.split_once('=').ok_or_else(|| {
            AppError::Search(format!("Filter must be key=value, got '{}'", assignment))
        })?;
        let key = key.trim();
        let value = value.trim();
        check_field_name(key)?;

        let parsed = if value.contains(',') {
            FilterValue::AnyOf(value.split(',').map(FilterValue::parse_scalar).collect())
        } else {
            FilterValue::parse_scalar(value)
        };
        self.fields.insert(key.to_string(), parsed);
        Ok(())
    }

    fn validate_fields(&self) -> AppResult<()> {
        self.fields.keys().try_for_each(|key| check_field_name(key))
    }

    /// Render as an OData `$filter` expression.
    ///
    /// Field names are checked against `[A-Za-z_][A-Za-z0-9_]*` before they
    /// are written into the expression.
    pub fn to_odata(&self) -> AppResult<Option<String>> {
        if self.fields.is_empty() {
            return Ok(None);
        }
        self.validate_fields()?;

        let clauses: Vec<String> = self
            .fields
            .iter()
            .map(|(key, value)| value.odata_clause(key))
            .collect();

        Ok(Some(clauses.join(" and ")))
    }

    /// Evaluate the filters against an index record.
    pub fn matches(&self, doc: &SearchDocument) -> bool {
        self.fields
            .iter()
            .all(|(key, expected)| match field_value(doc, key) {
                Some(actual) => expected.matches(&actual),
                None => false,
            })
    }
}

fn check_field_name(key: &str) -> AppResult<()> {
    let mut chars = key.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(AppError::Search(format!("Invalid filter field name '{}'", key)))
    }
}

enum FieldValue {
    Text(String),
    Number(f64),
}

fn field_value(doc: &SearchDocument, key: &str) -> Option<FieldValue> {
    match key {
        "id" => Some(FieldValue::Text(doc.id.clone())),
        "content" => Some(FieldValue::Text(doc.content.clone())),
        "document_name" => Some(FieldValue::Text(doc.document_name.clone())),
        "chunk_type" => Some(FieldValue::Text(doc.chunk_type.clone())),
        "section" => Some(FieldValue::Text(doc.section.clone())),
        "page_number" => Some(FieldValue::Number(doc.page_number as f64)),
        "chunk_index" => Some(FieldValue::Number(doc.chunk_index as f64)),
        _ => None,
    }
}

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}
