use chrono::{NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::{Number, Value};

use super::document;
use crate::query::QueryError;

/// Storage kind of a document field, used to cast query-string values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Number,
    Boolean,
    Date,
    StringArray,
    DateArray,
}

/// Static description of one collection
#[derive(Debug)]
pub struct CollectionSchema {
    pub name: &'static str,
    /// Singular noun used in messages, e.g. "tour"
    pub label: &'static str,
    pub fields: &'static [(&'static str, FieldKind)],
    /// Fields whose values must be unique across the collection
    pub unique: &'static [&'static str],
    /// Write-only inputs that are validated but never stored
    pub transient: &'static [&'static str],
    /// Fields stripped from read results and closed to client queries
    pub hidden: &'static [&'static str],
    /// Documents whose field equals this flag are left out of ordinary reads
    pub hidden_when: Option<(&'static str, bool)>,
}

impl CollectionSchema {
    pub fn kind_of(&self, field: &str) -> Option<FieldKind> {
        self.fields.iter().find(|(name, _)| *name == field).map(|(_, kind)| *kind)
    }

    pub fn is_hidden(&self, field: &str) -> bool {
        let root = field.split('.').next().unwrap_or(field);
        self.hidden.contains(&root)
    }

    /// Whether a write body may carry this top-level key
    pub fn accepts(&self, field: &str) -> bool {
        self.kind_of(field).is_some() || self.transient.contains(&field)
    }

    /// Hidden fields cannot be filtered, sorted or projected by clients
    pub fn check_queryable(&self, field: &str) -> Result<(), QueryError> {
        if self.is_hidden(field) {
            return Err(QueryError::InvalidField(field.to_string()));
        }
        Ok(())
    }

    /// Cast a raw query-string value to the field's stored representation.
    /// Fields outside the schema compare as strings.
    pub fn cast(&self, field: &str, raw: &str) -> Result<Value, QueryError> {
        let fail = || QueryError::Cast { field: field.to_string(), value: raw.to_string() };

        match self.kind_of(field) {
            None | Some(FieldKind::String) | Some(FieldKind::StringArray) => Ok(Value::String(raw.to_string())),
            Some(FieldKind::Number) => cast_number(raw).ok_or_else(fail),
            Some(FieldKind::Boolean) => cast_bool(raw).ok_or_else(fail),
            Some(FieldKind::Date) | Some(FieldKind::DateArray) => cast_date(raw).ok_or_else(fail),
        }
    }
}

fn cast_number(raw: &str) -> Option<Value> {
    let raw = raw.trim();
    if let Ok(i) = raw.parse::<i64>() {
        return Some(Value::Number(i.into()));
    }
    let f = raw.parse::<f64>().ok().filter(|f| f.is_finite())?;
    if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        return Some(Value::Number((f as i64).into()));
    }
    Number::from_f64(f).map(Value::Number)
}

fn cast_bool(raw: &str) -> Option<Value> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(Value::Bool(true)),
        "false" | "0" | "no" => Some(Value::Bool(false)),
        _ => None,
    }
}

/// Full RFC 3339 timestamps, `YYYY-MM-DD,HH:MM` (UTC) or bare
/// `YYYY-MM-DD` dates (midnight UTC)
pub fn cast_date(raw: &str) -> Option<Value> {
    let raw = raw.trim();
    if let Some(at) = document::parse_date(raw) {
        return Some(Value::String(document::format_date(at)));
    }
    if let Ok(at) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d,%H:%M") {
        return Some(Value::String(document::format_date(Utc.from_utc_datetime(&at))));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    let at = Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?);
    Some(Value::String(document::format_date(at)))
}
