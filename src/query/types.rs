use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::QueryError;
use crate::database::document::{self, Document, ID_FIELD};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "$eq")] Eq,
    #[serde(rename = "$ne")] Ne,
    #[serde(rename = "$gt")] Gt,
    #[serde(rename = "$gte")] Gte,
    #[serde(rename = "$lt")] Lt,
    #[serde(rename = "$lte")] Lte,
}

impl FilterOp {
    /// Comparison tokens a client may use as a sub-key, e.g. `price[gte]=100`
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "gte" => Some(FilterOp::Gte),
            "gt" => Some(FilterOp::Gt),
            "lte" => Some(FilterOp::Lte),
            "lt" => Some(FilterOp::Lt),
            _ => None,
        }
    }

    /// Store-native spelling of the operator
    pub fn native(&self) -> &'static str {
        match self {
            FilterOp::Eq => "$eq",
            FilterOp::Ne => "$ne",
            FilterOp::Gt => "$gt",
            FilterOp::Gte => "$gte",
            FilterOp::Lt => "$lt",
            FilterOp::Lte => "$lte",
        }
    }

    pub fn to_sql(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Ne => "<>",
            FilterOp::Gt => ">",
            FilterOp::Gte => ">=",
            FilterOp::Lt => "<",
            FilterOp::Lte => "<=",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Condition {
    pub fn new(field: impl Into<String>, op: FilterOp, value: Value) -> Self {
        Self { field: field.into(), op, value }
    }
}

/// Conjunction of field conditions. Adding a condition that is already
/// present leaves the filter unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut filter = Self::new();
        filter.and(Condition::new(field, FilterOp::Eq, value.into()));
        filter
    }

    pub fn with(mut self, field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        self.and(Condition::new(field, op, value.into()));
        self
    }

    /// Returns false when the condition was already present
    pub fn and(&mut self, condition: Condition) -> bool {
        if self.conditions.contains(&condition) {
            return false;
        }
        self.conditions.push(condition);
        true
    }

    pub fn merge(&mut self, other: Filter) {
        for condition in other.conditions {
            self.and(condition);
        }
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Render in the store's native operator syntax, e.g.
    /// `{"price": {"$gte": 100, "$lte": 500}}`
    pub fn to_native(&self) -> Value {
        let mut out = Map::new();
        for c in &self.conditions {
            let entry = out.entry(c.field.clone()).or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(ops) = entry {
                ops.insert(c.op.native().to_string(), c.value.clone());
            }
        }
        Value::Object(out)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC NULLS FIRST",
            SortDirection::Desc => "DESC NULLS LAST",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self { field: field.into(), direction: SortDirection::Asc }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self { field: field.into(), direction: SortDirection::Desc }
    }

    /// Parse `-field` (descending) or `field` (ascending)
    pub fn parse(token: &str) -> Result<Option<Self>, QueryError> {
        let token = token.trim();
        if token.is_empty() {
            return Ok(None);
        }
        let key = match token.strip_prefix('-') {
            Some(field) => Self::desc(field.trim()),
            None => Self::asc(token),
        };
        validate_field_name(&key.field)?;
        Ok(Some(key))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Projection {
    #[default]
    All,
    Include(Vec<String>),
    Exclude(Vec<String>),
}

impl Projection {
    /// Parse a comma-separated field list. Either every token carries a
    /// leading `-` (exclusion) or none does (inclusion).
    pub fn parse(spec: &str) -> Result<Self, QueryError> {
        let tokens: Vec<&str> = spec.split(',').map(str::trim).filter(|t| !t.is_empty()).collect();
        if tokens.is_empty() {
            return Ok(Projection::All);
        }

        let excluded = tokens.iter().filter(|t| t.starts_with('-')).count();
        if excluded != 0 && excluded != tokens.len() {
            return Err(QueryError::MixedProjection(spec.to_string()));
        }

        let fields = tokens
            .iter()
            .map(|t| {
                let field = t.trim_start_matches('-').to_string();
                validate_field_name(&field).map(|_| field)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(if excluded == 0 { Projection::Include(fields) } else { Projection::Exclude(fields) })
    }

    pub fn apply(&self, doc: Document) -> Document {
        match self {
            Projection::All => doc,
            Projection::Include(fields) => {
                let mut out = Document::new();
                // Identity is always returned
                if let Some(id) = doc.get(ID_FIELD) {
                    out.insert(ID_FIELD.to_string(), id.clone());
                }
                for field in fields {
                    if let Some(value) = document::get_path(&doc, field) {
                        document::set_path(&mut out, field, value.clone());
                    }
                }
                out
            }
            Projection::Exclude(fields) => {
                let mut out = doc;
                for field in fields {
                    document::remove_path(&mut out, field);
                }
                out
            }
        }
    }
}

/// Pagination window after defaults have been applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageWindow {
    pub page: u64,
    pub limit: u64,
    pub skip: u64,
}

impl PageWindow {
    pub fn new(page: u64, limit: u64) -> Self {
        Self { page, limit, skip: page.saturating_sub(1).saturating_mul(limit) }
    }
}

/// Accumulated directives held by a query handle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    pub filter: Filter,
    pub sort: Vec<SortKey>,
    pub projection: Projection,
    pub skip: u64,
    pub limit: Option<u64>,
}

pub(crate) fn validate_field_name(field: &str) -> Result<(), QueryError> {
    if field.is_empty()
        || field.starts_with('$')
        || field.split('.').any(|segment| segment.is_empty())
        || field.chars().any(|c| c.is_whitespace() || c.is_control())
    {
        return Err(QueryError::InvalidField(field.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filter_deduplicates_identical_conditions() {
        let mut filter = Filter::eq("difficulty", "easy");
        assert!(!filter.and(Condition::new("difficulty", FilterOp::Eq, json!("easy"))));
        assert!(filter.and(Condition::new("difficulty", FilterOp::Ne, json!("easy"))));
        assert_eq!(filter.conditions().len(), 2);
    }

    #[test]
    fn filter_renders_native_operators() {
        let filter = Filter::new()
            .with("price", FilterOp::Gte, 100)
            .with("price", FilterOp::Lte, 500);
        assert_eq!(filter.to_native(), json!({ "price": { "$gte": 100, "$lte": 500 } }));
    }

    #[test]
    fn sort_key_parses_direction() {
        assert_eq!(SortKey::parse("-price").unwrap(), Some(SortKey::desc("price")));
        assert_eq!(SortKey::parse("name").unwrap(), Some(SortKey::asc("name")));
        assert_eq!(SortKey::parse("  ").unwrap(), None);
        assert!(SortKey::parse("-$where").is_err());
    }

    #[test]
    fn projection_rejects_mixed_fields() {
        assert!(matches!(Projection::parse("name,-price"), Err(QueryError::MixedProjection(_))));
        assert_eq!(
            Projection::parse("-__v,-secretTour").unwrap(),
            Projection::Exclude(vec!["__v".into(), "secretTour".into()])
        );
    }

    #[test]
    fn inclusion_projection_keeps_identity() {
        let doc = json!({ "_id": "a1", "name": "The Sea Explorer", "price": 497, "__v": 0 });
        let Value::Object(doc) = doc else { unreachable!() };

        let projected = Projection::Include(vec!["name".into()]).apply(doc);
        assert_eq!(Value::Object(projected), json!({ "_id": "a1", "name": "The Sea Explorer" }));
    }

    #[test]
    fn page_window_computes_skip() {
        assert_eq!(PageWindow::new(2, 10).skip, 10);
        assert_eq!(PageWindow::new(1, 100).skip, 0);
    }
}
