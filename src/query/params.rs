use std::collections::BTreeMap;

use super::error::QueryError;
use super::types::{validate_field_name, Condition, FilterOp};
use crate::database::schema::CollectionSchema;

/// Keys with a dedicated meaning; they never become filter predicates
pub const RESERVED_KEYS: [&str; 4] = ["page", "sort", "limit", "fields"];

/// A single query-string value after bracket-key expansion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Single(String),
    Many(Vec<String>),
    Nested(BTreeMap<String, ParamValue>),
}

impl ParamValue {
    /// Last scalar value; repeated keys resolve to the final occurrence
    pub fn last(&self) -> Option<&str> {
        match self {
            ParamValue::Single(s) => Some(s),
            ParamValue::Many(values) => values.last().map(String::as_str),
            ParamValue::Nested(_) => None,
        }
    }

    fn push(&mut self, value: String) {
        match self {
            ParamValue::Single(existing) => {
                *self = ParamValue::Many(vec![std::mem::take(existing), value]);
            }
            ParamValue::Many(values) => values.push(value),
            ParamValue::Nested(_) => *self = ParamValue::Single(value),
        }
    }
}

/// Raw client query parameters, keyed by field name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    entries: BTreeMap<String, ParamValue>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from already url-decoded key/value pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut params = Self::new();
        for (key, value) in pairs {
            params.insert(key.as_ref(), value);
        }
        params
    }

    /// Add one pair. `price[gte]=100` becomes a nested entry under `price`;
    /// a repeated key accumulates into `ParamValue::Many`.
    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        let (base, segments) = split_key(key);

        if segments.is_empty() || segments.iter().all(|s| s.is_empty()) {
            match self.entries.get_mut(base) {
                Some(existing) => existing.push(value),
                None => {
                    self.entries.insert(base.to_string(), ParamValue::Single(value));
                }
            }
            return;
        }

        let mut slot = self
            .entries
            .entry(base.to_string())
            .or_insert_with(|| ParamValue::Nested(BTreeMap::new()));

        for (i, segment) in segments.iter().enumerate() {
            if !matches!(slot, ParamValue::Nested(_)) {
                *slot = ParamValue::Nested(BTreeMap::new());
            }
            let ParamValue::Nested(map) = slot else {
                return;
            };
            let is_last = i + 1 == segments.len();

            if is_last {
                match map.get_mut(*segment) {
                    Some(existing) => existing.push(value),
                    None => {
                        map.insert(segment.to_string(), ParamValue::Single(value));
                    }
                }
                return;
            }

            slot = map
                .entry(segment.to_string())
                .or_insert_with(|| ParamValue::Nested(BTreeMap::new()));
        }
    }

    /// Replace a key outright (used by route aliases)
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.entries.insert(key.to_string(), ParamValue::Single(value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(ParamValue::last)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.entries.iter()
    }

    /// Working copy with the reserved keys removed
    pub fn without_reserved(&self) -> QueryParams {
        let entries = self
            .entries
            .iter()
            .filter(|(k, _)| !RESERVED_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        QueryParams { entries }
    }
}

/// Split `price[gte]` into (`price`, [`gte`]). Keys with unbalanced
/// brackets are kept literally.
fn split_key(key: &str) -> (&str, Vec<&str>) {
    let Some(open) = key.find('[') else {
        return (key, vec![]);
    };
    if open == 0 {
        return (key, vec![]);
    }

    let base = &key[..open];
    let mut segments = Vec::new();
    let mut rest = &key[open..];
    while !rest.is_empty() {
        let Some(inner) = rest.strip_prefix('[') else {
            return (key, vec![]);
        };
        let Some(close) = inner.find(']') else {
            return (key, vec![]);
        };
        segments.push(&inner[..close]);
        rest = &inner[close + 1..];
    }
    (base, segments)
}

/// Typed reading of one filter parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterParam {
    Equals { field: String, value: String },
    Compare { field: String, op: FilterOp, value: String },
}

impl FilterParam {
    /// Parse every entry of `params` (reserved keys must already be removed)
    pub fn parse_all(params: &QueryParams) -> Result<Vec<FilterParam>, QueryError> {
        let mut out = Vec::new();
        for (field, value) in params.iter() {
            validate_field_name(field)?;
            match value {
                ParamValue::Single(_) | ParamValue::Many(_) => {
                    let value = value.last().unwrap_or_default().to_string();
                    out.push(FilterParam::Equals { field: field.clone(), value });
                }
                ParamValue::Nested(ops) => {
                    for (token, operand) in ops {
                        let op = FilterOp::from_token(token)
                            .ok_or_else(|| QueryError::UnsupportedOperator(token.clone()))?;
                        let value = operand.last().ok_or_else(|| {
                            QueryError::InvalidParameter(format!("{}[{}] is nested too deeply", field, token))
                        })?;
                        out.push(FilterParam::Compare { field: field.clone(), op, value: value.to_string() });
                    }
                }
            }
        }
        Ok(out)
    }

    /// Cast the raw string through the collection schema and build a condition.
    /// Hidden fields are refused.
    pub fn into_condition(self, schema: &CollectionSchema) -> Result<Condition, QueryError> {
        match self {
            FilterParam::Equals { field, value } => {
                schema.check_queryable(&field)?;
                let value = schema.cast(&field, &value)?;
                Ok(Condition::new(field, FilterOp::Eq, value))
            }
            FilterParam::Compare { field, op, value } => {
                schema.check_queryable(&field)?;
                let value = schema.cast(&field, &value)?;
                Ok(Condition::new(field, op, value))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bracket_keys_become_nested_entries() {
        let params = QueryParams::from_pairs([("price[gte]", "100"), ("price[lte]", "500")]);
        let Some(ParamValue::Nested(ops)) = params.get("price") else {
            panic!("expected nested price entry: {:?}", params);
        };
        assert_eq!(ops.get("gte"), Some(&ParamValue::Single("100".into())));
        assert_eq!(ops.get("lte"), Some(&ParamValue::Single("500".into())));
    }

    #[test]
    fn repeated_keys_resolve_to_last_value() {
        let params = QueryParams::from_pairs([("sort", "price"), ("sort", "-name")]);
        assert_eq!(params.get_str("sort"), Some("-name"));
        assert!(matches!(params.get("sort"), Some(ParamValue::Many(v)) if v.len() == 2));
    }

    #[test]
    fn unbalanced_brackets_are_literal() {
        let params = QueryParams::from_pairs([("price[gte", "1")]);
        assert_eq!(params.get_str("price[gte"), Some("1"));
    }

    #[test]
    fn reserved_keys_are_dropped_from_working_copy() {
        let params = QueryParams::from_pairs([
            ("page", "2"),
            ("sort", "price"),
            ("limit", "10"),
            ("fields", "name"),
            ("difficulty", "easy"),
        ]);
        let filtered = params.without_reserved();
        assert_eq!(filtered.iter().count(), 1);
        assert!(filtered.contains("difficulty"));
        // the original is untouched
        assert!(params.contains("page"));
    }

    #[test]
    fn parses_equals_and_compare_params() {
        let params = QueryParams::from_pairs([("difficulty", "easy"), ("price[lt]", "1500")]);
        let parsed = FilterParam::parse_all(&params).unwrap();
        assert_eq!(
            parsed,
            vec![
                FilterParam::Equals { field: "difficulty".into(), value: "easy".into() },
                FilterParam::Compare { field: "price".into(), op: FilterOp::Lt, value: "1500".into() },
            ]
        );
    }

    #[test]
    fn operator_tokens_in_values_are_not_rewritten() {
        let params = QueryParams::from_pairs([("difficulty", "gte")]);
        let parsed = FilterParam::parse_all(&params).unwrap();
        assert_eq!(parsed, vec![FilterParam::Equals { field: "difficulty".into(), value: "gte".into() }]);
    }

    #[test]
    fn rejects_unknown_operators_and_deep_nesting() {
        let unknown = QueryParams::from_pairs([("price[ne]", "5")]);
        assert_eq!(
            FilterParam::parse_all(&unknown),
            Err(QueryError::UnsupportedOperator("ne".into()))
        );

        let deep = QueryParams::from_pairs([("price[gte][lt]", "5")]);
        assert!(matches!(FilterParam::parse_all(&deep), Err(QueryError::InvalidParameter(_))));
    }

    #[test]
    fn rejects_operator_style_field_names() {
        let params = QueryParams::from_pairs([("$where", "1")]);
        assert!(matches!(FilterParam::parse_all(&params), Err(QueryError::InvalidField(_))));
    }
}
