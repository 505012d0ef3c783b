use super::error::QueryError;
use super::params::{FilterParam, QueryParams};
use super::types::{Filter, PageWindow, Projection, SortKey};
use crate::config::QueryConfig;
use crate::database::document::VERSION_FIELD;
use crate::database::DocumentQuery;

/// Field used for the default (newest first) ordering
pub const DEFAULT_SORT_FIELD: &str = "createdAt";

/// Pagination defaults; `default_limit` replaces a missing or unusable `limit`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryDefaults {
    pub default_limit: u64,
    pub max_limit: Option<u64>,
    pub debug_logging: bool,
}

impl QueryDefaults {
    /// Defaults from the process-wide configuration
    pub fn from_config() -> Self {
        Self::from(&crate::config::config().query)
    }
}

impl From<&QueryConfig> for QueryDefaults {
    fn from(query: &QueryConfig) -> Self {
        Self {
            default_limit: query.default_limit.max(1),
            max_limit: query.max_limit,
            debug_logging: query.debug_logging,
        }
    }
}

impl Default for QueryDefaults {
    fn default() -> Self {
        Self { default_limit: 100, max_limit: None, debug_logging: false }
    }
}

/// Maps client query parameters onto a document query handle.
///
/// One instance per request. Each step mutates the held handle and returns
/// the transformer so the steps chain:
///
/// ```ignore
/// let mut features = QueryFeatures::new(repo.query(), &params);
/// features.filter()?.sort()?.limit_fields()?.paginate()?;
/// let docs = features.query().execute().await?;
/// ```
pub struct QueryFeatures<'p> {
    query: DocumentQuery,
    params: &'p QueryParams,
    defaults: QueryDefaults,
    window: Option<PageWindow>,
}

impl<'p> QueryFeatures<'p> {
    pub fn new(query: DocumentQuery, params: &'p QueryParams) -> Self {
        Self::with_defaults(query, params, QueryDefaults::from_config())
    }

    pub fn with_defaults(query: DocumentQuery, params: &'p QueryParams, defaults: QueryDefaults) -> Self {
        Self { query, params, defaults, window: None }
    }

    /// Equality and comparison constraints from every non-reserved key
    pub fn filter(&mut self) -> Result<&mut Self, QueryError> {
        let schema = self.query.schema();
        let mut filter = Filter::new();
        for param in FilterParam::parse_all(&self.params.without_reserved())? {
            filter.and(param.into_condition(schema)?);
        }

        if self.defaults.debug_logging {
            tracing::debug!("Query filter for {}: {}", schema.name, filter.to_native());
        }

        self.query.filter(filter);
        Ok(self)
    }

    /// `sort=-price,name`; newest first when absent
    pub fn sort(&mut self) -> Result<&mut Self, QueryError> {
        let schema = self.query.schema();
        let keys = match self.params.get_str("sort") {
            Some(spec) => {
                let mut keys = Vec::new();
                for token in spec.split(',') {
                    if let Some(key) = SortKey::parse(token)? {
                        schema.check_queryable(&key.field)?;
                        keys.push(key);
                    }
                }
                keys
            }
            None => vec![],
        };

        let keys = if keys.is_empty() { vec![SortKey::desc(DEFAULT_SORT_FIELD)] } else { keys };
        self.query.sort(keys);
        Ok(self)
    }

    /// `fields=name,price`; hides the revision field when absent
    pub fn limit_fields(&mut self) -> Result<&mut Self, QueryError> {
        let schema = self.query.schema();
        let projection = match self.params.get_str("fields") {
            Some(spec) => match Projection::parse(spec)? {
                Projection::All => Self::default_projection(),
                Projection::Include(fields) => {
                    for field in &fields {
                        schema.check_queryable(field)?;
                    }
                    Projection::Include(fields)
                }
                projection => projection,
            },
            None => Self::default_projection(),
        };

        self.query.select(projection);
        Ok(self)
    }

    /// `page` and `limit`; unusable values fall back to the defaults
    pub fn paginate(&mut self) -> Result<&mut Self, QueryError> {
        let page = parse_positive(self.params.get_str("page")).unwrap_or(1);
        let mut limit = parse_positive(self.params.get_str("limit")).unwrap_or(self.defaults.default_limit);

        if let Some(max) = self.defaults.max_limit {
            if limit > max {
                tracing::warn!("Limit {} exceeds max {}, capping to max", limit, max);
                limit = max;
            }
        }

        let window = PageWindow::new(page, limit);
        self.query.skip(window.skip).limit(window.limit);
        self.window = Some(window);
        Ok(self)
    }

    /// Window applied by `paginate`, or the default window if it has not run
    pub fn window(&self) -> PageWindow {
        self.window.unwrap_or_else(|| PageWindow::new(1, self.defaults.default_limit))
    }

    /// Whether the client asked for a specific page
    pub fn page_requested(&self) -> bool {
        self.params.contains("page")
    }

    pub fn query(&self) -> &DocumentQuery {
        &self.query
    }

    pub fn into_query(self) -> DocumentQuery {
        self.query
    }

    fn default_projection() -> Projection {
        Projection::Exclude(vec![VERSION_FIELD.to_string()])
    }
}

/// Integer >= 1, or None. Accepts integral decimals such as "2.0".
fn parse_positive(raw: Option<&str>) -> Option<u64> {
    let raw = raw?.trim();
    if let Ok(n) = raw.parse::<u64>() {
        return (n >= 1).then_some(n);
    }
    let f = raw.parse::<f64>().ok()?;
    (f.is_finite() && f >= 1.0 && f.fract() == 0.0 && f <= u64::MAX as f64).then_some(f as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::document::Document;
    use crate::database::{DocumentStore, MemoryStore};
    use crate::hooks::HookPipeline;
    use crate::models::tour::TOUR_SCHEMA;
    use crate::models::user::USER_SCHEMA;
    use crate::query::types::{Condition, FilterOp, QuerySpec, SortDirection};
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn handle(store: Arc<MemoryStore>) -> DocumentQuery {
        DocumentQuery::new(store, &TOUR_SCHEMA, Arc::new(HookPipeline::new()))
    }

    fn empty_handle() -> DocumentQuery {
        handle(Arc::new(MemoryStore::new()))
    }

    fn apply_all(params: &QueryParams) -> QuerySpec {
        let mut features = QueryFeatures::with_defaults(empty_handle(), params, QueryDefaults::default());
        features.filter().unwrap().sort().unwrap().limit_fields().unwrap().paginate().unwrap();
        features.query().spec().clone()
    }

    fn tour(name: &str, difficulty: &str, rating: f64, price: i64, created: &str) -> Document {
        let Value::Object(doc) = json!({
            "name": name,
            "difficulty": difficulty,
            "ratingsAverage": rating,
            "price": price,
            "summary": "A tour",
            "createdAt": created,
        }) else {
            unreachable!()
        };
        doc
    }

    #[test]
    fn reserved_keys_never_become_filters() {
        let params = QueryParams::from_pairs([
            ("page", "2"),
            ("sort", "price"),
            ("limit", "10"),
            ("fields", "name"),
            ("duration", "5"),
        ]);
        let spec = apply_all(&params);
        let fields: Vec<&str> = spec.filter.conditions().iter().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, vec!["duration"]);
    }

    #[test]
    fn comparison_tokens_map_to_native_operators() {
        let params = QueryParams::from_pairs([("price[gte]", "100"), ("price[lte]", "500")]);
        let spec = apply_all(&params);
        assert_eq!(spec.filter.to_native(), json!({ "price": { "$gte": 100, "$lte": 500 } }));
        assert_eq!(
            spec.filter.conditions(),
            &[
                Condition::new("price", FilterOp::Gte, json!(100)),
                Condition::new("price", FilterOp::Lte, json!(500)),
            ]
        );
    }

    #[test]
    fn plain_values_are_equality_constraints() {
        let params = QueryParams::from_pairs([("difficulty", "easy")]);
        let spec = apply_all(&params);
        assert_eq!(spec.filter.conditions(), &[Condition::new("difficulty", FilterOp::Eq, json!("easy"))]);
    }

    #[test]
    fn cast_failures_are_reported() {
        let params = QueryParams::from_pairs([("price[gte]", "cheap")]);
        let mut features = QueryFeatures::with_defaults(empty_handle(), &params, QueryDefaults::default());
        let err = features.filter().err().unwrap();
        assert_eq!(err, QueryError::Cast { field: "price".into(), value: "cheap".into() });
    }

    #[test]
    fn hidden_fields_cannot_be_queried() {
        let users = DocumentQuery::new(Arc::new(MemoryStore::new()), &USER_SCHEMA, Arc::new(HookPipeline::new()));
        let hidden = |pairs: Vec<(&str, &str)>| -> Result<(), QueryError> {
            let params = QueryParams::from_pairs(pairs);
            let mut features = QueryFeatures::with_defaults(users.clone(), &params, QueryDefaults::default());
            features.filter()?.sort()?.limit_fields().map(|_| ())
        };

        for pairs in [
            vec![("password[gte]", "$argon2id$")],
            vec![("passwordResetToken", "abc")],
            vec![("active", "false")],
            vec![("sort", "name,-passwordResetExpires")],
            vec![("fields", "name,password")],
        ] {
            assert!(matches!(hidden(pairs.clone()), Err(QueryError::InvalidField(_))), "pairs: {:?}", pairs);
        }
        assert!(hidden(vec![("role", "guide"), ("sort", "name"), ("fields", "name,email")]).is_ok());
        // Excluding a hidden field is harmless
        assert!(hidden(vec![("fields", "-password")]).is_ok());
    }

    #[test]
    fn sort_tokens_keep_order_and_direction() {
        let params = QueryParams::from_pairs([("sort", "-price,name")]);
        let spec = apply_all(&params);
        assert_eq!(spec.sort, vec![SortKey::desc("price"), SortKey::asc("name")]);
    }

    #[test]
    fn default_sort_is_newest_first() {
        let spec = apply_all(&QueryParams::new());
        assert_eq!(spec.sort.len(), 1);
        assert_eq!(spec.sort[0].field, "createdAt");
        assert_eq!(spec.sort[0].direction, SortDirection::Desc);
    }

    #[test]
    fn fields_select_and_default_excludes_revision() {
        let spec = apply_all(&QueryParams::from_pairs([("fields", "name,price")]));
        assert_eq!(spec.projection, Projection::Include(vec!["name".into(), "price".into()]));

        let spec = apply_all(&QueryParams::new());
        assert_eq!(spec.projection, Projection::Exclude(vec!["__v".into()]));
    }

    #[test]
    fn pagination_computes_skip() {
        let spec = apply_all(&QueryParams::from_pairs([("page", "2"), ("limit", "10")]));
        assert_eq!((spec.skip, spec.limit), (10, Some(10)));
    }

    #[test]
    fn pagination_defaults_on_missing_or_unusable_values() {
        for pairs in [
            vec![],
            vec![("page", "abc"), ("limit", "xyz")],
            vec![("page", "0"), ("limit", "0")],
            vec![("page", "-3"), ("limit", "-10")],
            vec![("page", "1.5")],
        ] {
            let spec = apply_all(&QueryParams::from_pairs(pairs.clone()));
            assert_eq!((spec.skip, spec.limit), (0, Some(100)), "pairs: {:?}", pairs);
        }
    }

    #[test]
    fn pagination_respects_max_limit() {
        let params = QueryParams::from_pairs([("limit", "5000")]);
        let defaults = QueryDefaults { max_limit: Some(1000), ..QueryDefaults::default() };
        let mut features = QueryFeatures::with_defaults(empty_handle(), &params, defaults);
        features.paginate().unwrap();
        assert_eq!(features.window().limit, 1000);
    }

    #[test]
    fn reapplying_the_chain_is_idempotent() {
        let params = QueryParams::from_pairs([
            ("difficulty", "easy"),
            ("price[lt]", "1000"),
            ("sort", "-price"),
            ("fields", "name"),
            ("page", "3"),
            ("limit", "7"),
        ]);
        let mut features = QueryFeatures::with_defaults(empty_handle(), &params, QueryDefaults::default());
        features.filter().unwrap().sort().unwrap().limit_fields().unwrap().paginate().unwrap();
        let once = features.query().spec().clone();
        features.filter().unwrap().sort().unwrap().limit_fields().unwrap().paginate().unwrap();
        assert_eq!(features.query().spec(), &once);
        assert_eq!((once.skip, once.limit), (14, Some(7)));
    }

    #[test]
    fn page_requested_tracks_client_intent() {
        let params = QueryParams::from_pairs([("page", "abc")]);
        let features = QueryFeatures::with_defaults(empty_handle(), &params, QueryDefaults::default());
        assert!(features.page_requested());

        let params = QueryParams::new();
        let features = QueryFeatures::with_defaults(empty_handle(), &params, QueryDefaults::default());
        assert!(!features.page_requested());
    }

    #[tokio::test]
    async fn end_to_end_filter_sort_project_paginate() {
        let store = Arc::new(MemoryStore::new());
        let ratings = [4.1, 4.9, 4.9, 4.5, 3.8, 4.7, 4.9, 4.2, 4.6, 4.0];
        for (i, rating) in ratings.iter().enumerate() {
            let price = 100 + (i as i64 * 37) % 250;
            let created = format!("2024-01-{:02}T00:00:00.000Z", i + 1);
            store
                .insert(&TOUR_SCHEMA, tour(&format!("Easy Tour Number {}", i), "easy", *rating, price, &created))
                .await
                .unwrap();
        }
        store
            .insert(&TOUR_SCHEMA, tour("The Hard Mountain Trek", "difficult", 5.0, 10, "2024-02-01T00:00:00.000Z"))
            .await
            .unwrap();

        let params = QueryParams::from_pairs([
            ("difficulty", "easy"),
            ("sort", "-ratingsAverage,price"),
            ("fields", "name,price"),
            ("page", "1"),
            ("limit", "5"),
        ]);
        let mut features = QueryFeatures::with_defaults(handle(store.clone()), &params, QueryDefaults::default());
        features.filter().unwrap().sort().unwrap().limit_fields().unwrap().paginate().unwrap();

        assert_eq!(features.query().count().await.unwrap(), 10);
        let docs = features.query().execute().await.unwrap();
        assert_eq!(docs.len(), 5);

        for doc in &docs {
            let mut keys: Vec<&str> = doc.keys().map(String::as_str).collect();
            keys.sort();
            assert_eq!(keys, vec!["_id", "name", "price"]);
        }

        // Reference ordering computed independently from the fixture
        let mut expected: Vec<(f64, i64)> = ratings
            .iter()
            .enumerate()
            .map(|(i, r)| (*r, 100 + (i as i64 * 37) % 250))
            .collect();
        expected.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap().then(a.1.cmp(&b.1)));
        let expected_prices: Vec<i64> = expected.iter().take(5).map(|(_, p)| *p).collect();
        let prices: Vec<i64> = docs.iter().map(|d| d["price"].as_i64().unwrap()).collect();
        assert_eq!(prices, expected_prices);
    }

    #[tokio::test]
    async fn out_of_range_page_is_detectable_before_execution() {
        let store = Arc::new(MemoryStore::new());
        for i in 0..10 {
            store
                .insert(&TOUR_SCHEMA, tour(&format!("Easy Tour Number {}", i), "easy", 4.5, 100, "2024-01-01T00:00:00.000Z"))
                .await
                .unwrap();
        }

        let params = QueryParams::from_pairs([("page", "100"), ("limit", "10")]);
        let mut features = QueryFeatures::with_defaults(handle(store), &params, QueryDefaults::default());
        features.filter().unwrap().paginate().unwrap();

        let total = features.query().count().await.unwrap();
        assert!(features.page_requested());
        assert!(features.window().skip >= total);
    }
}
