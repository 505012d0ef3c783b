use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row};
use tracing::{debug, info};

use super::document::{self, Document, ID_FIELD, VERSION_FIELD};
use super::schema::CollectionSchema;
use super::store::{DocumentStore, StoreError};
use crate::query::{Condition, Filter, FilterOp, QuerySpec, SortKey};

const TABLE: &str = "documents";

/// JSONB document store backed by a single PostgreSQL table
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new().max_connections(max_connections).connect(url).await?;
        info!("Connected to PostgreSQL document store");
        Ok(Self { pool })
    }

    /// Create the documents table and one partial unique index per unique
    /// schema field when they do not exist yet
    pub async fn migrate(&self, schemas: &[&CollectionSchema]) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS \"{TABLE}\" (\
                collection TEXT NOT NULL, \
                id TEXT NOT NULL, \
                seq BIGSERIAL, \
                body JSONB NOT NULL, \
                PRIMARY KEY (collection, id))"
        ))
        .execute(&self.pool)
        .await?;

        for schema in schemas {
            for field in schema.unique {
                sqlx::query(&unique_index_sql(schema.name, field)).execute(&self.pool).await?;
                debug!("Ensured unique index on {}.{}", schema.name, field);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PostgresStore {
    async fn find(&self, collection: &str, spec: &QuerySpec) -> Result<Vec<Document>, StoreError> {
        let statement = SqlStatement::select(collection, spec);
        debug!("find: {}", statement.query);

        let rows = statement.bind_all().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| -> Result<Document, StoreError> {
                let Json(body): Json<Value> = row.try_get("body")?;
                let doc = document::as_document(body)
                    .ok_or_else(|| StoreError::Serialization(format!("{} row is not an object", collection)))?;
                Ok(spec.projection.apply(doc))
            })
            .collect()
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let statement = SqlStatement::count(collection, filter);
        debug!("count: {}", statement.query);

        let row = statement.bind_all().fetch_one(&self.pool).await?;
        let count: i64 = row.try_get("count")?;
        Ok(count.max(0) as u64)
    }

    async fn insert(&self, schema: &CollectionSchema, mut doc: Document) -> Result<Document, StoreError> {
        let id = match doc.get(ID_FIELD).and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => document::new_id(),
        };
        doc.insert(ID_FIELD.to_string(), Value::String(id.clone()));
        doc.insert(VERSION_FIELD.to_string(), Value::from(0));

        let result = sqlx::query(&format!("INSERT INTO \"{TABLE}\" (collection, id, body) VALUES ($1, $2, $3)"))
            .bind(schema.name)
            .bind(&id)
            .bind(Json(Value::Object(doc.clone())))
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(doc),
            Err(e) => Err(write_error(schema, &id, &doc, e)),
        }
    }

    async fn replace(
        &self,
        schema: &CollectionSchema,
        id: &str,
        mut doc: Document,
    ) -> Result<Option<Document>, StoreError> {
        let collection = schema.name;
        doc.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
        doc.remove(VERSION_FIELD);

        let row = sqlx::query(&format!(
            "UPDATE \"{TABLE}\" \
             SET body = $3::jsonb || jsonb_build_object('{VERSION_FIELD}', COALESCE((body->>'{VERSION_FIELD}')::bigint, 0) + 1) \
             WHERE collection = $1 AND id = $2 \
             RETURNING body"
        ))
        .bind(collection)
        .bind(id)
        .bind(Json(Value::Object(doc.clone())))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| write_error(schema, id, &doc, e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let Json(body): Json<Value> = row.try_get("body")?;
        document::as_document(body)
            .map(Some)
            .ok_or_else(|| StoreError::Serialization(format!("{} row is not an object", collection)))
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(&format!("DELETE FROM \"{TABLE}\" WHERE collection = $1 AND id = $2"))
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_all(&self, collection: &str) -> Result<u64, StoreError> {
        let result = sqlx::query(&format!("DELETE FROM \"{TABLE}\" WHERE collection = $1"))
            .bind(collection)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "postgres"
    }
}

#[derive(Debug, Clone, PartialEq)]
enum SqlParam {
    Text(String),
    Path(Vec<String>),
    Json(Value),
    Int(i64),
}

/// Parameterised SQL for one store call. Field paths and values are always
/// bound; only fixed fragments are interpolated.
#[derive(Debug)]
struct SqlStatement {
    query: String,
    params: Vec<SqlParam>,
}

impl SqlStatement {
    fn new() -> Self {
        Self { query: String::new(), params: vec![] }
    }

    fn select(collection: &str, spec: &QuerySpec) -> Self {
        let mut statement = Self::new();
        let where_clause = statement.where_clause(collection, &spec.filter);
        let order_clause = statement.order_clause(&spec.sort);

        let mut query = format!("SELECT body FROM \"{TABLE}\" WHERE {where_clause} {order_clause}");
        if let Some(limit) = spec.limit {
            let p = statement.param(SqlParam::Int(clamp_i64(limit)));
            query.push_str(&format!(" LIMIT {p}"));
        }
        if spec.skip > 0 {
            let p = statement.param(SqlParam::Int(clamp_i64(spec.skip)));
            query.push_str(&format!(" OFFSET {p}"));
        }
        statement.query = query;
        statement
    }

    fn count(collection: &str, filter: &Filter) -> Self {
        let mut statement = Self::new();
        let where_clause = statement.where_clause(collection, filter);
        statement.query = format!("SELECT COUNT(*) AS count FROM \"{TABLE}\" WHERE {where_clause}");
        statement
    }

    fn where_clause(&mut self, collection: &str, filter: &Filter) -> String {
        let mut parts = vec![format!("collection = {}", self.param(SqlParam::Text(collection.to_string())))];
        for condition in filter.conditions() {
            parts.push(self.condition(condition));
        }
        parts.join(" AND ")
    }

    fn condition(&mut self, condition: &Condition) -> String {
        let path = self.param(SqlParam::Path(split_path(&condition.field)));
        let field = format!("(body #> {path}::text[])");

        if condition.value.is_null() {
            let is_null = format!("({field} IS NULL OR {field} = 'null'::jsonb)");
            return match condition.op {
                FilterOp::Eq => is_null,
                FilterOp::Ne => format!("NOT {is_null}"),
                _ => "FALSE".to_string(),
            };
        }

        let value = self.param(SqlParam::Json(condition.value.clone()));
        let value = format!("{value}::jsonb");
        let equals = format!(
            "({field} = {value} OR (jsonb_typeof({field}) = 'array' AND {field} @> jsonb_build_array({value})))"
        );

        match condition.op {
            FilterOp::Eq => equals,
            FilterOp::Ne => format!("NOT COALESCE({equals}, FALSE)"),
            op => {
                let sql_op = op.to_sql();
                format!(
                    "((jsonb_typeof({field}) = jsonb_typeof({value}) AND {field} {sql_op} {value}) \
                     OR EXISTS (SELECT 1 FROM jsonb_array_elements(\
                     CASE WHEN jsonb_typeof({field}) = 'array' THEN {field} ELSE '[]'::jsonb END) AS e(item) \
                     WHERE jsonb_typeof(e.item) = jsonb_typeof({value}) AND e.item {sql_op} {value}))"
                )
            }
        }
    }

    fn order_clause(&mut self, keys: &[SortKey]) -> String {
        let mut parts: Vec<String> = keys
            .iter()
            .map(|key| {
                let path = self.param(SqlParam::Path(split_path(&key.field)));
                format!("(body #> {path}::text[]) {}", key.direction.to_sql())
            })
            .collect();
        parts.push("seq ASC".to_string());
        format!("ORDER BY {}", parts.join(", "))
    }

    fn param(&mut self, value: SqlParam) -> String {
        self.params.push(value);
        format!("${}", self.params.len())
    }

    fn bind_all(&self) -> sqlx::query::Query<'_, Postgres, PgArguments> {
        let mut q = sqlx::query(&self.query);
        for p in &self.params {
            q = bind_param(q, p);
        }
        q
    }
}

fn bind_param<'q>(
    q: sqlx::query::Query<'q, Postgres, PgArguments>,
    p: &SqlParam,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match p {
        SqlParam::Text(s) => q.bind(s.clone()),
        SqlParam::Path(segments) => q.bind(segments.clone()),
        SqlParam::Json(v) => q.bind(Json(v.clone())),
        SqlParam::Int(i) => q.bind(*i),
    }
}

fn unique_index_name(collection: &str, field: &str) -> String {
    format!("{TABLE}_{collection}_{field}_key")
}

/// Collection and field names come from static schemas, never from requests
fn unique_index_sql(collection: &str, field: &str) -> String {
    format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS \"{}\" ON \"{TABLE}\" ((body->>'{field}')) WHERE collection = '{collection}'",
        unique_index_name(collection, field)
    )
}

/// Unique violations on a schema index become `Duplicate`; any other
/// violation on insert is the primary key
fn write_error(schema: &CollectionSchema, id: &str, doc: &Document, err: sqlx::Error) -> StoreError {
    let sqlx::Error::Database(db) = &err else {
        return err.into();
    };
    if db.code().as_deref() != Some("23505") {
        return err.into();
    }

    let constraint = db.constraint().unwrap_or_default();
    match schema.unique.iter().find(|field| unique_index_name(schema.name, field) == constraint) {
        Some(field) => StoreError::Duplicate {
            field: field.to_string(),
            value: doc.get(*field).cloned().unwrap_or(Value::Null),
        },
        None => StoreError::DuplicateId(id.to_string()),
    }
}

fn split_path(field: &str) -> Vec<String> {
    field.split('.').map(str::to_string).collect()
}

fn clamp_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Projection;
    use serde_json::json;

    #[test]
    fn select_binds_paths_and_values() {
        let spec = QuerySpec {
            filter: Filter::new().with("price", FilterOp::Gte, 100),
            sort: vec![SortKey::desc("price")],
            projection: Projection::All,
            skip: 10,
            limit: Some(5),
        };
        let statement = SqlStatement::select("tours", &spec);

        assert!(statement.query.starts_with("SELECT body FROM \"documents\" WHERE collection = $1 AND "));
        assert!(statement.query.contains("(body #> $2::text[]) >= $3::jsonb"));
        assert!(statement.query.contains("ORDER BY (body #> $4::text[]) DESC NULLS LAST, seq ASC"));
        assert!(statement.query.ends_with("LIMIT $5 OFFSET $6"));
        assert_eq!(
            statement.params,
            vec![
                SqlParam::Text("tours".into()),
                SqlParam::Path(vec!["price".into()]),
                SqlParam::Json(json!(100)),
                SqlParam::Path(vec!["price".into()]),
                SqlParam::Int(5),
                SqlParam::Int(10),
            ]
        );
    }

    #[test]
    fn not_equal_tolerates_missing_fields() {
        let filter = Filter::new().with("secretTour", FilterOp::Ne, true);
        let statement = SqlStatement::count("tours", &filter);
        assert!(statement.query.starts_with("SELECT COUNT(*) AS count FROM \"documents\""));
        assert!(statement.query.contains("NOT COALESCE("));
    }

    #[test]
    fn null_equality_matches_missing() {
        let filter = Filter::eq("priceDiscount", Value::Null);
        let statement = SqlStatement::count("tours", &filter);
        assert!(statement.query.contains("IS NULL OR"));
        assert_eq!(statement.params.len(), 2);
    }

    #[test]
    fn unique_indexes_are_partial_per_collection() {
        assert_eq!(
            unique_index_sql("users", "email"),
            "CREATE UNIQUE INDEX IF NOT EXISTS \"documents_users_email_key\" ON \"documents\" \
             ((body->>'email')) WHERE collection = 'users'"
        );
    }

    #[test]
    fn dotted_fields_become_path_arrays() {
        assert_eq!(split_path("location.city"), vec!["location".to_string(), "city".to_string()]);
    }
}
