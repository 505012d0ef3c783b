use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::document::{self, Document, ID_FIELD, VERSION_FIELD};
use super::schema::CollectionSchema;
use super::store::{DocumentStore, StoreError};
use crate::query::{Condition, Filter, FilterOp, QuerySpec, SortDirection, SortKey};

/// In-process document store used for development and tests
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(&self, collection: &str, spec: &QuerySpec) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(collection) else {
            return Ok(vec![]);
        };

        let mut matched: Vec<&Document> = docs.iter().filter(|doc| matches_filter(doc, &spec.filter)).collect();
        if !spec.sort.is_empty() {
            matched.sort_by(|a, b| compare_by_keys(a, b, &spec.sort));
        }

        let skip = usize::try_from(spec.skip).unwrap_or(usize::MAX);
        let limit = spec.limit.map(|l| usize::try_from(l).unwrap_or(usize::MAX)).unwrap_or(usize::MAX);

        Ok(matched
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|doc| spec.projection.apply(doc.clone()))
            .collect())
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let collections = self.collections.read().await;
        let count = collections
            .get(collection)
            .map(|docs| docs.iter().filter(|doc| matches_filter(doc, filter)).count())
            .unwrap_or(0);
        Ok(count as u64)
    }

    async fn insert(&self, schema: &CollectionSchema, mut doc: Document) -> Result<Document, StoreError> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(schema.name.to_string()).or_default();

        let id = match doc.get(ID_FIELD).and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => document::new_id(),
        };
        if docs.iter().any(|d| id_of(d) == Some(id.as_str())) {
            return Err(StoreError::DuplicateId(id));
        }
        check_unique(schema, docs, &id, &doc)?;

        doc.insert(ID_FIELD.to_string(), Value::String(id));
        doc.insert(VERSION_FIELD.to_string(), Value::from(0));
        docs.push(doc.clone());
        Ok(doc)
    }

    async fn replace(
        &self,
        schema: &CollectionSchema,
        id: &str,
        mut doc: Document,
    ) -> Result<Option<Document>, StoreError> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(schema.name) else {
            return Ok(None);
        };
        let Some(index) = docs.iter().position(|d| id_of(d) == Some(id)) else {
            return Ok(None);
        };
        check_unique(schema, docs, id, &doc)?;

        let slot = &mut docs[index];
        let version = slot.get(VERSION_FIELD).and_then(Value::as_i64).unwrap_or(0);
        doc.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
        doc.insert(VERSION_FIELD.to_string(), Value::from(version + 1));
        *slot = doc.clone();
        Ok(Some(doc))
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(false);
        };
        let before = docs.len();
        docs.retain(|d| id_of(d) != Some(id));
        Ok(docs.len() != before)
    }

    async fn delete_all(&self, collection: &str) -> Result<u64, StoreError> {
        let mut collections = self.collections.write().await;
        Ok(collections.remove(collection).map(|docs| docs.len() as u64).unwrap_or(0))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}

fn id_of(doc: &Document) -> Option<&str> {
    doc.get(ID_FIELD).and_then(Value::as_str)
}

/// Runs under the write lock, so no other write can claim the value between
/// the check and the store
fn check_unique(schema: &CollectionSchema, docs: &[Document], id: &str, doc: &Document) -> Result<(), StoreError> {
    for field in schema.unique {
        let Some(value) = doc.get(*field).filter(|v| !v.is_null()) else {
            continue;
        };
        let taken = docs
            .iter()
            .filter(|other| id_of(other) != Some(id))
            .any(|other| other.get(*field).is_some_and(|v| document::values_equal(v, value)));
        if taken {
            return Err(StoreError::Duplicate { field: field.to_string(), value: value.clone() });
        }
    }
    Ok(())
}

pub(crate) fn matches_filter(doc: &Document, filter: &Filter) -> bool {
    filter.conditions().iter().all(|c| matches_condition(doc, c))
}

/// Array fields match when any element satisfies the condition
fn matches_condition(doc: &Document, condition: &Condition) -> bool {
    let actual = document::get_path(doc, &condition.field);
    match condition.op {
        FilterOp::Eq => equals(actual, &condition.value),
        FilterOp::Ne => !equals(actual, &condition.value),
        op => match actual {
            Some(Value::Array(items)) => items.iter().any(|item| compares(item, op, &condition.value)),
            Some(value) => compares(value, op, &condition.value),
            None => false,
        },
    }
}

fn equals(actual: Option<&Value>, expected: &Value) -> bool {
    match actual {
        None | Some(Value::Null) => expected.is_null(),
        Some(Value::Array(items)) if !expected.is_array() => {
            items.iter().any(|item| document::values_equal(item, expected))
        }
        Some(value) => document::values_equal(value, expected),
    }
}

/// Ordered comparisons only between values of the same type
fn compares(actual: &Value, op: FilterOp, expected: &Value) -> bool {
    let comparable = matches!(
        (actual, expected),
        (Value::Number(_), Value::Number(_)) | (Value::String(_), Value::String(_)) | (Value::Bool(_), Value::Bool(_))
    );
    if !comparable {
        return false;
    }

    let ord = document::compare_values(actual, expected);
    match op {
        FilterOp::Gt => ord == Ordering::Greater,
        FilterOp::Gte => ord != Ordering::Less,
        FilterOp::Lt => ord == Ordering::Less,
        FilterOp::Lte => ord != Ordering::Greater,
        FilterOp::Eq => ord == Ordering::Equal,
        FilterOp::Ne => ord != Ordering::Equal,
    }
}

/// Missing fields sort as null: first ascending, last descending
fn compare_by_keys(a: &Document, b: &Document, keys: &[SortKey]) -> Ordering {
    for key in keys {
        let left = document::get_path(a, &key.field).unwrap_or(&Value::Null);
        let right = document::get_path(b, &key.field).unwrap_or(&Value::Null);
        let ord = match key.direction {
            SortDirection::Asc => document::compare_values(left, right),
            SortDirection::Desc => document::compare_values(right, left),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TOUR_SCHEMA;
    use crate::query::Projection;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        document::as_document(value).unwrap()
    }

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        for (name, price, dates) in [
            ("Alpha", 300, json!(["2021-03-01T00:00:00.000Z"])),
            ("Bravo", 100, json!(["2021-07-01T00:00:00.000Z", "2022-01-01T00:00:00.000Z"])),
            ("Charlie", 200, json!([])),
        ] {
            store
                .insert(&TOUR_SCHEMA, doc(json!({ "name": name, "price": price, "startDates": dates })))
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn insert_assigns_identity_and_revision() {
        let store = MemoryStore::new();
        let saved = store.insert(&TOUR_SCHEMA, doc(json!({ "name": "Alpha" }))).await.unwrap();
        assert!(saved.get(ID_FIELD).and_then(Value::as_str).is_some());
        assert_eq!(saved.get(VERSION_FIELD), Some(&json!(0)));

        let duplicate = store.insert(&TOUR_SCHEMA, saved.clone()).await;
        assert!(matches!(duplicate, Err(StoreError::DuplicateId(_))));
    }

    #[tokio::test]
    async fn replace_bumps_revision() {
        let store = MemoryStore::new();
        let saved = store.insert(&TOUR_SCHEMA, doc(json!({ "name": "Alpha" }))).await.unwrap();
        let id = saved[ID_FIELD].as_str().unwrap().to_string();

        let replaced = store
            .replace(&TOUR_SCHEMA, &id, doc(json!({ "name": "Alpha Prime" })))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(replaced[VERSION_FIELD], json!(1));
        assert_eq!(replaced[ID_FIELD], json!(id));
        assert!(store.replace(&TOUR_SCHEMA, "missing", Document::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unique_fields_are_enforced_on_write() {
        let store = seeded().await;
        let err = store.insert(&TOUR_SCHEMA, doc(json!({ "name": "Alpha" }))).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { ref field, ref value } if field == "name" && value == "Alpha"));

        let spec = QuerySpec { filter: Filter::eq("name", "Bravo"), ..QuerySpec::default() };
        let bravo = store.find("tours", &spec).await.unwrap().remove(0);
        let id = bravo[ID_FIELD].as_str().unwrap();

        let err = store.replace(&TOUR_SCHEMA, id, doc(json!({ "name": "Charlie" }))).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { .. }));
        // Keeping its own value is fine
        let kept = store.replace(&TOUR_SCHEMA, id, doc(json!({ "name": "Bravo", "price": 120 }))).await.unwrap();
        assert_eq!(kept.unwrap()["price"], json!(120));
    }

    #[tokio::test]
    async fn find_filters_sorts_and_windows() {
        let store = seeded().await;
        let spec = QuerySpec {
            filter: Filter::new().with("price", FilterOp::Gte, 150),
            sort: vec![SortKey::asc("price")],
            projection: Projection::Include(vec!["name".into()]),
            skip: 0,
            limit: Some(10),
        };
        let docs = store.find("tours", &spec).await.unwrap();
        let names: Vec<&str> = docs.iter().map(|d| d["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["Charlie", "Alpha"]);
        assert!(docs.iter().all(|d| !d.contains_key("price")));

        let spec = QuerySpec { sort: vec![SortKey::desc("price")], skip: 1, limit: Some(1), ..QuerySpec::default() };
        let docs = store.find("tours", &spec).await.unwrap();
        assert_eq!(docs[0]["name"], json!("Charlie"));
    }

    #[tokio::test]
    async fn array_fields_match_any_element() {
        let store = seeded().await;
        let filter = Filter::new().with("startDates", FilterOp::Gte, "2022-01-01T00:00:00.000Z");
        assert_eq!(store.count("tours", &filter).await.unwrap(), 1);

        let filter = Filter::eq("startDates", "2021-03-01T00:00:00.000Z");
        assert_eq!(store.count("tours", &filter).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn not_equal_matches_missing_fields() {
        let store = seeded().await;
        store
            .insert(&TOUR_SCHEMA, doc(json!({ "name": "Secret", "secretTour": true })))
            .await
            .unwrap();
        let filter = Filter::new().with("secretTour", FilterOp::Ne, true);
        assert_eq!(store.count("tours", &filter).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn mixed_types_never_compare() {
        let store = seeded().await;
        let filter = Filter::new().with("price", FilterOp::Gt, "100");
        assert_eq!(store.count("tours", &filter).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn delete_and_delete_all() {
        let store = seeded().await;
        let all = store.find("tours", &QuerySpec::default()).await.unwrap();
        let id = all[0][ID_FIELD].as_str().unwrap();

        assert!(store.delete("tours", id).await.unwrap());
        assert!(!store.delete("tours", id).await.unwrap());
        assert_eq!(store.delete_all("tours").await.unwrap(), 2);
        assert_eq!(store.count("tours", &Filter::new()).await.unwrap(), 0);
    }
}
