use serde_json::Value;
use std::collections::BTreeSet;
use std::time::Instant;

use crate::database::document::{self, Document, ID_FIELD};
use crate::database::schema::CollectionSchema;
use crate::hooks::error::HookError;
use crate::hooks::traits::HookRing;
use crate::query::QuerySpec;
use crate::types::Operation;

/// Per-read switches that relax the default read hooks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Skip the visibility constraint (secret tours, inactive users)
    pub include_hidden_documents: bool,
}

/// Per-write switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    pub run_validators: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self { run_validators: true }
    }
}

/// A document moving through a write, with change tracking against the
/// stored original
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChange {
    original: Option<Document>,
    fields: Document,
    modified: BTreeSet<String>,
}

impl DocumentChange {
    /// A document that has never been stored
    pub fn new(input: Document) -> Self {
        let modified = input.keys().cloned().collect();
        Self { original: None, fields: input, modified }
    }

    /// Merge a patch over a stored document. Only keys whose value differs
    /// from the original count as changed.
    pub fn for_update(original: Document, patch: Document) -> Self {
        let mut fields = original.clone();
        let mut modified = BTreeSet::new();
        for (key, value) in patch {
            if original.get(&key) != Some(&value) {
                modified.insert(key.clone());
            }
            fields.insert(key, value);
        }
        Self { original: Some(original), fields, modified }
    }

    pub fn is_new(&self) -> bool {
        self.original.is_none()
    }

    pub fn id(&self) -> Option<&str> {
        self.fields.get(ID_FIELD).and_then(Value::as_str)
    }

    pub fn changed(&self, field: &str) -> bool {
        self.modified.contains(field)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        document::get_path(&self.fields, field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    pub fn set(&mut self, field: &str, value: Value) {
        document::set_path(&mut self.fields, field, value);
        self.modified.insert(field.to_string());
    }

    /// Set only when the field is absent
    pub fn set_default(&mut self, field: &str, value: Value) {
        if self.get(field).is_none() {
            self.set(field, value);
        }
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        let removed = document::remove_path(&mut self.fields, field);
        if removed.is_some() {
            self.modified.insert(field.to_string());
        }
        removed
    }

    pub fn fields(&self) -> &Document {
        &self.fields
    }

    pub fn into_document(self) -> Document {
        self.fields
    }
}

/// State that flows through one hook pipeline run
#[derive(Debug)]
pub struct HookContext {
    pub operation: Operation,
    pub schema: &'static CollectionSchema,

    // Write operations
    pub document: Option<DocumentChange>,

    // Select: directives before the store runs, documents after
    pub query: Option<QuerySpec>,
    pub results: Vec<Document>,
    pub options: ReadOptions,

    pub start_time: Instant,
    pub current_ring: Option<HookRing>,
    pub errors: Vec<HookError>,
}

impl HookContext {
    pub fn write(operation: Operation, schema: &'static CollectionSchema, document: DocumentChange) -> Self {
        Self {
            operation,
            schema,
            document: Some(document),
            query: None,
            results: Vec::new(),
            options: ReadOptions::default(),
            start_time: Instant::now(),
            current_ring: None,
            errors: Vec::new(),
        }
    }

    pub fn select(schema: &'static CollectionSchema, query: QuerySpec, options: ReadOptions) -> Self {
        Self {
            operation: Operation::Select,
            schema,
            document: None,
            query: Some(query),
            results: Vec::new(),
            options,
            start_time: Instant::now(),
            current_ring: None,
            errors: Vec::new(),
        }
    }

    /// Context for presenting documents that were already fetched
    pub fn results(
        schema: &'static CollectionSchema,
        results: Vec<Document>,
        options: ReadOptions,
        start_time: Instant,
    ) -> Self {
        Self {
            operation: Operation::Select,
            schema,
            document: None,
            query: None,
            results,
            options,
            start_time,
            current_ring: None,
            errors: Vec::new(),
        }
    }

    pub fn collection(&self) -> &'static str {
        self.schema.name
    }

    pub fn add_error(&mut self, error: HookError) {
        self.errors.push(error);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn execution_time(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }
}
