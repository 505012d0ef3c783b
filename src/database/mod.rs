pub mod document;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod repository;
pub mod schema;
pub mod store;

pub use document::{Document, ID_FIELD, VERSION_FIELD};
pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use query::DocumentQuery;
pub use repository::{DatabaseError, Repository};
pub use schema::{CollectionSchema, FieldKind};
pub use store::{DocumentStore, StoreError};
