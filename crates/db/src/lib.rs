//! `db` crate: pure persistence layer.
//!
//! Provides a connection pool, typed row structs, and repository functions
//! for the docflow schema, plus [`PgDocumentStore`] so retrieval can read
//! chunks straight from Postgres. No business logic lives here.

pub mod error;
pub mod models;
pub mod pool;
pub mod repository;
pub mod store;

pub use error::DbError;
pub use pool::DbPool;
pub use store::PgDocumentStore;
