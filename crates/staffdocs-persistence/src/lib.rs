//! PostgreSQL persistence for staffdocs.
//!
//! - `pg`: [`PgDocumentStore`], the diesel implementation of the document
//!   store contract, and the r2d2 pool builder.
//! - `migrations`: embedded schema migrations, applied when a pool is built.
//! - `schema`: diesel table declarations.

pub mod error;
pub mod migrations;
pub mod pg;
pub mod schema;

pub use error::PersistenceError;
pub use migrations::run_pending_migrations;
pub use pg::{build_pool, PgDocumentStore, PgPool};
