//! TaskHub Database: SurrealDB connection management, schema
//! migrations and the entity store (repository implementations).
//!
//! Versioned writes run as `BEGIN`/`COMMIT` transactions that `THROW`
//! when the expected version no longer matches, so concurrent edits are
//! detected rather than merged, and task changes commit together with
//! their audit entries.

mod connection;
mod error;
pub mod repository;
mod schema;

pub use connection::{DbConfig, DbManager};
pub use error::DbError;
pub use schema::run_migrations;
