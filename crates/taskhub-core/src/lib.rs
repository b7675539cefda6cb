//! TaskHub Core: domain models, the error taxonomy and the entity
//! store contract (repository traits).

pub mod error;
pub mod models;
pub mod repository;

pub use error::{TaskhubError, TaskhubResult};
