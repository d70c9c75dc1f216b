//! Storage abstraction for permset.
//!
//! Backend crates (e.g., permset-store-sqlite, permset-store-postgres) implement the
//! [`Store`] trait so `permset-core` doesn't depend on any specific database engine
//! or schema details.

use thiserror::Error;

pub mod scope;
mod store;
mod types;

pub use scope::{build_scope, parse_scope};
pub use store::*;
pub use types::*;

/// Uniform error type for all storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("conflict")]
    Conflict,
    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Conflict | StoreError::Backend(_))
    }
}
