//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::criteria::FilterCriteria;
use crate::domain::entities::{CategoryRecord, PostRecord};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Read access to the content store backing the archive.
#[async_trait]
pub trait PostsRepo: Send + Sync {
    /// Published records of the requested type that satisfy `criteria`,
    /// newest first with ties broken by descending id, truncated to the
    /// criteria's limit. Never returns a partial result on failure.
    async fn fetch_posts(&self, criteria: &FilterCriteria) -> Result<Vec<PostRecord>, RepoError>;
}

#[async_trait]
pub trait CategoriesRepo: Send + Sync {
    /// Every category, ordered by name.
    async fn list_categories(&self) -> Result<Vec<CategoryRecord>, RepoError>;
}
