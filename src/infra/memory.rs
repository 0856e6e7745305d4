//! In-process content store, seeded from JSON or built up in tests.

use std::path::Path;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::Deserialize;

use crate::application::repos::{CategoriesRepo, PostsRepo, RepoError};
use crate::cache::lock::{rw_read, rw_write};
use crate::domain::criteria::{FilterCriteria, archive_order};
use crate::domain::entities::{CategoryRecord, PostRecord};
use crate::domain::types::PostStatus;

use super::error::InfraError;

const SOURCE: &str = "infra::memory";

/// One seed entry: a record plus its publication status.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedPost {
    #[serde(flatten)]
    pub record: PostRecord,
    #[serde(default = "published")]
    pub status: PostStatus,
}

fn published() -> PostStatus {
    PostStatus::Published
}

/// Seed files are either a bare array of posts or an object that also lists
/// the categories offered by the filter controls.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SeedDocument {
    Posts(Vec<SeedPost>),
    Full {
        #[serde(default)]
        categories: Vec<CategoryRecord>,
        posts: Vec<SeedPost>,
    },
}

#[derive(Debug, Default)]
pub struct InMemoryPostsRepo {
    posts: RwLock<Vec<(PostRecord, PostStatus)>>,
    categories: RwLock<Vec<CategoryRecord>>,
    fetches: AtomicUsize,
    unavailable: AtomicBool,
}

impl InMemoryPostsRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse seed JSON: an array of [`SeedPost`] entries, or an object with
    /// `posts` and optional `categories`.
    pub fn from_json(raw: &str) -> Result<Self, InfraError> {
        let document: SeedDocument = serde_json::from_str(raw)
            .map_err(|err| InfraError::configuration(format!("invalid seed data: {err}")))?;
        let (categories, seeds) = match document {
            SeedDocument::Posts(posts) => (Vec::new(), posts),
            SeedDocument::Full { categories, posts } => (categories, posts),
        };

        let repo = Self::new();
        for category in categories {
            repo.insert_category(category);
        }
        for seed in seeds {
            repo.insert(seed.record, seed.status);
        }
        Ok(repo)
    }

    pub async fn from_json_file(path: &Path) -> Result<Self, InfraError> {
        let raw = tokio::fs::read_to_string(path).await?;
        Self::from_json(&raw)
    }

    /// Add or replace the record with the same id.
    pub fn insert(&self, record: PostRecord, status: PostStatus) {
        let mut posts = rw_write(&self.posts, SOURCE, "insert");
        posts.retain(|(existing, _)| existing.id != record.id);
        posts.push((record, status));
    }

    /// Add or rename the category with the same id.
    pub fn insert_category(&self, category: CategoryRecord) {
        let mut categories = rw_write(&self.categories, SOURCE, "insert_category");
        categories.retain(|existing| existing.id != category.id);
        categories.push(category);
    }

    pub fn len(&self) -> usize {
        rw_read(&self.posts, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `fetch_posts` calls served so far, failed ones included.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Make subsequent fetches fail as if the store were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl PostsRepo for InMemoryPostsRepo {
    async fn fetch_posts(&self, criteria: &FilterCriteria) -> Result<Vec<PostRecord>, RepoError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepoError::from_persistence("content store unavailable"));
        }

        let mut matched: Vec<PostRecord> = rw_read(&self.posts, SOURCE, "fetch_posts")
            .iter()
            .filter(|(record, status)| *status == PostStatus::Published && criteria.matches(record))
            .map(|(record, _)| record.clone())
            .collect();

        matched.sort_by(archive_order);
        criteria.limit.apply(&mut matched);
        Ok(matched)
    }
}

#[async_trait]
impl CategoriesRepo for InMemoryPostsRepo {
    async fn list_categories(&self) -> Result<Vec<CategoryRecord>, RepoError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepoError::from_persistence("content store unavailable"));
        }

        let mut categories = rw_read(&self.categories, SOURCE, "list_categories").clone();
        categories.sort_by(|left, right| left.name.cmp(&right.name).then(left.id.cmp(&right.id)));
        Ok(categories)
    }
}
