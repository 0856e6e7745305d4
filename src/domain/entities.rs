//! Domain entities mirrored from the content store.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use url::Url;

use crate::domain::types::PostType;

/// Snapshot of a published content item as needed for listing and export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: i64,
    pub title: String,
    pub post_type: PostType,
    #[serde(with = "time::serde::rfc3339")]
    pub published_at: OffsetDateTime,
    pub permalink: Url,
    #[serde(default)]
    pub category_ids: BTreeSet<i64>,
}

/// A category offered by the listing's filter controls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub id: i64,
    pub name: String,
}
