//! Normalized query constraints and the archive ordering contract.

use std::cmp::Ordering;
use std::num::NonZeroU32;

use time::{Date, UtcOffset};

use super::entities::PostRecord;
use super::types::PostType;

/// Maximum number of records a listing returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PostLimit {
    #[default]
    Unbounded,
    AtMost(NonZeroU32),
}

impl PostLimit {
    /// Values below one (including the conventional `-1`) mean unbounded.
    pub fn from_posts_per_page(value: i64) -> Self {
        u32::try_from(value)
            .ok()
            .and_then(NonZeroU32::new)
            .map_or(PostLimit::Unbounded, PostLimit::AtMost)
    }

    /// Integer form with `-1` standing for unbounded.
    pub fn as_i64(self) -> i64 {
        match self {
            PostLimit::Unbounded => -1,
            PostLimit::AtMost(limit) => i64::from(limit.get()),
        }
    }

    pub fn apply<T>(self, items: &mut Vec<T>) {
        if let PostLimit::AtMost(limit) = self {
            items.truncate(limit.get() as usize);
        }
    }
}

/// Fully defined filter constraints. Every field has a value, so two criteria
/// describing the same logical query always compare (and encode) equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FilterCriteria {
    pub date_from: Option<Date>,
    pub date_to: Option<Date>,
    pub category_id: Option<i64>,
    pub post_type: PostType,
    pub limit: PostLimit,
}

impl FilterCriteria {
    /// Whether a published record satisfies these constraints. Date bounds are
    /// inclusive and compare the UTC calendar date of `published_at`.
    pub fn matches(&self, post: &PostRecord) -> bool {
        if !self.post_type.admits(post.post_type) {
            return false;
        }

        let published_on = post.published_at.to_offset(UtcOffset::UTC).date();
        if self.date_from.is_some_and(|from| published_on < from) {
            return false;
        }
        if self.date_to.is_some_and(|to| published_on > to) {
            return false;
        }

        match self.category_id {
            Some(category) => post.category_ids.contains(&category),
            None => true,
        }
    }
}

/// Newest first; equal timestamps fall back to the higher id first.
pub fn archive_order(left: &PostRecord, right: &PostRecord) -> Ordering {
    right
        .published_at
        .cmp(&left.published_at)
        .then_with(|| right.id.cmp(&left.id))
}
