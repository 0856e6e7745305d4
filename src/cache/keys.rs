//! Cache key derivation.
//!
//! Keys are a SHA-256 digest over an explicit, versioned text encoding of the
//! display attributes and normalized criteria. The encoding lists every field
//! in a fixed order with a fixed representation, so key stability does not
//! depend on any serializer's field ordering.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::domain::criteria::FilterCriteria;
use crate::domain::display::DisplayAttributes;

/// Namespace shared by every rendered-listing key.
pub const LIST_NAMESPACE: &str = "archive:list:";

/// Bump when the encoding below changes so stale entries can never collide.
const ENCODING_VERSION: &str = "v1";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical text form of one listing request.
pub fn canonical_encoding(display: &DisplayAttributes, criteria: &FilterCriteria) -> String {
    let date = |value: Option<time::Date>| match value {
        Some(date) => format!(
            "{:04}-{:02}-{:02}",
            date.year(),
            u8::from(date.month()),
            date.day()
        ),
        None => "-".to_string(),
    };
    let category = criteria
        .category_id
        .map_or_else(|| "-".to_string(), |id| id.to_string());

    [
        format!("version={ENCODING_VERSION}"),
        format!("display.posts_per_page={}", display.posts_per_page),
        format!("display.post_type={}", display.post_type.as_str()),
        format!("display.show_filters={}", u8::from(display.show_filters)),
        format!("display.show_export={}", u8::from(display.show_export)),
        format!("criteria.date_from={}", date(criteria.date_from)),
        format!("criteria.date_to={}", date(criteria.date_to)),
        format!("criteria.category_id={category}"),
        format!("criteria.post_type={}", criteria.post_type.as_str()),
        format!("criteria.limit={}", criteria.limit.as_i64()),
    ]
    .join("\n")
}

/// Key under which the rendered listing for this request is stored.
pub fn list_key(display: &DisplayAttributes, criteria: &FilterCriteria) -> CacheKey {
    let digest = Sha256::digest(canonical_encoding(display, criteria).as_bytes());
    CacheKey(format!("{LIST_NAMESPACE}{}", hex::encode(digest)))
}
