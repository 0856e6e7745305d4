//! Normalization of raw filter input into canonical criteria.
//!
//! Malformed fields never fail a request; they fall back to "no constraint".

use std::collections::HashMap;

use crate::domain::criteria::{FilterCriteria, PostLimit};
use crate::domain::dates::parse_iso_date;
use crate::domain::display::DisplayAttributes;

pub const FIELD_DATE_FROM: &str = "date_from";
pub const FIELD_DATE_TO: &str = "date_to";
pub const FIELD_CATEGORY: &str = "category";

/// Criteria for a listing on the surface described by `display`.
pub fn normalize_filters(
    raw: &HashMap<String, String>,
    display: &DisplayAttributes,
) -> FilterCriteria {
    let field = |name: &str| raw.get(name).map(String::as_str);

    FilterCriteria {
        date_from: field(FIELD_DATE_FROM).and_then(parse_iso_date),
        date_to: field(FIELD_DATE_TO).and_then(parse_iso_date),
        category_id: field(FIELD_CATEGORY).and_then(parse_category),
        post_type: display.post_type,
        limit: PostLimit::from_posts_per_page(display.posts_per_page),
    }
}

/// Criteria for an export: identical to a listing but never truncated.
pub fn normalize_export_filters(
    raw: &HashMap<String, String>,
    display: &DisplayAttributes,
) -> FilterCriteria {
    FilterCriteria {
        limit: PostLimit::Unbounded,
        ..normalize_filters(raw, display)
    }
}

/// Positive integer ids only; `0` means "all categories".
fn parse_category(value: &str) -> Option<i64> {
    value
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
}
