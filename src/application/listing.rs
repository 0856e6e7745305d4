//! Display rows and the cached listing payload.

use serde::{Deserialize, Serialize};

use crate::domain::dates::DateFormat;
use crate::domain::entities::PostRecord;
use crate::domain::error::DomainError;

/// One rendered line of the listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRow {
    pub title: String,
    pub date: String,
    pub permalink: String,
}

/// What a listing request returns and what the cache stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListPayload {
    pub html: String,
    pub rows: Vec<ListRow>,
}

/// Rows in record order, dates rendered with `date_format`.
pub fn render_rows(
    records: &[PostRecord],
    date_format: &DateFormat,
) -> Result<Vec<ListRow>, DomainError> {
    records
        .iter()
        .map(|record| {
            Ok(ListRow {
                title: record.title.clone(),
                date: date_format.format(record.published_at)?,
                permalink: record.permalink.to_string(),
            })
        })
        .collect()
}
