//! Calendar date parsing and configurable display formatting.

use std::fmt;

use time::{
    Date, OffsetDateTime,
    format_description::{self, FormatItem, OwnedFormatItem},
    macros::format_description,
};

use super::error::DomainError;

/// Wire format of date filters and export filenames.
pub const ISO_DATE_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]");
/// Timestamp line of the Markdown export.
pub const GENERATED_AT_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

pub const DEFAULT_DATE_PATTERN: &str = "[year]-[month]-[day]";

/// Parse a `YYYY-MM-DD` calendar date, ignoring surrounding whitespace.
pub fn parse_iso_date(value: &str) -> Option<Date> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    Date::parse(trimmed, ISO_DATE_FORMAT).ok()
}

pub fn format_iso_date(date: Date) -> Result<String, DomainError> {
    date.format(ISO_DATE_FORMAT)
        .map_err(|err| DomainError::invariant(format!("failed to format date: {err}")))
}

/// A validated `time` format description used to render publish dates.
#[derive(Clone, PartialEq, Eq)]
pub struct DateFormat {
    pattern: String,
    items: OwnedFormatItem,
}

impl DateFormat {
    pub fn parse(pattern: &str) -> Result<Self, DomainError> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Err(DomainError::validation("date format must not be empty"));
        }
        let items = format_description::parse_owned::<1>(pattern).map_err(|err| {
            DomainError::validation(format!("invalid date format `{pattern}`: {err}"))
        })?;
        Ok(Self {
            pattern: pattern.to_string(),
            items,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn format(&self, timestamp: OffsetDateTime) -> Result<String, DomainError> {
        timestamp.format(&self.items).map_err(|err| {
            DomainError::invariant(format!(
                "failed to format timestamp with `{}`: {err}",
                self.pattern
            ))
        })
    }
}

impl Default for DateFormat {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_DATE_PATTERN.to_string(),
            items: OwnedFormatItem::from(ISO_DATE_FORMAT),
        }
    }
}

impl fmt::Debug for DateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DateFormat").field(&self.pattern).finish()
    }
}
