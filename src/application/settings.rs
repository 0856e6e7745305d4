//! Archive behaviour settings and the provider the service reads them from.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::cache::lock::{rw_read, rw_write};
use crate::domain::dates::DateFormat;
use crate::domain::types::ExportFormat;

const SOURCE: &str = "application::settings";

pub const DEFAULT_CACHE_DURATION_SECS: u64 = 3600;
/// Longest lifetime a cached listing may be given (one year).
pub const MAX_CACHE_DURATION_SECS: u64 = 365 * 24 * 60 * 60;
pub const DEFAULT_COPY_BUTTON_TEXT: &str = "Copy to Clipboard";
pub const DEFAULT_EXPORT_BUTTON_TEXT: &str = "Export";

/// Active archive settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSettings {
    pub date_format: DateFormat,
    /// Lifetime of cached listings; zero disables caching.
    pub cache_duration: Duration,
    pub enable_csv_export: bool,
    pub enable_markdown_export: bool,
    pub show_categories: bool,
    pub copy_button_text: String,
    pub export_button_text: String,
}

impl Default for ArchiveSettings {
    fn default() -> Self {
        Self {
            date_format: DateFormat::default(),
            cache_duration: Duration::from_secs(DEFAULT_CACHE_DURATION_SECS),
            enable_csv_export: true,
            enable_markdown_export: true,
            show_categories: true,
            copy_button_text: DEFAULT_COPY_BUTTON_TEXT.to_string(),
            export_button_text: DEFAULT_EXPORT_BUTTON_TEXT.to_string(),
        }
    }
}

impl ArchiveSettings {
    pub fn export_enabled(&self, format: ExportFormat) -> bool {
        match format {
            ExportFormat::Csv => self.enable_csv_export,
            ExportFormat::Markdown => self.enable_markdown_export,
        }
    }

    pub fn export_enabled_any(&self) -> bool {
        self.enable_csv_export || self.enable_markdown_export
    }

    /// `None` when listings must not be stored.
    pub fn cache_ttl(&self) -> Option<Duration> {
        (!self.cache_duration.is_zero()).then_some(self.cache_duration)
    }
}

/// Raw settings as submitted by a settings form.
///
/// Checkboxes are present only when ticked, so an absent flag reads as off.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SettingsInput {
    pub date_format: Option<String>,
    pub cache_duration: Option<String>,
    pub enable_csv_export: Option<String>,
    pub enable_markdown_export: Option<String>,
    pub show_categories: Option<String>,
    pub copy_button_text: Option<String>,
    pub export_button_text: Option<String>,
}

impl SettingsInput {
    /// Turn untrusted form values into settings. Never fails: bad values fall
    /// back to defaults.
    pub fn sanitize(&self) -> ArchiveSettings {
        let date_format = match self.date_format.as_deref().map(clean_text) {
            None => DateFormat::default(),
            Some(pattern) => DateFormat::parse(&pattern).unwrap_or_else(|err| {
                warn!(
                    target = "content_archive::settings::sanitize",
                    pattern = %pattern,
                    error = %err,
                    "rejected date format; using default"
                );
                DateFormat::default()
            }),
        };

        let cache_duration = match self.cache_duration.as_deref() {
            None => DEFAULT_CACHE_DURATION_SECS,
            Some(raw) => absolute_integer(raw).min(MAX_CACHE_DURATION_SECS),
        };

        ArchiveSettings {
            date_format,
            cache_duration: Duration::from_secs(cache_duration),
            enable_csv_export: is_checked(self.enable_csv_export.as_deref()),
            enable_markdown_export: is_checked(self.enable_markdown_export.as_deref()),
            show_categories: is_checked(self.show_categories.as_deref()),
            copy_button_text: self
                .copy_button_text
                .as_deref()
                .map_or_else(|| DEFAULT_COPY_BUTTON_TEXT.to_string(), clean_text),
            export_button_text: self
                .export_button_text
                .as_deref()
                .map_or_else(|| DEFAULT_EXPORT_BUTTON_TEXT.to_string(), clean_text),
        }
    }
}

fn is_checked(value: Option<&str>) -> bool {
    value.is_some_and(|raw| {
        let raw = raw.trim();
        !raw.is_empty() && raw != "0"
    })
}

/// Leading integer, sign dropped; anything unparsable is zero and anything
/// too large saturates.
fn absolute_integer(raw: &str) -> u64 {
    let trimmed = raw.trim();
    let unsigned = trimmed
        .strip_prefix(['-', '+'])
        .unwrap_or(trimmed);
    let digits: &str = unsigned
        .find(|c: char| !c.is_ascii_digit())
        .map_or(unsigned, |end| &unsigned[..end]);
    if digits.is_empty() {
        return 0;
    }
    digits.parse().unwrap_or(u64::MAX)
}

/// Single-line text with markup removed and whitespace collapsed.
fn clean_text(raw: &str) -> String {
    let mut stripped = String::with_capacity(raw.len());
    let mut in_tag = false;
    for ch in raw.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if in_tag => {}
            c if c.is_control() => stripped.push(' '),
            c => stripped.push(c),
        }
    }
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Where the service reads the active settings from.
pub trait SettingsProvider: Send + Sync {
    fn current(&self) -> Arc<ArchiveSettings>;
    fn replace(&self, settings: ArchiveSettings);
}

#[derive(Debug, Default)]
pub struct InMemorySettings {
    inner: RwLock<Arc<ArchiveSettings>>,
}

impl InMemorySettings {
    pub fn new(settings: ArchiveSettings) -> Self {
        Self {
            inner: RwLock::new(Arc::new(settings)),
        }
    }
}

impl SettingsProvider for InMemorySettings {
    fn current(&self) -> Arc<ArchiveSettings> {
        rw_read(&self.inner, SOURCE, "current").clone()
    }

    fn replace(&self, settings: ArchiveSettings) {
        *rw_write(&self.inner, SOURCE, "replace") = Arc::new(settings);
    }
}
