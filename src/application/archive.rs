//! Listing and export request handling.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use metrics::{counter, histogram};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::application::export::{self, ExportDocument};
use crate::application::filters::{normalize_export_filters, normalize_filters};
use crate::application::listing::{ListPayload, render_rows};
use crate::application::nonce::{NonceError, NonceGuard};
use crate::application::repos::{CategoriesRepo, PostsRepo, RepoError};
use crate::application::settings::{ArchiveSettings, SettingsInput, SettingsProvider};
use crate::cache::{ArchiveCache, LIST_NAMESPACE, list_key};
use crate::domain::criteria::FilterCriteria;
use crate::domain::display::DisplayAttributes;
use crate::domain::entities::{CategoryRecord, PostRecord};
use crate::domain::error::DomainError;
use crate::domain::types::ExportFormat;
use crate::presentation::views::{
    ArchiveSurfaceTemplate, TemplateRenderError, render_archive_list, render_archive_surface,
};
use crate::util::clock::Clock;

pub const METRIC_FETCH_MS: &str = "archive_fetch_ms";
pub const METRIC_EXPORT_TOTAL: &str = "archive_export_total";

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error(transparent)]
    Forbidden(#[from] NonceError),
    #[error("{0} export is disabled")]
    ExportDisabled(ExportFormat),
    #[error("unsupported export format `{0}`")]
    InvalidFormat(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Render(#[from] TemplateRenderError),
}

/// A listing request as it arrives from an embedding surface.
#[derive(Debug, Clone, Default)]
pub struct ListRequest {
    pub display: DisplayAttributes,
    pub filters: HashMap<String, String>,
    pub nonce: Option<String>,
    pub session: String,
}

#[derive(Debug, Clone, Default)]
pub struct ExportRequest {
    pub display: DisplayAttributes,
    pub filters: HashMap<String, String>,
    /// Raw format name; absent means CSV.
    pub format: Option<String>,
    pub nonce: Option<String>,
    pub session: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListResult {
    pub payload: ListPayload,
    pub from_cache: bool,
}

#[derive(Clone)]
pub struct ArchiveService {
    posts: Arc<dyn PostsRepo>,
    categories: Option<Arc<dyn CategoriesRepo>>,
    cache: Arc<dyn ArchiveCache>,
    settings: Arc<dyn SettingsProvider>,
    nonces: NonceGuard,
    clock: Arc<dyn Clock>,
}

impl ArchiveService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        cache: Arc<dyn ArchiveCache>,
        settings: Arc<dyn SettingsProvider>,
        nonces: NonceGuard,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            posts,
            categories: None,
            cache,
            settings,
            nonces,
            clock,
        }
    }

    /// Source of the category options shown by the filter controls.
    pub fn with_categories(mut self, categories: Arc<dyn CategoriesRepo>) -> Self {
        self.categories = Some(categories);
        self
    }

    pub fn settings(&self) -> Arc<ArchiveSettings> {
        self.settings.current()
    }

    pub fn issue_nonce(&self, session: &str) -> String {
        self.nonces.issue(session, self.clock.now())
    }

    pub async fn list(&self, request: ListRequest) -> Result<ListResult, ArchiveError> {
        self.nonces
            .verify(request.nonce.as_deref(), &request.session, self.clock.now())?;
        self.listing(&request.display, &request.filters).await
    }

    /// Full embeddable archive for `display`, carrying a fresh token for
    /// `session` and the unfiltered initial listing.
    pub async fn render_surface(
        &self,
        display: &DisplayAttributes,
        session: &str,
    ) -> Result<String, ArchiveError> {
        let settings = self.settings.current();
        let listing = self.listing(display, &HashMap::new()).await?;

        let show_categories = display.show_filters && settings.show_categories;
        let categories = if show_categories {
            self.load_categories().await?
        } else {
            Vec::new()
        };

        let html = render_archive_surface(ArchiveSurfaceTemplate {
            atts_json: display.to_json(),
            nonce: self.issue_nonce(session),
            show_filters: display.show_filters,
            show_categories,
            categories: &categories,
            show_export: display.show_export && settings.export_enabled_any(),
            enable_csv_export: settings.enable_csv_export,
            enable_markdown_export: settings.enable_markdown_export,
            copy_button_text: &settings.copy_button_text,
            export_button_text: &settings.export_button_text,
            listing_html: &listing.payload.html,
        })?;

        debug!(
            target = "content_archive::archive::render_surface",
            rows = listing.payload.rows.len(),
            categories = categories.len(),
            from_cache = listing.from_cache,
            "archive surface rendered"
        );
        Ok(html)
    }

    async fn listing(
        &self,
        display: &DisplayAttributes,
        filters: &HashMap<String, String>,
    ) -> Result<ListResult, ArchiveError> {
        let criteria = normalize_filters(filters, display);
        let key = list_key(display, &criteria);

        if let Some(bytes) = self.cache.get(&key) {
            match serde_json::from_slice::<ListPayload>(&bytes) {
                Ok(payload) => {
                    debug!(
                        target = "content_archive::archive::list",
                        key = %key,
                        rows = payload.rows.len(),
                        "serving cached listing"
                    );
                    return Ok(ListResult {
                        payload,
                        from_cache: true,
                    });
                }
                Err(err) => warn!(
                    target = "content_archive::archive::list",
                    key = %key,
                    error = %err,
                    "discarding undecodable cache entry"
                ),
            }
        }

        let settings = self.settings.current();
        let records = self.fetch(&criteria, "list").await?;
        let rows = render_rows(&records, &settings.date_format)?;
        let html = render_archive_list(&rows)?;
        let payload = ListPayload { html, rows };

        if let Some(ttl) = settings.cache_ttl() {
            match serde_json::to_vec(&payload) {
                Ok(encoded) => self.cache.put(key, Bytes::from(encoded), ttl),
                Err(err) => warn!(
                    target = "content_archive::archive::list",
                    error = %err,
                    "failed to encode listing for cache"
                ),
            }
        }

        Ok(ListResult {
            payload,
            from_cache: false,
        })
    }

    async fn load_categories(&self) -> Result<Vec<CategoryRecord>, ArchiveError> {
        match self.categories.as_ref() {
            Some(repo) => repo.list_categories().await.map_err(|err| {
                warn!(
                    target = "content_archive::archive::categories",
                    error = %err,
                    "category query failed"
                );
                ArchiveError::Repo(err)
            }),
            None => Ok(Vec::new()),
        }
    }

    pub async fn export(&self, request: ExportRequest) -> Result<ExportDocument, ArchiveError> {
        self.nonces
            .verify(request.nonce.as_deref(), &request.session, self.clock.now())?;

        let format = parse_format(request.format.as_deref())?;
        self.generate_export(&request.display, &request.filters, format)
            .await
    }

    /// Export without token verification, for operator surfaces such as the
    /// CLI. Disabled formats are still refused.
    pub async fn generate_export(
        &self,
        display: &DisplayAttributes,
        filters: &HashMap<String, String>,
        format: ExportFormat,
    ) -> Result<ExportDocument, ArchiveError> {
        let settings = self.settings.current();
        if !settings.export_enabled(format) {
            return Err(ArchiveError::ExportDisabled(format));
        }

        let criteria = normalize_export_filters(filters, display);
        let records = self.fetch(&criteria, "export").await?;
        let document = export::generate(format, &records, &settings.date_format, self.clock.now())?;

        counter!(METRIC_EXPORT_TOTAL, "format" => format.as_str()).increment(1);
        info!(
            target = "content_archive::archive::export",
            format = format.as_str(),
            records = records.len(),
            bytes = document.content.len(),
            "export generated"
        );
        Ok(document)
    }

    /// Sanitize and apply new settings, then flush every cached listing.
    pub fn update_settings(&self, input: &SettingsInput) -> Arc<ArchiveSettings> {
        self.settings.replace(input.sanitize());
        self.cache.invalidate(LIST_NAMESPACE);

        let settings = self.settings.current();
        info!(
            target = "content_archive::archive::update_settings",
            date_format = settings.date_format.pattern(),
            cache_duration_secs = settings.cache_duration.as_secs(),
            "archive settings replaced; listing cache flushed"
        );
        settings
    }

    /// Drop every cached listing, e.g. when the service is taken down.
    pub fn clear_cache(&self) {
        self.cache.clear();
        info!(
            target = "content_archive::archive::clear_cache",
            "archive cache cleared"
        );
    }

    async fn fetch(
        &self,
        criteria: &FilterCriteria,
        operation: &'static str,
    ) -> Result<Vec<PostRecord>, ArchiveError> {
        let started_at = Instant::now();
        let result = self.posts.fetch_posts(criteria).await;
        histogram!(METRIC_FETCH_MS, "operation" => operation)
            .record(started_at.elapsed().as_secs_f64() * 1000.0);

        result.map_err(|err| {
            warn!(
                target = "content_archive::archive::fetch",
                operation,
                error = %err,
                "content store query failed"
            );
            ArchiveError::Repo(err)
        })
    }
}

fn parse_format(raw: Option<&str>) -> Result<ExportFormat, ArchiveError> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(ExportFormat::default()),
        Some(value) => value
            .parse()
            .map_err(|_| ArchiveError::InvalidFormat(value.to_string())),
    }
}
