//! Listing, export and token endpoints.

use std::collections::HashMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Form, Query, State, rejection::FormRejection};
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{Html, IntoResponse, Response};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::application::archive::{ArchiveService, ExportRequest, ListRequest};
use crate::application::filters::{FIELD_CATEGORY, FIELD_DATE_FROM, FIELD_DATE_TO};
use crate::application::listing::ListPayload;
use crate::domain::display::DisplayAttributes;
use crate::infra::db::PostgresRepositories;

use super::error::ApiError;

pub const SESSION_HEADER: &str = "x-archive-session";
pub const CACHE_STATUS_HEADER: &str = "x-archive-cache";

#[derive(Clone)]
pub struct ArchiveState {
    pub archive: Arc<ArchiveService>,
    /// Absent when serving from the in-memory repository.
    pub db: Option<Arc<PostgresRepositories>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ArchiveForm {
    /// JSON-encoded display attributes of the embedding surface.
    pub atts: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub category: Option<String>,
    pub format: Option<String>,
    pub nonce: Option<String>,
}

impl ArchiveForm {
    fn display(&self) -> DisplayAttributes {
        self.atts
            .as_deref()
            .map(DisplayAttributes::from_json_lenient)
            .unwrap_or_default()
    }

    fn filters(&self) -> HashMap<String, String> {
        [
            (FIELD_DATE_FROM, &self.date_from),
            (FIELD_DATE_TO, &self.date_to),
            (FIELD_CATEGORY, &self.category),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.as_ref().map(|v| (name.to_string(), v.clone())))
        .collect()
    }
}

#[derive(Debug, Serialize)]
pub struct ApiSuccess<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiSuccess<T> {
    fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExportBody {
    /// Base64 of the generated file.
    pub content: String,
    pub filename: String,
    pub mime_type: &'static str,
}

#[derive(Debug, Serialize)]
pub struct TokenBody {
    pub nonce: String,
}

fn session_of(headers: &HeaderMap) -> String {
    headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .unwrap_or_default()
        .to_string()
}

fn form_rejection(rejection: FormRejection) -> ApiError {
    ApiError::bad_request("Malformed request body", Some(rejection.body_text()))
}

pub async fn list_archive(
    State(state): State<ArchiveState>,
    headers: HeaderMap,
    form: Result<Form<ArchiveForm>, FormRejection>,
) -> Result<Response, ApiError> {
    let Form(form) = form.map_err(form_rejection)?;
    let request = ListRequest {
        display: form.display(),
        filters: form.filters(),
        nonce: form.nonce,
        session: session_of(&headers),
    };

    let result = state.archive.list(request).await?;
    let cache_status = if result.from_cache { "hit" } else { "miss" };

    let mut response = Json(ApiSuccess::<ListPayload>::new(result.payload)).into_response();
    response
        .headers_mut()
        .insert(CACHE_STATUS_HEADER, HeaderValue::from_static(cache_status));
    Ok(response)
}

pub async fn export_archive(
    State(state): State<ArchiveState>,
    headers: HeaderMap,
    form: Result<Form<ArchiveForm>, FormRejection>,
) -> Result<Json<ApiSuccess<ExportBody>>, ApiError> {
    let Form(form) = form.map_err(form_rejection)?;
    let request = ExportRequest {
        display: form.display(),
        filters: form.filters(),
        format: form.format,
        nonce: form.nonce,
        session: session_of(&headers),
    };

    let document = state.archive.export(request).await?;
    Ok(Json(ApiSuccess::new(ExportBody {
        content: STANDARD.encode(&document.content),
        filename: document.filename,
        mime_type: document.mime_type,
    })))
}

/// The embeddable archive. Query parameters use the text-tag spelling,
/// e.g. `?posts_per_page=10&show_export=0`.
pub async fn archive_surface(
    State(state): State<ArchiveState>,
    headers: HeaderMap,
    Query(attrs): Query<HashMap<String, String>>,
) -> Result<Html<String>, ApiError> {
    let display = DisplayAttributes::from_tag_attributes(&attrs);
    let html = state
        .archive
        .render_surface(&display, &session_of(&headers))
        .await?;
    Ok(Html(html))
}

pub async fn issue_token(State(state): State<ArchiveState>, headers: HeaderMap) -> Json<TokenBody> {
    let nonce = state.archive.issue_nonce(&session_of(&headers));
    Json(TokenBody { nonce })
}

pub async fn db_health(State(state): State<ArchiveState>) -> Response {
    match state.db.as_ref() {
        Some(db) => super::db_health_response(db.health_check().await),
        None => super::db_health_response(Ok(())),
    }
}
