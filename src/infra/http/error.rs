use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::archive::ArchiveError;
use crate::application::error::ErrorReport;
use crate::application::repos::RepoError;

pub mod codes {
    pub const INVALID_NONCE: &str = "invalid_nonce";
    pub const EXPORT_DISABLED: &str = "export_disabled";
    pub const INVALID_FORMAT: &str = "invalid_format";
    pub const BAD_REQUEST: &str = "bad_request";
    pub const DB_TIMEOUT: &str = "db_timeout";
    pub const REPO: &str = "repo_error";
    pub const RENDER: &str = "render_error";
}

/// `{ "success": false, "data": { .. } }`
#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub success: bool,
    pub data: ApiErrorMessage,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
    source: &'static str,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: &'static str,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message,
            hint,
            source: "infra::http::archive",
        }
    }

    pub fn bad_request(message: &'static str, hint: Option<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, message, hint)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    fn with_source(mut self, source: &'static str) -> Self {
        self.source = source;
        self
    }
}

impl From<ArchiveError> for ApiError {
    fn from(err: ArchiveError) -> Self {
        match err {
            ArchiveError::Forbidden(reason) => ApiError::new(
                StatusCode::FORBIDDEN,
                codes::INVALID_NONCE,
                "Security check failed",
                Some(reason.to_string()),
            ),
            ArchiveError::ExportDisabled(format) => ApiError::new(
                StatusCode::BAD_REQUEST,
                codes::EXPORT_DISABLED,
                "Export format is disabled",
                Some(format!("{format} export is turned off in settings")),
            ),
            ArchiveError::InvalidFormat(raw) => ApiError::new(
                StatusCode::BAD_REQUEST,
                codes::INVALID_FORMAT,
                "Unsupported export format",
                Some(format!("`{raw}` is not one of csv, markdown")),
            ),
            ArchiveError::Repo(RepoError::Timeout) => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::DB_TIMEOUT,
                "Content store timed out",
                None,
            )
            .with_source("infra::http::archive::repo"),
            ArchiveError::Repo(inner) => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::REPO,
                "Content store unavailable",
                Some(inner.to_string()),
            )
            .with_source("infra::http::archive::repo"),
            ArchiveError::Domain(inner) => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::RENDER,
                "Listing could not be rendered",
                Some(inner.to_string()),
            ),
            ArchiveError::Render(inner) => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::RENDER,
                "Listing could not be rendered",
                Some(inner.to_string()),
            )
            .with_source(inner.origin()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let detail = format!(
            "{}: {}",
            self.code,
            self.hint.as_deref().unwrap_or(self.message)
        );
        // Hints from server-side failures stay in the log, not the body.
        let hint = if self.status.is_server_error() {
            None
        } else {
            self.hint
        };
        let body = ApiErrorBody {
            success: false,
            data: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.to_string(),
                hint,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        ErrorReport::from_message(self.source, self.status, detail).attach(&mut response);
        response
    }
}
