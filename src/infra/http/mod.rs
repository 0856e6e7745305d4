mod archive;
pub mod error;
mod middleware;

pub use archive::{
    ArchiveForm, ArchiveState, CACHE_STATUS_HEADER, SESSION_HEADER, archive_surface, db_health,
    export_archive, issue_token, list_archive,
};
pub use middleware::{RequestContext, log_responses, set_request_context};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use sqlx::Error as SqlxError;

use crate::application::error::ErrorReport;

fn db_health_response(result: Result<(), SqlxError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

pub fn build_router(state: ArchiveState) -> Router {
    Router::new()
        .route("/archive", get(archive_surface))
        .route("/archive/list", post(list_archive))
        .route("/archive/export", post(export_archive))
        .route("/archive/token", get(issue_token))
        .route("/_health/db", get(db_health))
        .route("/static/{*path}", get(crate::infra::assets::serve_asset))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
