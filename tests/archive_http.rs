use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use content_archive::application::archive::ArchiveService;
use content_archive::application::nonce::NonceGuard;
use content_archive::application::settings::{ArchiveSettings, InMemorySettings};
use content_archive::cache::{CacheConfig, MemoryCache};
use content_archive::infra::assets::ARCHIVE_SCRIPT_PATH;
use content_archive::infra::http::{
    ArchiveState, CACHE_STATUS_HEADER, SESSION_HEADER, build_router,
};
use content_archive::infra::memory::InMemoryPostsRepo;
use content_archive::util::clock::{Clock, SystemClock};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

const SESSION: &str = "browser-1";

const SEED: &str = r#"[
    {"id": 10, "title": "Hello, world", "post_type": "post",
     "published_at": "2024-05-02T08:00:00Z", "permalink": "https://example.com/hello"},
    {"id": 11, "title": "Second", "post_type": "post",
     "published_at": "2024-05-01T08:00:00Z", "permalink": "https://example.com/second"},
    {"id": 12, "title": "Colophon", "post_type": "page",
     "published_at": "2024-05-03T08:00:00Z", "permalink": "https://example.com/colophon"}
]"#;

fn app(settings: ArchiveSettings) -> (Router, Arc<InMemoryPostsRepo>) {
    let repo = Arc::new(InMemoryPostsRepo::from_json(SEED).expect("seed should parse"));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let service = ArchiveService::new(
        repo.clone(),
        Arc::new(MemoryCache::new(&CacheConfig::default(), clock.clone())),
        Arc::new(InMemorySettings::new(settings)),
        NonceGuard::new("http-secret", Duration::from_secs(86_400)),
        clock,
    );
    let router = build_router(ArchiveState {
        archive: Arc::new(service),
        db: None,
    });
    (router, repo)
}

fn form(pairs: &[(&str, &str)]) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in pairs {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}

fn post(uri: &str, body: String) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(SESSION_HEADER, SESSION)
        .body(Body::from(body))
        .expect("request should build")
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body should be json")
}

async fn fetch_token(router: &Router) -> String {
    let request = Request::builder()
        .method(Method::GET)
        .uri("/archive/token")
        .header(SESSION_HEADER, SESSION)
        .body(Body::empty())
        .expect("request should build");
    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("router should respond");
    assert_eq!(response.status(), StatusCode::OK);
    json_body(response).await["nonce"]
        .as_str()
        .expect("nonce should be a string")
        .to_string()
}

#[tokio::test]
async fn listing_reports_cache_status_header() {
    let (router, repo) = app(ArchiveSettings::default());
    let nonce = fetch_token(&router).await;

    let mut statuses = Vec::new();
    for _ in 0..2 {
        let response = router
            .clone()
            .oneshot(post("/archive/list", form(&[("nonce", &nonce)])))
            .await
            .expect("router should respond");
        assert_eq!(response.status(), StatusCode::OK);
        statuses.push(
            response
                .headers()
                .get(CACHE_STATUS_HEADER)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string),
        );

        let body = json_body(response).await;
        assert_eq!(body["success"], Value::Bool(true));
        let titles: Vec<&str> = body["data"]["rows"]
            .as_array()
            .expect("rows")
            .iter()
            .filter_map(|row| row["title"].as_str())
            .collect();
        assert_eq!(titles, vec!["Hello, world", "Second"]);
    }

    assert_eq!(
        statuses,
        vec![Some("miss".to_string()), Some("hit".to_string())]
    );
    assert_eq!(repo.fetch_count(), 1);
}

#[tokio::test]
async fn display_attributes_travel_in_the_atts_field() {
    let (router, _) = app(ArchiveSettings::default());
    let nonce = fetch_token(&router).await;

    let response = router
        .clone()
        .oneshot(post(
            "/archive/list",
            form(&[
                ("nonce", &nonce),
                ("atts", r#"{"postType":"any","postsPerPage":2}"#),
            ]),
        ))
        .await
        .expect("router should respond");
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    let titles: Vec<&str> = body["data"]["rows"]
        .as_array()
        .expect("rows")
        .iter()
        .filter_map(|row| row["title"].as_str())
        .collect();
    assert_eq!(titles, vec!["Colophon", "Hello, world"]);
}

#[tokio::test]
async fn invalid_token_is_forbidden() {
    let (router, repo) = app(ArchiveSettings::default());

    let response = router
        .clone()
        .oneshot(post("/archive/list", form(&[("nonce", "forged")])))
        .await
        .expect("router should respond");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = json_body(response).await;
    assert_eq!(body["success"], Value::Bool(false));
    assert_eq!(body["data"]["code"], "invalid_nonce");
    assert_eq!(repo.fetch_count(), 0);
}

#[tokio::test]
async fn export_returns_base64_document() {
    let (router, _) = app(ArchiveSettings::default());
    let nonce = fetch_token(&router).await;

    let response = router
        .clone()
        .oneshot(post(
            "/archive/export",
            form(&[("nonce", &nonce), ("format", "csv"), ("date_from", "2024-05-02")]),
        ))
        .await
        .expect("router should respond");
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    let data = &body["data"];
    assert_eq!(data["mime_type"], "text/csv");
    assert!(
        data["filename"]
            .as_str()
            .is_some_and(|name| name.starts_with("content-archive-") && name.ends_with(".csv"))
    );

    let decoded = STANDARD
        .decode(data["content"].as_str().expect("content"))
        .expect("content should be base64");
    assert_eq!(
        String::from_utf8(decoded).expect("utf-8"),
        "Title,Date,URL\n\"Hello, world\",2024-05-02,https://example.com/hello\n"
    );
}

#[tokio::test]
async fn disabled_export_is_a_client_error() {
    let (router, repo) = app(ArchiveSettings {
        enable_markdown_export: false,
        ..ArchiveSettings::default()
    });
    let nonce = fetch_token(&router).await;

    let response = router
        .clone()
        .oneshot(post(
            "/archive/export",
            form(&[("nonce", &nonce), ("format", "markdown")]),
        ))
        .await
        .expect("router should respond");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["data"]["code"], "export_disabled");
    assert_eq!(repo.fetch_count(), 0);
}

#[tokio::test]
async fn store_failure_is_a_server_error_without_hint() {
    let (router, repo) = app(ArchiveSettings::default());
    repo.set_unavailable(true);
    let nonce = fetch_token(&router).await;

    let response = router
        .clone()
        .oneshot(post("/archive/list", form(&[("nonce", &nonce)])))
        .await
        .expect("router should respond");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["data"]["code"], "repo_error");
    assert!(body["data"]["hint"].is_null());
}

#[tokio::test]
async fn db_health_without_database_is_no_content() {
    let (router, _) = app(ArchiveSettings::default());
    let request = Request::builder()
        .method(Method::GET)
        .uri("/_health/db")
        .body(Body::empty())
        .expect("request should build");

    let response = router.oneshot(request).await.expect("router should respond");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn non_form_body_is_a_bad_request() {
    let (router, repo) = app(ArchiveSettings::default());
    let request = Request::builder()
        .method(Method::POST)
        .uri("/archive/list")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .expect("request should build");

    let response = router.oneshot(request).await.expect("router should respond");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["data"]["code"], "bad_request");
    assert_eq!(repo.fetch_count(), 0);
}

#[tokio::test]
async fn surface_page_respects_tag_attributes() {
    let (router, _) = app(ArchiveSettings::default());
    let request = Request::builder()
        .method(Method::GET)
        .uri("/archive?post_type=page&show_export=0")
        .header(SESSION_HEADER, SESSION)
        .body(Body::empty())
        .expect("request should build");

    let response = router.oneshot(request).await.expect("router should respond");
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes();
    let html = String::from_utf8(bytes.to_vec()).expect("utf-8");

    assert!(html.contains("Colophon"));
    assert!(!html.contains("Hello, world"));
    assert!(!html.contains("archive-export-group"));
    assert!(html.contains("archive-filters"));
}

#[tokio::test]
async fn surface_script_is_served_from_embedded_assets() {
    let (router, _) = app(ArchiveSettings::default());

    let surface = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/archive")
                .body(Body::empty())
                .expect("request should build"),
        )
        .await
        .expect("router should respond");
    let bytes = surface
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes();
    let html = String::from_utf8(bytes.to_vec()).expect("utf-8");
    assert!(html.contains(&format!(r#"src="{ARCHIVE_SCRIPT_PATH}""#)));

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri(ARCHIVE_SCRIPT_PATH)
                .body(Body::empty())
                .expect("request should build"),
        )
        .await
        .expect("router should respond");
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.contains("javascript"));
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes();
    let script = String::from_utf8(bytes.to_vec()).expect("utf-8");
    assert!(script.contains("/archive/list"));
    assert!(script.contains("/archive/export"));
    assert!(script.contains("navigator.clipboard"));

    let missing = router
        .oneshot(
            Request::builder()
                .uri("/static/missing.css")
                .body(Body::empty())
                .expect("request should build"),
        )
        .await
        .expect("router should respond");
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}
