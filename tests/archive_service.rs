use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use content_archive::application::archive::{
    ArchiveError, ArchiveService, ExportRequest, ListRequest,
};
use content_archive::application::nonce::{NonceError, NonceGuard};
use content_archive::application::settings::{
    ArchiveSettings, InMemorySettings, MAX_CACHE_DURATION_SECS, SettingsInput,
};
use content_archive::cache::{CacheConfig, MemoryCache};
use content_archive::domain::display::DisplayAttributes;
use content_archive::domain::types::ExportFormat;
use content_archive::infra::memory::InMemoryPostsRepo;
use content_archive::util::clock::{Clock, ManualClock};
use time::macros::datetime;

const SESSION: &str = "reader-session";

const SEED: &str = r#"[
    {"id": 1, "title": "B", "post_type": "post",
     "published_at": "2024-01-01T10:00:00Z", "permalink": "https://example.com/b",
     "category_ids": [4]},
    {"id": 2, "title": "A", "post_type": "post",
     "published_at": "2024-01-02T10:00:00Z", "permalink": "https://example.com/a"}
]"#;

struct Harness {
    repo: Arc<InMemoryPostsRepo>,
    cache: Arc<MemoryCache>,
    clock: Arc<ManualClock>,
    service: ArchiveService,
}

impl Harness {
    fn new(settings: ArchiveSettings) -> Self {
        let repo = Arc::new(InMemoryPostsRepo::from_json(SEED).expect("seed should parse"));
        let clock = Arc::new(ManualClock::new(datetime!(2024-03-01 12:00 UTC)));
        let shared_clock: Arc<dyn Clock> = clock.clone();
        let cache = Arc::new(MemoryCache::new(&CacheConfig::default(), shared_clock.clone()));
        let service = ArchiveService::new(
            repo.clone(),
            cache.clone(),
            Arc::new(InMemorySettings::new(settings)),
            NonceGuard::new("integration-secret", Duration::from_secs(86_400)),
            shared_clock,
        );
        Self {
            repo,
            cache,
            clock,
            service,
        }
    }

    fn list_request(&self, filters: &[(&str, &str)]) -> ListRequest {
        ListRequest {
            display: DisplayAttributes::default(),
            filters: to_map(filters),
            nonce: Some(self.service.issue_nonce(SESSION)),
            session: SESSION.to_string(),
        }
    }

    fn export_request(&self, format: Option<&str>) -> ExportRequest {
        ExportRequest {
            display: DisplayAttributes::default(),
            filters: HashMap::new(),
            format: format.map(str::to_string),
            nonce: Some(self.service.issue_nonce(SESSION)),
            session: SESSION.to_string(),
        }
    }
}

fn to_map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

fn titles(service_rows: &[content_archive::application::listing::ListRow]) -> Vec<&str> {
    service_rows.iter().map(|row| row.title.as_str()).collect()
}

#[tokio::test]
async fn listing_and_csv_export_share_newest_first_order() {
    let harness = Harness::new(ArchiveSettings::default());

    let result = harness
        .service
        .list(harness.list_request(&[]))
        .await
        .expect("list should succeed");
    assert_eq!(titles(&result.payload.rows), vec!["A", "B"]);
    assert!(result.payload.html.contains("archive-posts-table"));

    let document = harness
        .service
        .export(harness.export_request(None))
        .await
        .expect("export should succeed");
    assert_eq!(document.format, ExportFormat::Csv);
    assert_eq!(document.filename, "content-archive-2024-03-01.csv");
    assert_eq!(
        std::str::from_utf8(&document.content).expect("utf-8"),
        "Title,Date,URL\nA,2024-01-02,https://example.com/a\nB,2024-01-01,https://example.com/b\n"
    );
}

#[tokio::test]
async fn second_identical_request_is_served_from_cache() {
    let harness = Harness::new(ArchiveSettings::default());

    let first = harness
        .service
        .list(harness.list_request(&[("category", "4")]))
        .await
        .expect("first list");
    let second = harness
        .service
        .list(harness.list_request(&[("category", "4")]))
        .await
        .expect("second list");

    assert!(!first.from_cache);
    assert!(second.from_cache);
    assert_eq!(first.payload, second.payload);
    assert_eq!(titles(&second.payload.rows), vec!["B"]);
    assert_eq!(harness.repo.fetch_count(), 1);
}

#[tokio::test]
async fn zero_cache_duration_always_queries_the_store() {
    let harness = Harness::new(ArchiveSettings {
        cache_duration: Duration::ZERO,
        ..ArchiveSettings::default()
    });

    for _ in 0..2 {
        let result = harness
            .service
            .list(harness.list_request(&[]))
            .await
            .expect("list");
        assert!(!result.from_cache);
    }
    assert_eq!(harness.repo.fetch_count(), 2);
    assert!(harness.cache.is_empty());
}

#[tokio::test]
async fn cached_listing_expires_after_cache_duration() {
    let harness = Harness::new(ArchiveSettings {
        cache_duration: Duration::from_secs(60),
        ..ArchiveSettings::default()
    });

    harness
        .service
        .list(harness.list_request(&[]))
        .await
        .expect("prime");
    harness.clock.advance(Duration::from_secs(61));
    let result = harness
        .service
        .list(harness.list_request(&[]))
        .await
        .expect("after expiry");

    assert!(!result.from_cache);
    assert_eq!(harness.repo.fetch_count(), 2);
}

#[tokio::test]
async fn exports_always_read_the_store_and_never_fill_the_cache() {
    let harness = Harness::new(ArchiveSettings::default());

    for _ in 0..2 {
        harness
            .service
            .export(harness.export_request(Some("csv")))
            .await
            .expect("export");
    }

    assert_eq!(harness.repo.fetch_count(), 2);
    assert!(harness.cache.is_empty());

    harness
        .service
        .list(harness.list_request(&[]))
        .await
        .expect("list");
    harness
        .service
        .export(harness.export_request(None))
        .await
        .expect("export after list");
    assert_eq!(harness.repo.fetch_count(), 4);
    assert_eq!(harness.cache.len(), 1);
}

#[tokio::test]
async fn disabled_format_is_refused_before_querying() {
    let harness = Harness::new(ArchiveSettings {
        enable_markdown_export: false,
        ..ArchiveSettings::default()
    });

    let err = harness
        .service
        .export(harness.export_request(Some("markdown")))
        .await
        .expect_err("markdown disabled");
    assert!(matches!(
        err,
        ArchiveError::ExportDisabled(ExportFormat::Markdown)
    ));
    assert_eq!(harness.repo.fetch_count(), 0);
}

#[tokio::test]
async fn unknown_format_is_rejected() {
    let harness = Harness::new(ArchiveSettings::default());
    let err = harness
        .service
        .export(harness.export_request(Some("xlsx")))
        .await
        .expect_err("xlsx is unsupported");
    assert!(matches!(err, ArchiveError::InvalidFormat(ref value) if value == "xlsx"));
    assert_eq!(harness.repo.fetch_count(), 0);
}

#[tokio::test]
async fn bad_or_missing_token_is_forbidden_without_querying() {
    let harness = Harness::new(ArchiveSettings::default());

    let mut forged = harness.list_request(&[]);
    forged.nonce = Some("0000000000".to_string());
    let err = harness.service.list(forged).await.expect_err("forged");
    assert!(matches!(err, ArchiveError::Forbidden(NonceError::Invalid)));

    let mut missing = harness.export_request(None);
    missing.nonce = None;
    let err = harness.service.export(missing).await.expect_err("missing");
    assert!(matches!(err, ArchiveError::Forbidden(NonceError::Missing)));

    let mut other_session = harness.list_request(&[]);
    other_session.session = "someone-else".to_string();
    let err = harness
        .service
        .list(other_session)
        .await
        .expect_err("token bound to session");
    assert!(matches!(err, ArchiveError::Forbidden(_)));

    assert_eq!(harness.repo.fetch_count(), 0);
}

#[tokio::test]
async fn store_failure_surfaces_and_caches_nothing() {
    let harness = Harness::new(ArchiveSettings::default());
    harness.repo.set_unavailable(true);

    let err = harness
        .service
        .list(harness.list_request(&[]))
        .await
        .expect_err("store down");
    assert!(matches!(err, ArchiveError::Repo(_)));
    assert!(harness.cache.is_empty());

    harness.repo.set_unavailable(false);
    let result = harness
        .service
        .list(harness.list_request(&[]))
        .await
        .expect("store back");
    assert!(!result.from_cache);
    assert_eq!(harness.repo.fetch_count(), 2);
}

#[tokio::test]
async fn malformed_date_filter_behaves_like_no_filter() {
    let harness = Harness::new(ArchiveSettings::default());

    let unfiltered = harness
        .service
        .list(harness.list_request(&[]))
        .await
        .expect("unfiltered");
    let malformed = harness
        .service
        .list(harness.list_request(&[("date_from", "not-a-date")]))
        .await
        .expect("malformed");

    assert_eq!(unfiltered.payload, malformed.payload);
    assert!(malformed.from_cache);
}

#[tokio::test]
async fn date_range_is_inclusive() {
    let harness = Harness::new(ArchiveSettings::default());
    let result = harness
        .service
        .list(harness.list_request(&[("date_from", "2024-01-02"), ("date_to", "2024-01-02")]))
        .await
        .expect("list");
    assert_eq!(titles(&result.payload.rows), vec!["A"]);
}

#[tokio::test]
async fn updating_settings_flushes_cached_listings() {
    let harness = Harness::new(ArchiveSettings::default());

    harness
        .service
        .list(harness.list_request(&[]))
        .await
        .expect("prime");
    assert_eq!(harness.cache.len(), 1);

    let updated = harness.service.update_settings(&SettingsInput {
        date_format: Some("[day]/[month]/[year]".to_string()),
        enable_csv_export: Some("1".to_string()),
        ..SettingsInput::default()
    });
    assert!(harness.cache.is_empty());
    assert!(!updated.enable_markdown_export);

    let result = harness
        .service
        .list(harness.list_request(&[]))
        .await
        .expect("relist");
    assert!(!result.from_cache);
    assert_eq!(result.payload.rows[0].date, "02/01/2024");
}

#[tokio::test]
async fn surface_embeds_controls_token_and_initial_listing() {
    let repo = Arc::new(
        InMemoryPostsRepo::from_json(
            r#"{
                "categories": [{"id": 4, "name": "Notes"}],
                "posts": [{"id": 1, "title": "Only", "post_type": "post",
                           "published_at": "2024-01-01T10:00:00Z",
                           "permalink": "https://example.com/only", "category_ids": [4]}]
            }"#,
        )
        .expect("seed should parse"),
    );
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(datetime!(2024-03-01 12:00 UTC)));
    let service = ArchiveService::new(
        repo.clone(),
        Arc::new(MemoryCache::new(&CacheConfig::default(), clock.clone())),
        Arc::new(InMemorySettings::new(ArchiveSettings {
            enable_csv_export: false,
            ..ArchiveSettings::default()
        })),
        NonceGuard::new("integration-secret", Duration::from_secs(86_400)),
        clock,
    )
    .with_categories(repo.clone());

    let html = service
        .render_surface(&DisplayAttributes::default(), SESSION)
        .await
        .expect("surface should render");

    assert!(html.contains(&format!(
        r#"data-nonce="{}""#,
        service.issue_nonce(SESSION)
    )));
    assert!(html.contains(r#"<option value="4">Notes</option>"#));
    assert!(html.contains(r#"data-format="markdown""#));
    assert!(!html.contains(r#"data-format="csv""#));
    assert!(html.contains("Only"));

    // The initial listing shares the cache with list requests.
    let listed = service
        .list(ListRequest {
            display: DisplayAttributes::default(),
            filters: HashMap::new(),
            nonce: Some(service.issue_nonce(SESSION)),
            session: SESSION.to_string(),
        })
        .await
        .expect("list");
    assert!(listed.from_cache);
    assert_eq!(repo.fetch_count(), 1);
}

#[tokio::test]
async fn clearing_the_cache_forces_a_fresh_listing() {
    let harness = Harness::new(ArchiveSettings::default());

    harness
        .service
        .list(harness.list_request(&[]))
        .await
        .expect("prime");
    harness
        .service
        .list(harness.list_request(&[("category", "4")]))
        .await
        .expect("prime filtered");
    assert_eq!(harness.cache.len(), 2);

    harness.service.clear_cache();
    assert!(harness.cache.is_empty());

    let result = harness
        .service
        .list(harness.list_request(&[]))
        .await
        .expect("relist");
    assert!(!result.from_cache);
    assert_eq!(harness.repo.fetch_count(), 3);
}

#[tokio::test]
async fn huge_submitted_cache_duration_is_capped_and_served() {
    let harness = Harness::new(ArchiveSettings::default());

    let updated = harness.service.update_settings(&SettingsInput {
        cache_duration: Some("18446744073709551615".to_string()),
        ..SettingsInput::default()
    });
    assert_eq!(
        updated.cache_duration,
        Duration::from_secs(MAX_CACHE_DURATION_SECS)
    );

    let first = harness
        .service
        .list(harness.list_request(&[]))
        .await
        .expect("first list");
    let second = harness
        .service
        .list(harness.list_request(&[]))
        .await
        .expect("second list");

    assert!(!first.from_cache);
    assert!(second.from_cache);
    assert_eq!(harness.repo.fetch_count(), 1);
}
