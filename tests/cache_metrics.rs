use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use content_archive::application::archive::{
    ArchiveService, ExportRequest, ListRequest, METRIC_EXPORT_TOTAL, METRIC_FETCH_MS,
};
use content_archive::application::nonce::NonceGuard;
use content_archive::application::settings::{ArchiveSettings, InMemorySettings, SettingsInput};
use content_archive::cache::{
    CacheConfig, METRIC_CACHE_EVICT, METRIC_CACHE_HIT, METRIC_CACHE_INVALIDATE, METRIC_CACHE_MISS,
    METRIC_CACHE_STORE, MemoryCache,
};
use content_archive::domain::display::DisplayAttributes;
use content_archive::infra::memory::InMemoryPostsRepo;
use content_archive::util::clock::{Clock, SystemClock};
use metrics_util::debugging::DebuggingRecorder;

const SEED: &str = r#"[
    {"id": 1, "title": "Only post", "post_type": "post",
     "published_at": "2024-02-10T12:00:00Z", "permalink": "https://example.com/only"}
]"#;

#[tokio::test]
async fn archive_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let cache_config = CacheConfig { capacity: 1 };
    let service = ArchiveService::new(
        Arc::new(InMemoryPostsRepo::from_json(SEED).expect("seed should parse")),
        Arc::new(MemoryCache::new(&cache_config, clock.clone())),
        Arc::new(InMemorySettings::new(ArchiveSettings::default())),
        NonceGuard::new("metrics-secret", Duration::from_secs(3_600)),
        clock,
    );
    let session = "metrics";

    // miss + store, then hit, then a second key evicts the first
    for post_type in ["post", "post", "page"] {
        let request = ListRequest {
            display: DisplayAttributes::from_json_lenient(&format!(
                r#"{{"post_type":"{post_type}"}}"#
            )),
            nonce: Some(service.issue_nonce(session)),
            session: session.to_string(),
            ..ListRequest::default()
        };
        service.list(request).await.expect("list should succeed");
    }

    service
        .export(ExportRequest {
            format: Some("markdown".to_string()),
            nonce: Some(service.issue_nonce(session)),
            session: session.to_string(),
            ..ExportRequest::default()
        })
        .await
        .expect("export should succeed");

    service.update_settings(&SettingsInput::default());

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        METRIC_CACHE_HIT,
        METRIC_CACHE_MISS,
        METRIC_CACHE_STORE,
        METRIC_CACHE_EVICT,
        METRIC_CACHE_INVALIDATE,
        METRIC_EXPORT_TOTAL,
        METRIC_FETCH_MS,
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
