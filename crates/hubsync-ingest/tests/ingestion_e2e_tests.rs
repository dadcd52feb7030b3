//! End-to-end tests for the ingestion driver against a mock registry
//!
//! These tests validate the full workflow including:
//! - Cursor pagination across pages
//! - Idempotent re-runs
//! - Backoff on HTTP 429 and the retry ceiling
//! - Per-record write failures and per-source fetch failures

use async_trait::async_trait;
use hubsync_ingest::driver::{FailurePolicy, Ingestor};
use hubsync_ingest::fetcher::{PageFetcher, ReqwestTransport, RetryPolicy};
use hubsync_ingest::models::Record;
use hubsync_ingest::sink::{MemorySink, RecordSink, UpsertOutcome};
use hubsync_ingest::sources::{Source, Tier};
use hubsync_ingest::{FetchError, IngestError, SinkError};
use std::time::Duration;
use url::Url;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

/// Helper to build a registry page
fn page(next: &str, repos: &[(&str, &str, i64, &[&str])]) -> serde_json::Value {
    let results: Vec<_> = repos
        .iter()
        .map(|(namespace, name, size, categories)| {
            serde_json::json!({
                "name": name,
                "namespace": namespace,
                "description": format!("The {} image", name),
                "pull_count": 1_000_000,
                "star_count": 42,
                "is_private": false,
                "last_updated": "2024-09-30T08:15:00.000000Z",
                "media_types": ["application/vnd.oci.image.index.v1+json"],
                "content_types": ["image"],
                "storage_size": size,
                "categories": categories
                    .iter()
                    .map(|c| serde_json::json!({ "name": c, "slug": c.to_lowercase() }))
                    .collect::<Vec<_>>(),
            })
        })
        .collect();

    serde_json::json!({ "count": results.len(), "next": next, "results": results })
}

fn registry_base(server: &MockServer) -> Url {
    Url::parse(&format!("{}/v2/repositories/", server.uri())).unwrap()
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(5, Duration::from_millis(5))
}

fn ingestor<K: RecordSink>(server: &MockServer, sink: K) -> Ingestor<ReqwestTransport, K> {
    let fetcher = PageFetcher::new(ReqwestTransport::new(None).unwrap(), fast_retry());
    Ingestor::new(fetcher, sink, registry_base(server))
}

/// Mount a two-page `library` listing: two repositories, then one more
async fn mount_library(server: &MockServer) {
    let next = format!("{}/cursor/library/2", server.uri());

    Mock::given(method("GET"))
        .and(path("/v2/repositories/library/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            &next,
            &[
                ("library", "nginx", 5 * (1 << 20), &["Web servers"]),
                ("library", "redis", 2048, &["Databases & storage", "Data science"]),
            ],
        )))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/cursor/library/2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            "",
            &[("library", "busybox", 500, &[])],
        )))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_official_root_lands_all_records() {
    let server = MockServer::start().await;
    mount_library(&server).await;

    let mut ingestor = ingestor(&server, MemorySink::new());
    let report = ingestor
        .ingest(&Source::new("library", Tier::Official))
        .await
        .unwrap();

    assert_eq!(report.pages, 2);
    assert_eq!(report.inserted, 3);

    let sink = ingestor.sink();
    assert_eq!(sink.len(), 3);
    assert!(sink.records().all(|r| r.image_type == "Docker Official Image"));

    let nginx = sink.get("library", "nginx").unwrap();
    assert_eq!(nginx.storage_size, "5.00 MB");
    assert_eq!(nginx.categories.columns(), [Some("Web servers"), None, None, None]);

    let redis = sink.get("library", "redis").unwrap();
    assert_eq!(redis.storage_size, "2.00 KB");
    assert_eq!(redis.category, "Databases & storage, Data science");

    let busybox = sink.get("library", "busybox").unwrap();
    assert_eq!(busybox.storage_size, "500 Bytes");
    assert_eq!(busybox.category, "Uncategorized");
    assert!(busybox.categories.is_empty());
}

#[tokio::test]
async fn test_repeat_run_inserts_nothing() {
    let server = MockServer::start().await;
    mount_library(&server).await;

    let sources = [Source::new("library", Tier::Official)];
    let mut ingestor = ingestor(&server, MemorySink::new());

    let first = ingestor.run(&sources, FailurePolicy::Abort).await.unwrap();
    let snapshot: Vec<Record> = ingestor.sink().records().cloned().collect();

    let second = ingestor.run(&sources, FailurePolicy::Abort).await.unwrap();

    assert_eq!(first.inserted(), 3);
    assert_eq!(second.inserted(), 0);
    assert_eq!(second.already_present(), 3);
    let after: Vec<Record> = ingestor.sink().records().cloned().collect();
    assert_eq!(snapshot, after);
}

#[tokio::test]
async fn test_rate_limited_page_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/repositories/alpine/"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(4)
        .with_priority(1)
        .expect(4)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v2/repositories/alpine/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(page("", &[("alpine", "git", 0, &[])])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut ingestor = ingestor(&server, MemorySink::new());
    let report = ingestor
        .ingest(&Source::new("alpine", Tier::Sponsored))
        .await
        .unwrap();

    assert_eq!(report.inserted, 1);
    assert_eq!(
        ingestor.sink().get("alpine", "git").unwrap().image_type,
        "Sponsored OSS"
    );
}

#[tokio::test]
async fn test_retry_ceiling_aborts_source() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/repositories/library/"))
        .respond_with(ResponseTemplate::new(429))
        .expect(5)
        .mount(&server)
        .await;

    let mut ingestor = ingestor(&server, MemorySink::new());
    let err = ingestor
        .run(&[Source::new("library", Tier::Official)], FailurePolicy::Abort)
        .await
        .unwrap_err();

    match err {
        IngestError::Fetch {
            namespace,
            url,
            error: FetchError::RateLimitExceeded { attempts, .. },
        } => {
            assert_eq!(namespace, "library");
            assert!(url.ends_with("/v2/repositories/library/"));
            assert_eq!(attempts, 5);
        },
        other => panic!("unexpected error: {other}"),
    }
    assert!(ingestor.sink().is_empty());
}

#[tokio::test]
async fn test_abort_policy_stops_at_first_failed_source() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/repositories/grafana/"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v2/repositories/kong/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page("", &[("kong", "kong", 0, &[])])))
        .expect(0)
        .mount(&server)
        .await;

    let sources = [
        Source::new("grafana", Tier::Verified),
        Source::new("kong", Tier::Verified),
    ];
    let mut ingestor = ingestor(&server, MemorySink::new());
    let err = ingestor.run(&sources, FailurePolicy::Abort).await.unwrap_err();

    assert_eq!(err.namespace(), "grafana");
    assert!(matches!(
        err,
        IngestError::Fetch {
            error: FetchError::Status { .. },
            ..
        }
    ));
}

#[tokio::test]
async fn test_continue_policy_reports_failed_source() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/repositories/grafana/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"count\": 1, \"results\": ["))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v2/repositories/kong/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page("", &[("kong", "kong", 0, &[])])))
        .expect(1)
        .mount(&server)
        .await;

    let sources = [
        Source::new("grafana", Tier::Verified),
        Source::new("kong", Tier::Verified),
    ];
    let mut ingestor = ingestor(&server, MemorySink::new());
    let report = ingestor.run(&sources, FailurePolicy::Continue).await.unwrap();

    assert!(!report.is_success());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].namespace(), "grafana");
    assert!(matches!(
        report.failed[0],
        IngestError::Fetch {
            error: FetchError::Decode { .. },
            ..
        }
    ));
    assert_eq!(report.completed.len(), 1);
    assert_eq!(report.completed[0].namespace, "kong");
    assert_eq!(ingestor.sink().len(), 1);
}

/// Sink that rejects one repository name and stores the rest
struct RejectingSink {
    reject: &'static str,
    inner: MemorySink,
}

#[async_trait]
impl RecordSink for RejectingSink {
    fn name(&self) -> &str {
        "rejecting"
    }

    async fn upsert(&mut self, record: &Record) -> Result<UpsertOutcome, SinkError> {
        if record.name == self.reject {
            return Err(SinkError::Database(sqlx::Error::PoolTimedOut));
        }
        self.inner.upsert(record).await
    }
}

#[tokio::test]
async fn test_write_failure_skips_record_only() {
    let server = MockServer::start().await;
    mount_library(&server).await;

    let sink = RejectingSink {
        reject: "redis",
        inner: MemorySink::new(),
    };
    let mut ingestor = ingestor(&server, sink);
    let report = ingestor
        .ingest(&Source::new("library", Tier::Official))
        .await
        .unwrap();

    assert_eq!(report.pages, 2);
    assert_eq!(report.inserted, 2);
    assert_eq!(report.failed, 1);

    let sink = ingestor.into_sink();
    assert!(sink.inner.get("library", "redis").is_none());
    assert!(sink.inner.get("library", "busybox").is_some());
}

#[tokio::test]
async fn test_bad_timestamp_keeps_rest_of_page() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/repositories/library/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "count": 2,
            "next": null,
            "results": [
                { "name": "good", "namespace": "library", "last_updated": "2024-05-01T12:34:56Z" },
                { "name": "odd", "namespace": "library", "last_updated": "" },
            ],
        })))
        .mount(&server)
        .await;

    let mut ingestor = ingestor(&server, MemorySink::new());
    let report = ingestor
        .ingest(&Source::new("library", Tier::Official))
        .await
        .unwrap();

    assert_eq!(report.inserted, 2);
    let sink = ingestor.sink();
    assert!(sink.get("library", "good").unwrap().last_updated.is_some());
    assert!(sink.get("library", "odd").unwrap().last_updated.is_none());
}
