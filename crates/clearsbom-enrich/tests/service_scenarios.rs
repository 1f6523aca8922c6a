//! End-to-end scenarios for the enrichment service against mock
//! ClearlyDefined servers: cache fast paths, rate-limit pacing, 429
//! handling, negative caching, and teardown behavior.

use clearsbom_cache::{ContentError, ContentHandler, MemoryContentHandler};
use clearsbom_enrich::{
    EnrichError, EnrichOutcome, EnrichmentConfig, EnrichmentService, SimpleComponent,
    DECLARED_LICENSE_PROPERTY,
};
use futures::FutureExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn trace_init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("clearsbom_enrich=debug")
        .try_init();
}

async fn service(cache: Arc<MemoryContentHandler>) -> EnrichmentService {
    EnrichmentService::new(EnrichmentConfig::default(), cache)
        .await
        .expect("service must start")
}

fn component() -> Arc<SimpleComponent> {
    Arc::new(SimpleComponent::new("org.example:widget:1.0"))
}

fn definition(license: &str) -> String {
    format!(r#"{{"licensed":{{"declared":"{license}"}}}}"#)
}

#[tokio::test]
async fn cache_hit_resolves_synchronously() {
    trace_init();
    let cache = Arc::new(MemoryContentHandler::new());
    let uri = "https://api.example/test";
    cache
        .save_content(uri, Some(&definition("Apache-2.0")))
        .await
        .unwrap();

    let service = service(Arc::clone(&cache)).await;
    let component = component();
    let future = service
        .submit(component.clone(), Url::parse(uri).unwrap())
        .await;

    // Already resolved when submit returns; nothing was queued.
    let outcome = future.now_or_never().expect("cache hit must pre-resolve");
    assert_eq!(outcome.unwrap(), EnrichOutcome::Enriched);
    assert_eq!(
        component.property(DECLARED_LICENSE_PROPERTY).as_deref(),
        Some("Apache-2.0")
    );
    assert_eq!(service.queued(), 0);
    assert_eq!(service.active(), 0);
    assert_eq!(service.metrics().cache_hits, 1);

    service.shutdown().await;
}

#[tokio::test]
async fn network_fetch_annotates_and_caches() {
    trace_init();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/def"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-ratelimit-limit", "100")
                .insert_header("x-ratelimit-remaining", "99")
                .set_body_string(definition("MIT")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let cache = Arc::new(MemoryContentHandler::new());
    let service = service(Arc::clone(&cache)).await;
    let component = component();
    let uri = Url::parse(&format!("{}/def", server.uri())).unwrap();

    let outcome = service.submit(component.clone(), uri.clone()).await.await;
    assert_eq!(outcome.unwrap(), EnrichOutcome::Enriched);
    assert_eq!(
        component.property(DECLARED_LICENSE_PROPERTY).as_deref(),
        Some("MIT")
    );
    assert_eq!(cache.get_content(uri.as_str()).await.unwrap(), definition("MIT"));

    let limits = service.rate_limit();
    assert_eq!(limits.limit, 100);
    assert_eq!(limits.remaining, 99);
    assert_eq!(service.metrics().fetched, 1);

    service.shutdown().await;
}

#[tokio::test]
async fn exhausted_window_defers_the_next_dispatch() {
    trace_init();
    let server = MockServer::start().await;
    let reset = chrono::Utc::now().timestamp() + 2;
    Mock::given(method("GET"))
        .and(path("/first"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-ratelimit-remaining", "0")
                .insert_header("x-ratelimit-reset", reset.to_string().as_str())
                .set_body_string(definition("MIT")),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/second"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-ratelimit-remaining", "98")
                .set_body_string(definition("BSD-3-Clause")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let service = service(Arc::new(MemoryContentHandler::new())).await;

    let first = service
        .submit(
            component(),
            Url::parse(&format!("{}/first", server.uri())).unwrap(),
        )
        .await
        .await;
    assert_eq!(first.unwrap(), EnrichOutcome::Enriched);
    assert_eq!(service.rate_limit().remaining, 0);

    // The window is exhausted; the second fetch must wait for the reset.
    let start = Instant::now();
    let second = service
        .submit(
            component(),
            Url::parse(&format!("{}/second", server.uri())).unwrap(),
        )
        .await
        .await;
    assert_eq!(second.unwrap(), EnrichOutcome::Enriched);
    // reset was at least a second away when the window closed
    assert!(
        start.elapsed() >= Duration::from_millis(900),
        "second dispatch ran before the window reset ({:?})",
        start.elapsed()
    );
    assert!(service.metrics().rate_limit_waits >= 1);

    service.shutdown().await;
}

#[tokio::test]
async fn throttled_request_is_requeued_and_retried() {
    trace_init();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/throttled"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "1"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/throttled"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-ratelimit-remaining", "97")
                .set_body_string(definition("EPL-2.0")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let service = service(Arc::new(MemoryContentHandler::new())).await;
    let component = component();
    let uri = Url::parse(&format!("{}/throttled", server.uri())).unwrap();

    let start = Instant::now();
    let outcome = service.submit(component.clone(), uri).await.await;
    assert_eq!(outcome.unwrap(), EnrichOutcome::Enriched);
    assert!(
        start.elapsed() >= Duration::from_millis(950),
        "retry ran before the Retry-After delay ({:?})",
        start.elapsed()
    );
    assert_eq!(
        component.property(DECLARED_LICENSE_PROPERTY).as_deref(),
        Some("EPL-2.0")
    );
    assert_eq!(service.metrics().rate_limit_requeues, 1);

    service.shutdown().await;
}

#[tokio::test]
async fn absent_resource_is_negatively_cached() {
    trace_init();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let cache = Arc::new(MemoryContentHandler::new());
    let service = service(Arc::clone(&cache)).await;
    let component = component();
    let uri = Url::parse(&format!("{}/missing", server.uri())).unwrap();

    let outcome = service.submit(component.clone(), uri.clone()).await.await;
    assert_eq!(outcome.unwrap(), EnrichOutcome::Absent);
    assert!(component.properties().is_empty());
    assert!(matches!(
        cache.get_content(uri.as_str()).await,
        Err(ContentError::Absent)
    ));

    // The negative entry short-circuits the next submission; the mock's
    // expect(1) guarantees no second round trip.
    let again = service
        .submit(component.clone(), uri)
        .await
        .now_or_never()
        .expect("negative hit must pre-resolve");
    assert_eq!(again.unwrap(), EnrichOutcome::Absent);
    assert_eq!(service.metrics().negative_hits, 1);

    service.shutdown().await;
}

#[tokio::test]
async fn malformed_payload_still_counts_as_success() {
    trace_init();
    let server = MockServer::start().await;
    let body = r#"{"licensed":{"declared":42}}"#;
    Mock::given(method("GET"))
        .and(path("/odd"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(1)
        .mount(&server)
        .await;

    let cache = Arc::new(MemoryContentHandler::new());
    let service = service(Arc::clone(&cache)).await;
    let component = component();
    let uri = Url::parse(&format!("{}/odd", server.uri())).unwrap();

    let outcome = service.submit(component.clone(), uri.clone()).await.await;
    assert_eq!(outcome.unwrap(), EnrichOutcome::Enriched);
    assert!(component.properties().is_empty());
    assert_eq!(cache.get_content(uri.as_str()).await.unwrap(), body);

    service.shutdown().await;
}

#[tokio::test]
async fn second_submission_takes_the_cache_path() {
    trace_init();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/once"))
        .respond_with(ResponseTemplate::new(200).set_body_string(definition("Apache-2.0")))
        .expect(1)
        .mount(&server)
        .await;

    let service = service(Arc::new(MemoryContentHandler::new())).await;
    let uri = Url::parse(&format!("{}/once", server.uri())).unwrap();

    let first = service.submit(component(), uri.clone()).await.await;
    assert_eq!(first.unwrap(), EnrichOutcome::Enriched);

    let component = component();
    let second = service
        .submit(component.clone(), uri)
        .await
        .now_or_never()
        .expect("populated cache must pre-resolve");
    assert_eq!(second.unwrap(), EnrichOutcome::Enriched);
    assert_eq!(
        component.property(DECLARED_LICENSE_PROPERTY).as_deref(),
        Some("Apache-2.0")
    );
    assert_eq!(service.metrics().cache_hits, 1);

    service.shutdown().await;
}

#[tokio::test]
async fn wait_for_completion_reaches_quiescence() {
    trace_init();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(definition("MIT")))
        .mount(&server)
        .await;

    let service = service(Arc::new(MemoryContentHandler::new())).await;
    let mut futures = Vec::new();
    for i in 0..5 {
        let uri = Url::parse(&format!("{}/def/{i}", server.uri())).unwrap();
        futures.push(service.submit(component(), uri).await);
    }

    tokio::time::timeout(Duration::from_secs(10), service.wait_for_completion())
        .await
        .expect("wait_for_completion must return once the queue drains");
    assert_eq!(service.active(), 0);
    assert_eq!(service.queued(), 0);
    for future in futures {
        assert_eq!(
            future.now_or_never().expect("resolved at quiescence").unwrap(),
            EnrichOutcome::Enriched
        );
    }

    // Idempotent when already idle.
    tokio::time::timeout(Duration::from_secs(1), service.wait_for_completion())
        .await
        .expect("wait_for_completion must return promptly when idle");

    service.shutdown().await;
}

#[tokio::test]
async fn persistent_cache_suppresses_refetch_across_instances() {
    trace_init();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/durable"))
        .respond_with(ResponseTemplate::new(200).set_body_string(definition("Apache-2.0")))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let uri = Url::parse(&format!("{}/durable", server.uri())).unwrap();

    {
        let cache = Arc::new(
            clearsbom_cache::FsContentHandler::open(dir.path())
                .await
                .unwrap(),
        );
        let service = EnrichmentService::new(EnrichmentConfig::default(), cache)
            .await
            .unwrap();
        let first = service.submit(component(), uri.clone()).await.await;
        assert_eq!(first.unwrap(), EnrichOutcome::Enriched);
        service.shutdown().await;
    }

    // A fresh service over the same directory answers from disk; the
    // mock's expect(1) proves no second round trip happened.
    let cache = Arc::new(
        clearsbom_cache::FsContentHandler::open(dir.path())
            .await
            .unwrap(),
    );
    let service = EnrichmentService::new(EnrichmentConfig::default(), cache)
        .await
        .unwrap();
    let component = component();
    let outcome = service
        .submit(component.clone(), uri)
        .await
        .now_or_never()
        .expect("disk hit must pre-resolve");
    assert_eq!(outcome.unwrap(), EnrichOutcome::Enriched);
    assert_eq!(
        component.property(DECLARED_LICENSE_PROPERTY).as_deref(),
        Some("Apache-2.0")
    );

    service.shutdown().await;
}

#[tokio::test]
async fn persistent_failures_exhaust_their_attempts() {
    trace_init();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let config = EnrichmentConfig {
        max_attempts: 2,
        ..EnrichmentConfig::default()
    };
    let service = EnrichmentService::new(config, Arc::new(MemoryContentHandler::new()))
        .await
        .unwrap();
    let uri = Url::parse(&format!("{}/broken", server.uri())).unwrap();

    let outcome = service.submit(component(), uri).await.await;
    assert!(matches!(
        outcome,
        Err(EnrichError::RetriesExhausted { attempts: 2, .. })
    ));
    assert_eq!(service.metrics().abandoned, 1);

    service.shutdown().await;
}

#[tokio::test]
async fn shutdown_resolves_parked_requests() {
    trace_init();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/parked"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "60"))
        .mount(&server)
        .await;

    let service = service(Arc::new(MemoryContentHandler::new())).await;
    let uri = Url::parse(&format!("{}/parked", server.uri())).unwrap();
    let future = service.submit(component(), uri.clone()).await;

    // Wait for the 429 to park the request behind the exhausted window.
    let deadline = Instant::now() + Duration::from_secs(5);
    while service.metrics().rate_limit_requeues == 0 {
        assert!(Instant::now() < deadline, "request never hit the server");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    service.shutdown().await;
    assert!(matches!(future.await, Err(EnrichError::ServiceStopped)));

    // Submissions after shutdown fail fast.
    let rejected = service
        .submit(component(), uri)
        .await
        .now_or_never()
        .expect("post-shutdown submit must pre-resolve");
    assert!(matches!(rejected, Err(EnrichError::ServiceStopped)));
}
