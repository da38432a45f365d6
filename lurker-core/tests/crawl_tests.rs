// Tests for end-to-end seed processing

use lurker_core::crawl::{CrawlOptions, SeedOutcome, SeedRunner, SeedStatus};
use lurker_core::keywords::KeywordFilter;
use lurker_core::liveness::{LivenessReason, RetryPolicy};
use lurker_core::output::OutputFormat;
use lurker_core::pipeline::{FileSink, ResultPipeline};
use lurker_core::security::{BannedRanges, HostFilter};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const INDEX: &str = r#"<html>
<head>
  <link rel="stylesheet" href="/style.css">
  <script src="/app.js"></script>
</head>
<body>
  <a href="/admin/login">Admin</a>
  <a href="/public/home">Home</a>
  <a href="/admin/login#again">Admin again</a>
</body>
</html>"#;

async fn site() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(INDEX, "text/html"))
        .mount(&server)
        .await;
    server
}

fn loopback_filter() -> Arc<HostFilter> {
    Arc::new(HostFilter::new(BannedRanges::from_cidrs(["10.0.0.0/8"])))
}

fn options() -> CrawlOptions {
    CrawlOptions {
        threads: 2,
        max_depth: 2,
        ..CrawlOptions::default()
    }
}

// ============================================================================
// Seed Processing Tests
// ============================================================================

#[tokio::test]
async fn test_keyword_filtered_crawl() {
    let server = site().await;
    let dir = TempDir::new().unwrap();
    let out_path = dir.path().join("matched_urls.txt");

    let (pipeline, consumer) =
        ResultPipeline::new(2, true, Some(FileSink::open(&out_path).unwrap()));
    let drain = tokio::spawn(async move {
        let mut buf = Vec::new();
        consumer.drain(&mut buf).await.unwrap();
        String::from_utf8(buf).unwrap()
    });

    let mut runner = SeedRunner::new(
        options(),
        KeywordFilter::new(["admin"]),
        pipeline.clone(),
        loopback_filter(),
    )
    .unwrap();

    let seed = format!("{}/", server.uri());
    let outcome = runner.run_seed(&seed).await;
    assert!(matches!(
        outcome,
        SeedOutcome::Completed(SeedStatus::Crawled(_))
    ));

    pipeline.close().await;
    let stdout = drain.await.unwrap();
    let expected = format!("{}/admin/login\n", server.uri());

    assert_eq!(stdout, expected);
    assert_eq!(std::fs::read_to_string(&out_path).unwrap(), expected);
    assert_eq!(runner.summary().crawled, 1);
}

#[tokio::test]
async fn test_source_tags_in_json_output() {
    let server = site().await;
    let (pipeline, consumer) = ResultPipeline::new(4, true, None);
    let drain = tokio::spawn(async move {
        let mut buf = Vec::new();
        consumer.drain(&mut buf).await.unwrap();
        String::from_utf8(buf).unwrap()
    });

    let mut options = options();
    options.max_depth = 1;
    options.format = OutputFormat {
        json: true,
        show_source: false,
        show_where: true,
    };

    let mut runner =
        SeedRunner::new(options, KeywordFilter::default(), pipeline.clone(), loopback_filter())
            .unwrap();
    runner.run_seed(&format!("{}/", server.uri())).await;
    pipeline.close().await;

    let stdout = drain.await.unwrap();
    let records: Vec<lurker_core::Record> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    let has = |source: &str, suffix: &str| {
        records
            .iter()
            .any(|r| r.source == source && r.url.ends_with(suffix) && r.where_ == format!("{}/", server.uri()))
    };
    assert!(has("href", "/admin/login"));
    assert!(has("href", "/public/home"));
    assert!(has("script", "/app.js"));
    assert!(has("css", "/style.css"));
    assert!(has("embedded", "/app.js"));
}

#[tokio::test]
async fn test_banned_seed_is_skipped() {
    let server = site().await;
    let (pipeline, _consumer) = ResultPipeline::new(2, false, None);

    let mut runner = SeedRunner::new(
        options(),
        KeywordFilter::default(),
        pipeline,
        Arc::new(HostFilter::default()),
    )
    .unwrap();

    let outcome = runner.run_seed(&format!("{}/", server.uri())).await;
    assert_eq!(
        outcome,
        SeedOutcome::Completed(SeedStatus::Skipped(LivenessReason::BannedRange))
    );
    assert_eq!(runner.summary().skipped, 1);
}

#[tokio::test]
async fn test_unreachable_seed_is_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let (pipeline, _consumer) = ResultPipeline::new(2, false, None);
    let mut runner = SeedRunner::new(options(), KeywordFilter::default(), pipeline, loopback_filter())
        .unwrap()
        .with_retry_policy(RetryPolicy {
            server_error_delay: Duration::ZERO,
            ..RetryPolicy::default()
        });

    let outcome = runner.run_seed(&format!("{}/", server.uri())).await;
    assert_eq!(
        outcome,
        SeedOutcome::Completed(SeedStatus::Skipped(LivenessReason::ClientErrorSkip))
    );
}

#[tokio::test]
async fn test_slow_seed_times_out_and_run_continues() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
        .mount(&server)
        .await;

    let (pipeline, _consumer) = ResultPipeline::new(2, false, None);
    let mut options = options();
    options.timeout = Some(Duration::from_secs(1));
    let mut runner =
        SeedRunner::new(options, KeywordFilter::default(), pipeline, loopback_filter()).unwrap();

    let started = std::time::Instant::now();
    let outcome = runner.run_seed(&format!("{}/", server.uri())).await;
    assert_eq!(outcome, SeedOutcome::TimedOut);
    assert!(started.elapsed() < Duration::from_secs(5));

    let next = runner.run_seed("not a url").await;
    assert_eq!(
        next,
        SeedOutcome::Completed(SeedStatus::Skipped(LivenessReason::InvalidUrl))
    );
    assert_eq!(runner.summary().timed_out, 1);
    assert_eq!(runner.summary().seeds, 2);
}
