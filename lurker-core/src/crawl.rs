use crate::connectivity::ConnectivityWatchdog;
use crate::error::Result;
use crate::extract::{LinkExtractor, register_bindings};
use crate::keywords::KeywordFilter;
use crate::liveness::{LivenessProber, LivenessReason, RetryPolicy};
use crate::output::OutputFormat;
use crate::pipeline::ResultPipeline;
use crate::security::HostFilter;
use lurker_scanner::{CrawlStats, Crawler, HttpSettings, Scope};
use reqwest::Client;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

/// HEAD timeout used when no per-seed timeout is configured.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Options for configuring a crawl operation
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub threads: usize,
    /// Zero means unlimited.
    pub max_depth: usize,
    /// Page bodies are truncated past this many bytes.
    pub max_page_size: Option<usize>,
    pub include_subdomains: bool,
    pub inside: bool,
    /// Wall-clock budget for one seed, also used as the HEAD timeout.
    pub timeout: Option<Duration>,
    pub format: OutputFormat,
    pub http: HttpSettings,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            threads: 8,
            max_depth: 2,
            max_page_size: None,
            include_subdomains: false,
            inside: false,
            timeout: None,
            format: OutputFormat::default(),
            http: HttpSettings::default(),
        }
    }
}

impl CrawlOptions {
    pub fn probe_timeout(&self) -> Duration {
        self.timeout
            .filter(|t| !t.is_zero())
            .unwrap_or(DEFAULT_PROBE_TIMEOUT)
    }
}

/// What happened to one seed once its work finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedStatus {
    Crawled(CrawlStats),
    Skipped(LivenessReason),
    Failed(String),
}

/// Result of racing a seed's work against its deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedOutcome<T> {
    Completed(T),
    TimedOut,
    /// The work panicked or was cancelled.
    Aborted,
}

/// Run `work` under an optional deadline.
///
/// With a positive timeout the work is spawned and raced against a timer.
/// If the timer wins the seed is logged as timed out and the task is left
/// running; anything it delivers later is absorbed by the closed-pipeline
/// handling.
pub async fn supervise<F>(seed: &str, timeout: Option<Duration>, work: F) -> SeedOutcome<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let Some(limit) = timeout.filter(|t| !t.is_zero()) else {
        return SeedOutcome::Completed(work.await);
    };

    let handle = tokio::spawn(work);
    match tokio::time::timeout(limit, handle).await {
        Ok(Ok(output)) => SeedOutcome::Completed(output),
        Ok(Err(e)) => {
            warn!("Processing of {} aborted: {}", seed, e);
            SeedOutcome::Aborted
        }
        Err(_) => {
            warn!("[timeout] {}", seed);
            SeedOutcome::TimedOut
        }
    }
}

/// Tallies for a whole run, logged at exit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    pub seeds: usize,
    pub crawled: usize,
    pub skipped: usize,
    pub timed_out: usize,
    pub failed: usize,
    pub pages_fetched: usize,
}

impl CrawlSummary {
    pub fn record(&mut self, outcome: &SeedOutcome<SeedStatus>) {
        self.seeds += 1;
        match outcome {
            SeedOutcome::Completed(SeedStatus::Crawled(stats)) => {
                self.crawled += 1;
                self.pages_fetched += stats.pages_fetched;
            }
            SeedOutcome::Completed(SeedStatus::Skipped(_)) => self.skipped += 1,
            SeedOutcome::Completed(SeedStatus::Failed(_)) | SeedOutcome::Aborted => {
                self.failed += 1
            }
            SeedOutcome::TimedOut => self.timed_out += 1,
        }
    }

    pub fn log(&self) {
        info!(
            "Processed {} seeds: {} crawled, {} skipped, {} timed out, {} failed ({} pages fetched)",
            self.seeds, self.crawled, self.skipped, self.timed_out, self.failed, self.pages_fetched
        );
    }
}

/// Everything one seed's background work needs, cloned per seed.
#[derive(Clone)]
struct SeedContext {
    options: CrawlOptions,
    client: Client,
    prober: Arc<LivenessProber>,
    keywords: KeywordFilter,
    pipeline: Arc<ResultPipeline>,
}

/// Processes seeds one at a time against a shared pipeline.
pub struct SeedRunner {
    context: SeedContext,
    summary: CrawlSummary,
}

impl SeedRunner {
    pub fn new(
        options: CrawlOptions,
        keywords: KeywordFilter,
        pipeline: Arc<ResultPipeline>,
        host_filter: Arc<HostFilter>,
    ) -> Result<Self> {
        let client = options.http.build_client()?;
        let prober = LivenessProber::new(client.clone(), host_filter);
        Ok(Self {
            context: SeedContext {
                options,
                client,
                prober: Arc::new(prober),
                keywords,
                pipeline,
            },
            summary: CrawlSummary::default(),
        })
    }

    /// Gate every liveness probe on upstream connectivity.
    pub fn with_watchdog(mut self, watchdog: Arc<ConnectivityWatchdog>) -> Self {
        let prober = (*self.context.prober).clone().with_watchdog(watchdog);
        self.context.prober = Arc::new(prober);
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        let prober = (*self.context.prober).clone().with_policy(policy);
        self.context.prober = Arc::new(prober);
        self
    }

    pub async fn run_seed(&mut self, seed: &str) -> SeedOutcome<SeedStatus> {
        let context = self.context.clone();
        let owned_seed = seed.to_string();
        let outcome = supervise(seed, self.context.options.timeout, async move {
            process_seed(context, owned_seed).await
        })
        .await;

        self.summary.record(&outcome);
        outcome
    }

    pub fn summary(&self) -> &CrawlSummary {
        &self.summary
    }
}

async fn process_seed(context: SeedContext, seed: String) -> SeedStatus {
    let SeedContext {
        options,
        client,
        prober,
        keywords,
        pipeline,
    } = context;

    let verdict = prober.probe(&seed, options.probe_timeout()).await;
    if !verdict.reachable {
        info!("[URL not reachable] {} ({:?})", seed, verdict.reason);
        return SeedStatus::Skipped(verdict.reason);
    }

    let host = match Url::parse(&seed) {
        Ok(parsed) => match parsed.host_str() {
            Some(host) => host.to_string(),
            None => return SeedStatus::Skipped(LivenessReason::InvalidUrl),
        },
        Err(_) => return SeedStatus::Skipped(LivenessReason::InvalidUrl),
    };

    let mut scope = Scope::new(&host).with_subdomains(options.include_subdomains);
    if let Some(host_header) = options.http.host_header() {
        scope = scope.with_host(host_header);
    }

    let extractor = LinkExtractor::new(seed.clone(), pipeline)
        .with_format(options.format)
        .with_keywords(keywords)
        .with_inside(options.inside);

    let crawler = Crawler::new(client, scope)
        .with_max_depth(options.max_depth)
        .with_max_body_size(options.max_page_size);

    let crawler = match register_bindings(crawler, Arc::new(extractor)) {
        Ok(crawler) => crawler,
        Err(e) => return SeedStatus::Failed(e.to_string()),
    };

    match crawler.crawl(&seed, options.threads).await {
        Ok(stats) => SeedStatus::Crawled(stats),
        Err(e) => {
            warn!("Crawl of {} failed: {}", seed, e);
            SeedStatus::Failed(e.to_string())
        }
    }
}
