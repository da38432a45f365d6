pub mod connectivity;
pub mod crawl;
pub mod error;
pub mod extract;
pub mod keywords;
pub mod liveness;
pub mod output;
pub mod patterns;
pub mod pipeline;
pub mod security;

pub use connectivity::ConnectivityWatchdog;
pub use crawl::{CrawlOptions, CrawlSummary, SeedOutcome, SeedRunner, SeedStatus, supervise};
pub use error::{CoreError, Result};
pub use extract::{LinkExtractor, register_bindings};
pub use keywords::KeywordFilter;
pub use liveness::{LivenessProber, LivenessReason, LivenessVerdict, RetryPolicy};
pub use output::{OutputFormat, Record};
pub use pipeline::{FileSink, PipelineConsumer, ResultPipeline};
pub use security::{BannedRanges, HostAdmission, HostFilter};
