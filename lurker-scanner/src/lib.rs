pub mod crawler;
pub mod element;
pub mod error;
pub mod http;
pub mod scope;

pub use crawler::{CrawlStats, Crawler, ElementCallback};
pub use element::MatchedElement;
pub use error::ScanError;
pub use http::HttpSettings;
pub use scope::Scope;
