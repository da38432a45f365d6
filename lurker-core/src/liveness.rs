// Seed liveness probing: admission filter followed by a bounded HEAD retry loop

use crate::connectivity::ConnectivityWatchdog;
use crate::security::{HostAdmission, HostFilter};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessReason {
    InvalidUrl,
    BannedRange,
    DnsFailure,
    NetworkError,
    RateLimited,
    ServerError,
    ClientErrorSkip,
    Unreachable,
    Alive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessVerdict {
    pub reachable: bool,
    pub reason: LivenessReason,
    /// HEAD requests issued before the verdict was reached.
    pub attempts: usize,
}

impl LivenessVerdict {
    fn rejected(reason: LivenessReason, attempts: usize) -> Self {
        Self {
            reachable: false,
            reason,
            attempts,
        }
    }
}

/// How a single HEAD response steers the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Alive,
    Skip,
    Retry(LivenessReason, Duration),
}

/// Fixed cool-down per failure class. Rate limiting waits longest, client
/// errors never retry.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub network_error_delay: Duration,
    pub rate_limited_delay: Duration,
    pub server_error_delay: Duration,
    pub unexpected_status_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            network_error_delay: Duration::from_secs(15),
            rate_limited_delay: Duration::from_secs(20),
            server_error_delay: Duration::from_secs(10),
            unexpected_status_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn classify(&self, status: u16) -> AttemptOutcome {
        match status {
            200..=399 => AttemptOutcome::Alive,
            429 => AttemptOutcome::Retry(LivenessReason::RateLimited, self.rate_limited_delay),
            500..=u16::MAX => AttemptOutcome::Retry(LivenessReason::ServerError, self.server_error_delay),
            400 | 401 | 403 | 404 => AttemptOutcome::Skip,
            _ => AttemptOutcome::Retry(LivenessReason::Unreachable, self.unexpected_status_delay),
        }
    }
}

#[derive(Clone)]
pub struct LivenessProber {
    client: Client,
    host_filter: Arc<HostFilter>,
    watchdog: Option<Arc<ConnectivityWatchdog>>,
    policy: RetryPolicy,
}

impl LivenessProber {
    pub fn new(client: Client, host_filter: Arc<HostFilter>) -> Self {
        Self {
            client,
            host_filter,
            watchdog: None,
            policy: RetryPolicy::default(),
        }
    }

    /// Block on the watchdog before each probe so retries are not burned
    /// during a local outage.
    pub fn with_watchdog(mut self, watchdog: Arc<ConnectivityWatchdog>) -> Self {
        self.watchdog = Some(watchdog);
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub async fn is_alive(&self, url: &str, timeout: Duration) -> bool {
        self.probe(url, timeout).await.reachable
    }

    pub async fn probe(&self, url: &str, timeout: Duration) -> LivenessVerdict {
        if let Some(ref watchdog) = self.watchdog {
            watchdog.wait_until_connected().await;
        }

        let host = match Url::parse(url) {
            Ok(parsed) => match parsed.host_str() {
                Some(host) => host.to_string(),
                None => {
                    warn!("[INVALID URL]: {}", url);
                    return LivenessVerdict::rejected(LivenessReason::InvalidUrl, 0);
                }
            },
            Err(_) => {
                warn!("[INVALID URL]: {}", url);
                return LivenessVerdict::rejected(LivenessReason::InvalidUrl, 0);
            }
        };

        match self.host_filter.check_host(&host).await {
            HostAdmission::Admitted => {}
            HostAdmission::Banned => {
                info!("{} skipped due to banned range or restricted resolution", url);
                return LivenessVerdict::rejected(LivenessReason::BannedRange, 0);
            }
            HostAdmission::DnsFailure => {
                info!("{} skipped due to banned range or restricted resolution", url);
                return LivenessVerdict::rejected(LivenessReason::DnsFailure, 0);
            }
        }

        for attempt in 1..=self.policy.max_attempts {
            let (reason, delay) = match self.client.head(url).timeout(timeout).send().await {
                Err(e) => {
                    debug!("[NETWORK ERROR]: {}, Retry #{}: {}", url, attempt, e);
                    (LivenessReason::NetworkError, self.policy.network_error_delay)
                }
                Ok(response) => {
                    let status = response.status().as_u16();
                    match self.policy.classify(status) {
                        AttemptOutcome::Alive => {
                            debug!("{} is alive (status {})", url, status);
                            return LivenessVerdict {
                                reachable: true,
                                reason: LivenessReason::Alive,
                                attempts: attempt,
                            };
                        }
                        AttemptOutcome::Skip => {
                            info!("[SKIPPING]: {} - Status: {}", url, status);
                            return LivenessVerdict::rejected(
                                LivenessReason::ClientErrorSkip,
                                attempt,
                            );
                        }
                        AttemptOutcome::Retry(reason, delay) => {
                            match reason {
                                LivenessReason::RateLimited => debug!(
                                    "[RATE LIMITING]: {}, Status Code: {}, Retry #{}",
                                    url, status, attempt
                                ),
                                LivenessReason::ServerError => {
                                    debug!("[RETRYING]: {} - Status: {}", url, status)
                                }
                                _ => warn!(
                                    "[HTTP STATUS]: {}, Status Code: {}, Retry #{}",
                                    url, status, attempt
                                ),
                            }
                            (reason, delay)
                        }
                    }
                }
            };

            if attempt < self.policy.max_attempts {
                debug!("Waiting {:?} after {:?} on {}", delay, reason, url);
                tokio::time::sleep(delay).await;
            }
        }

        debug!("[URL UNREACHABLE]: {}", url);
        LivenessVerdict::rejected(LivenessReason::Unreachable, self.policy.max_attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_follows_cost_table() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.classify(200), AttemptOutcome::Alive);
        assert_eq!(policy.classify(302), AttemptOutcome::Alive);
        assert_eq!(policy.classify(399), AttemptOutcome::Alive);
        assert_eq!(
            policy.classify(429),
            AttemptOutcome::Retry(LivenessReason::RateLimited, Duration::from_secs(20))
        );
        assert_eq!(
            policy.classify(503),
            AttemptOutcome::Retry(LivenessReason::ServerError, Duration::from_secs(10))
        );
        for status in [400, 401, 403, 404] {
            assert_eq!(policy.classify(status), AttemptOutcome::Skip);
        }
        assert_eq!(
            policy.classify(405),
            AttemptOutcome::Retry(LivenessReason::Unreachable, Duration::from_secs(5))
        );
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.network_error_delay, Duration::from_secs(15));
    }
}
