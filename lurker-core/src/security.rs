// Address-range admission checks for seed hosts

use futures::future::join_all;
use ipnet::IpNet;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::OnceLock;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Private, loopback, link-local, shared, multicast, documentation and
/// otherwise reserved blocks.
pub const DEFAULT_BANNED_RANGES: &[&str] = &[
    "0.0.0.0/8",
    "10.0.0.0/8",
    "100.64.0.0/10",
    "127.0.0.0/8",
    "169.254.0.0/16",
    "172.16.0.0/12",
    "192.0.0.0/24",
    "192.0.2.0/24",
    "192.168.0.0/16",
    "198.18.0.0/15",
    "198.51.100.0/24",
    "203.0.113.0/24",
    "224.0.0.0/4",
    "240.0.0.0/4",
    "::/128",
    "::1/128",
    "::ffff:0:0/96",
    "100::/64",
    "2001:db8::/32",
    "fc00::/7",
    "fe80::/10",
    "ff00::/8",
];

/// Outcome of resolving a host and checking every address it maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostAdmission {
    Admitted,
    Banned,
    DnsFailure,
}

/// A fixed list of CIDR blocks, parsed on first use.
pub struct BannedRanges {
    cidrs: Vec<String>,
    parsed: OnceLock<Vec<IpNet>>,
}

impl BannedRanges {
    pub fn from_cidrs<I, S>(cidrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cidrs: cidrs.into_iter().map(Into::into).collect(),
            parsed: OnceLock::new(),
        }
    }

    pub fn ranges(&self) -> &[IpNet] {
        self.parsed.get_or_init(|| {
            self.cidrs
                .iter()
                .filter_map(|cidr| match cidr.parse::<IpNet>() {
                    Ok(net) => Some(net),
                    Err(e) => {
                        warn!("Skipping unparseable banned range {}: {}", cidr, e);
                        None
                    }
                })
                .collect()
        })
    }

    /// First range containing `addr`, if any.
    pub fn find(&self, addr: IpAddr) -> Option<&IpNet> {
        self.ranges().iter().find(|net| net.contains(&addr))
    }
}

impl Default for BannedRanges {
    fn default() -> Self {
        Self::from_cidrs(DEFAULT_BANNED_RANGES.iter().copied())
    }
}

/// Banned-range filter with a memoized verdict per address.
///
/// Verdicts are never evicted; a run only touches a small slice of the
/// address space.
pub struct HostFilter {
    ranges: BannedRanges,
    verdicts: RwLock<HashMap<String, bool>>,
}

impl HostFilter {
    pub fn new(ranges: BannedRanges) -> Self {
        Self {
            ranges,
            verdicts: RwLock::new(HashMap::new()),
        }
    }

    pub async fn is_banned(&self, addr: IpAddr) -> bool {
        let key = addr.to_string();

        let cached = self.verdicts.read().await.get(&key).copied();
        if let Some(banned) = cached {
            return banned;
        }

        let matched = self.ranges.find(addr);
        if let Some(range) = matched {
            warn!("[BANNED] {} falls within {}", addr, range);
        }

        // A concurrent check of the same address may have landed first; keep its verdict.
        *self
            .verdicts
            .write()
            .await
            .entry(key)
            .or_insert(matched.is_some())
    }

    /// Fail-closed: a single banned address rejects the whole set.
    pub async fn check_addresses(&self, addrs: &[IpAddr]) -> HostAdmission {
        if addrs.is_empty() {
            return HostAdmission::DnsFailure;
        }

        let verdicts = join_all(addrs.iter().map(|addr| self.is_banned(*addr))).await;
        if verdicts.into_iter().any(|banned| banned) {
            HostAdmission::Banned
        } else {
            HostAdmission::Admitted
        }
    }

    pub async fn check_host(&self, host: &str) -> HostAdmission {
        let host = host.trim_start_matches('[').trim_end_matches(']');

        let addrs: Vec<IpAddr> = match tokio::net::lookup_host((host, 0)).await {
            Ok(resolved) => {
                let mut addrs: Vec<IpAddr> = Vec::new();
                for socket_addr in resolved {
                    if !addrs.contains(&socket_addr.ip()) {
                        addrs.push(socket_addr.ip());
                    }
                }
                addrs
            }
            Err(e) => {
                warn!("[DNS ERROR] Unable to resolve host {}: {}", host, e);
                return HostAdmission::DnsFailure;
            }
        };

        if addrs.is_empty() {
            warn!("[DNS ERROR] No addresses found for host {}", host);
            return HostAdmission::DnsFailure;
        }

        debug!("Resolved {} to {:?}", host, addrs);
        self.check_addresses(&addrs).await
    }

    pub async fn should_process_host(&self, host: &str) -> bool {
        self.check_host(host).await == HostAdmission::Admitted
    }

    pub async fn cached_verdicts(&self) -> usize {
        self.verdicts.read().await.len()
    }
}

impl Default for HostFilter {
    fn default() -> Self {
        Self::new(BannedRanges::default())
    }
}
