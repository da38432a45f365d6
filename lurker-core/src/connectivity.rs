// Outbound reachability gate, consulted before any network activity

use rand::seq::SliceRandom;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use sysinfo::Networks;
use tokio::net::TcpStream;
use tracing::{debug, warn};

/// Well-known public resolvers. Any one answering proves upstream reachability.
pub const PUBLIC_RESOLVERS: &[&str] = &[
    "8.8.8.8",
    "1.1.1.1",
    "208.67.222.222",
    "9.9.9.9",
    "75.75.75.75",
    "2001:4860:4860::8888",
    "2606:4700:4700::1111",
    "2620:0:ccc::2",
    "2620:fe::9",
    "2001:558:feed::1",
    "209.244.0.3",
    "209.244.0.4",
    "8.8.4.4",
    "8.26.56.26",
    "8.20.247.20",
    "208.67.220.220",
    "156.154.70.1",
    "156.154.71.1",
    "199.85.126.10",
    "199.85.127.10",
    "81.218.119.11",
    "209.88.198.133",
    "195.46.39.39",
    "195.46.39.40",
    "216.87.84.211",
    "23.90.4.6",
    "199.5.157.131",
    "208.71.35.137",
    "208.76.50.50",
    "208.76.51.51",
    "216.146.35.35",
    "216.146.36.36",
    "89.233.43.71",
    "89.104.194.142",
    "74.82.42.42",
    "109.69.8.51",
];

const DNS_PORT: u16 = 53;
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);
const POOL_RETRY_INTERVAL: Duration = Duration::from_secs(2);
const GATE_RETRY_INTERVAL: Duration = Duration::from_secs(30);

pub struct ConnectivityWatchdog {
    resolvers: Vec<SocketAddr>,
    probe_timeout: Duration,
    pool_retry_interval: Duration,
    gate_retry_interval: Duration,
}

impl ConnectivityWatchdog {
    pub fn new() -> Self {
        let resolvers = PUBLIC_RESOLVERS
            .iter()
            .filter_map(|ip| ip.parse::<IpAddr>().ok())
            .map(|ip| SocketAddr::new(ip, DNS_PORT))
            .collect();
        Self::with_resolvers(resolvers)
    }

    pub fn with_resolvers(resolvers: Vec<SocketAddr>) -> Self {
        Self {
            resolvers,
            probe_timeout: PROBE_TIMEOUT,
            pool_retry_interval: POOL_RETRY_INTERVAL,
            gate_retry_interval: GATE_RETRY_INTERVAL,
        }
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Block until the host has upstream connectivity.
    pub async fn wait_until_connected(&self) {
        loop {
            if self.is_internet_connected().await {
                return;
            }
            warn!("Waiting for internet connection...");
            tokio::time::sleep(self.gate_retry_interval).await;
        }
    }

    /// False only when no usable local interface exists. While one does,
    /// sweeps of the resolver pool repeat until some resolver answers.
    pub async fn is_internet_connected(&self) -> bool {
        let local_addrs = local_interface_addrs();
        if !has_usable_interface(&local_addrs) {
            warn!("[INTERNET CHECK ERROR] No non-loopback IPv4 interface available");
            return false;
        }

        loop {
            if self.sweep_once().await {
                return true;
            }
            warn!("Waiting for internet connection...");
            tokio::time::sleep(self.pool_retry_interval).await;
        }
    }

    /// Try every resolver once, in a fresh random order. Stops at the first
    /// one that accepts a connection.
    pub async fn sweep_once(&self) -> bool {
        let mut shuffled = self.resolvers.clone();
        shuffled.shuffle(&mut rand::thread_rng());

        for resolver in shuffled {
            match tokio::time::timeout(self.probe_timeout, TcpStream::connect(resolver)).await {
                Ok(Ok(_)) => {
                    debug!("Connectivity confirmed via {}", resolver);
                    return true;
                }
                Ok(Err(e)) => debug!("Resolver {} unreachable: {}", resolver, e),
                Err(_) => debug!("Resolver {} timed out", resolver),
            }
        }
        false
    }
}

impl Default for ConnectivityWatchdog {
    fn default() -> Self {
        Self::new()
    }
}

/// Addresses assigned to local network interfaces.
pub fn local_interface_addrs() -> Vec<IpAddr> {
    let networks = Networks::new_with_refreshed_list();
    networks
        .list()
        .values()
        .flat_map(|data| data.ip_networks().iter().map(|net| net.addr))
        .collect()
}

pub fn has_usable_interface(addrs: &[IpAddr]) -> bool {
    addrs
        .iter()
        .any(|addr| addr.is_ipv4() && !addr.is_loopback())
}
