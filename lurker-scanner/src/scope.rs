use url::Url;

/// Which hosts the traversal engine may request pages from.
#[derive(Debug, Clone)]
pub struct Scope {
    hosts: Vec<String>,
    include_subdomains: bool,
}

impl Scope {
    pub fn new(host: &str) -> Self {
        Self {
            hosts: vec![host.to_ascii_lowercase()],
            include_subdomains: false,
        }
    }

    pub fn with_host(mut self, host: &str) -> Self {
        let host = host.to_ascii_lowercase();
        if !self.hosts.contains(&host) {
            self.hosts.push(host);
        }
        self
    }

    pub fn with_subdomains(mut self, include_subdomains: bool) -> Self {
        self.include_subdomains = include_subdomains;
        self
    }

    pub fn allows(&self, url: &Url) -> bool {
        if !matches!(url.scheme(), "http" | "https") {
            return false;
        }
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();

        self.hosts.iter().any(|allowed| {
            host == *allowed
                || (self.include_subdomains && host.ends_with(&format!(".{}", allowed)))
        })
    }
}
