use crate::error::{Result, ScanError};
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:78.0) Gecko/20100101 Firefox/78.0";

/// Page fetches are allowed to be slow; the per-seed supervisor bounds the total.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Transport settings shared by the liveness prober and the traversal engine.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub user_agent: String,
    pub request_timeout: Duration,
    pub insecure: bool,
    pub proxy: Option<String>,
    pub follow_redirects: bool,
    pub headers: Vec<(String, String)>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            insecure: false,
            proxy: None,
            follow_redirects: true,
            headers: Vec::new(),
        }
    }
}

impl HttpSettings {
    /// Value of the custom `Host` header, if one was supplied.
    pub fn host_header(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("host"))
            .map(|(_, value)| value.as_str())
    }

    pub fn build_client(&self) -> Result<Client> {
        let mut default_headers = HeaderMap::new();
        for (name, value) in &self.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ScanError::InvalidHeader(format!("{}: {}", name, e)))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| ScanError::InvalidHeader(format!("{}: {}", name, e)))?;
            default_headers.insert(header_name, header_value);
        }

        let redirect_policy = if self.follow_redirects {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        };

        let mut builder = Client::builder()
            .user_agent(self.user_agent.as_str())
            .default_headers(default_headers)
            .timeout(self.request_timeout)
            .pool_max_idle_per_host(50)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(redirect_policy)
            .danger_accept_invalid_certs(self.insecure);

        if let Some(ref proxy) = self.proxy {
            let proxy = reqwest::Proxy::all(proxy.as_str())
                .map_err(|e| ScanError::InvalidProxy(format!("{}: {}", proxy, e)))?;
            builder = builder.proxy(proxy);
        }

        Ok(builder.build()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_header_is_case_insensitive() {
        let settings = HttpSettings {
            headers: vec![
                ("X-Api".to_string(), "1".to_string()),
                ("host".to_string(), "internal.example".to_string()),
            ],
            ..HttpSettings::default()
        };
        assert_eq!(settings.host_header(), Some("internal.example"));
    }

    #[test]
    fn rejects_malformed_header_name() {
        let settings = HttpSettings {
            headers: vec![("Bad Header".to_string(), "x".to_string())],
            ..HttpSettings::default()
        };
        assert!(matches!(
            settings.build_client(),
            Err(ScanError::InvalidHeader(_))
        ));
    }

    #[test]
    fn rejects_malformed_proxy() {
        let settings = HttpSettings {
            proxy: Some("::not a proxy::".to_string()),
            ..HttpSettings::default()
        };
        assert!(matches!(
            settings.build_client(),
            Err(ScanError::InvalidProxy(_))
        ));
    }
}
