use std::time::Duration;

/// User-Agent sent when a destination does not configure its own.
pub const DEFAULT_USER_AGENT: &str = concat!("docs-http/", env!("CARGO_PKG_VERSION"));

/// Where trusted root certificates come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum RootStore {
    /// Mozilla roots compiled into the binary
    #[default]
    Bundled,
    /// The operating system trust store
    Native,
}

/// Which URL schemes a client may talk to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportSecurity {
    /// `https://` only
    #[default]
    TlsOnly,
    /// `http://` is accepted too. Gateway upstreams usually live inside the
    /// cluster network and serve their documents over plain HTTP.
    AllowInsecureHttp,
}

impl TransportSecurity {
    #[must_use]
    pub fn from_allow_http(allow: bool) -> Self {
        if allow {
            Self::AllowInsecureHttp
        } else {
            Self::TlsOnly
        }
    }
}

/// Settings of one document client. The aggregator builds one per destination.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Deadline for a whole document exchange, body included
    pub request_timeout: Duration,

    /// Largest accepted document after decompression
    pub max_body_size: usize,

    pub user_agent: String,

    /// Sent with every request; a request header of the same name wins.
    pub default_headers: Vec<(String, String)>,

    pub transport: TransportSecurity,

    pub root_store: RootStore,

    /// `0` disables redirect following
    pub max_redirects: usize,

    pub pool_idle_timeout: Option<Duration>,

    pub pool_max_idle_per_host: usize,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_body_size: 10 * 1024 * 1024, // 10 MB
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            default_headers: Vec::new(),
            transport: TransportSecurity::TlsOnly,
            root_store: RootStore::default(),
            max_redirects: 5,
            pool_idle_timeout: Some(Duration::from_secs(90)),
            pool_max_idle_per_host: 8,
        }
    }
}

impl HttpClientConfig {
    /// Client for one gateway destination.
    ///
    /// Documents are fetched rarely, so only a couple of idle connections
    /// are kept per upstream host.
    #[must_use]
    pub fn upstream(request_timeout: Duration, transport: TransportSecurity) -> Self {
        Self {
            request_timeout,
            transport,
            pool_max_idle_per_host: 2,
            ..Default::default()
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_default_requires_tls() {
        let config = HttpClientConfig::default();
        assert_eq!(config.transport, TransportSecurity::TlsOnly);
        assert_eq!(config.root_store, RootStore::Bundled);
        assert_eq!(config.max_redirects, 5);
        assert!(config.default_headers.is_empty());
    }

    #[test]
    fn test_upstream_config() {
        let config = HttpClientConfig::upstream(
            Duration::from_millis(1500),
            TransportSecurity::from_allow_http(true),
        );
        assert_eq!(config.transport, TransportSecurity::AllowInsecureHttp);
        assert_eq!(config.request_timeout, Duration::from_millis(1500));
        assert_eq!(config.pool_max_idle_per_host, 2);
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn test_transport_from_flag() {
        assert_eq!(TransportSecurity::from_allow_http(false), TransportSecurity::TlsOnly);
    }
}
