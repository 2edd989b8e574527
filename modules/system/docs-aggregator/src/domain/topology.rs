use crate::config::{DestinationConfig, DocsSettings, GatewayConfig, SourceConfig};
use crate::error::{ConfigError, FailureKind, SourceFailure};
use indexmap::IndexMap;
use regex::Regex;
use std::time::Duration;
use url::Url;

/// Which clusters take part in an aggregation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSelector {
    /// Every cluster merges into one document.
    Common,
    /// Only the cluster whose id equals the requested document name.
    PerDocumentName,
}

impl OutputSelector {
    #[must_use]
    pub fn from_settings(settings: &DocsSettings) -> Self {
        if settings.common_document {
            OutputSelector::Common
        } else {
            OutputSelector::PerDocumentName
        }
    }
}

/// Join a path prefix and a document path key, collapsing a doubled slash.
#[must_use]
pub fn join_path(prefix: &str, key: &str) -> String {
    match (prefix.strip_suffix('/'), key.starts_with('/')) {
        (Some(trimmed), true) => format!("{trimmed}{key}"),
        _ => format!("{prefix}{key}"),
    }
}

/// Compile a filter pattern so that it must match the whole path key.
///
/// Blank patterns mean "no filter".
///
/// # Errors
/// Returns [`ConfigError::InvalidPattern`] when the pattern does not compile.
pub fn compile_filter(pattern: Option<&str>) -> Result<Option<Regex>, ConfigError> {
    let Some(pattern) = pattern.map(str::trim).filter(|p| !p.is_empty()) else {
        return Ok(None);
    };
    Regex::new(&format!("^(?:{pattern})$"))
        .map(Some)
        .map_err(|source| ConfigError::InvalidPattern {
            pattern: pattern.to_owned(),
            source,
        })
}

/// One set of documents exposed by a destination and how to merge them.
#[derive(Debug, Clone)]
pub struct SourceDescriptor {
    /// Position within the destination's configured sources.
    pub index: usize,
    /// Document paths relative to the destination address, duplicates removed.
    pub document_paths: Vec<String>,
    pub path_prefix: String,
    pub filter: Option<Regex>,
    pub only_published_paths: bool,
    pub metadata_path: Option<String>,
}

impl SourceDescriptor {
    /// # Errors
    /// Returns [`ConfigError::InvalidPattern`] for an invalid filter pattern.
    pub fn resolve(index: usize, config: &SourceConfig) -> Result<Self, ConfigError> {
        let mut document_paths: Vec<String> = Vec::with_capacity(config.document_paths.len());
        for path in &config.document_paths {
            if !path.trim().is_empty() && !document_paths.contains(path) {
                document_paths.push(path.clone());
            }
        }

        Ok(Self {
            index,
            document_paths,
            path_prefix: config.path_prefix.clone(),
            filter: compile_filter(config.filter_pattern.as_deref())?,
            only_published_paths: config.only_published_paths,
            metadata_path: config.metadata_path.clone().filter(|p| !p.is_empty()),
        })
    }

    /// Path key of `key` in the merged document.
    #[must_use]
    pub fn output_path(&self, key: &str) -> String {
        join_path(&self.path_prefix, key)
    }

    #[must_use]
    pub fn is_metadata_source(&self, document_path: &str) -> bool {
        self.metadata_path.as_deref() == Some(document_path)
    }
}

/// Connection settings of one destination's HTTP client, defaults already applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DestinationHttpSettings {
    pub headers: Vec<(String, String)>,
    pub allow_insecure_http: bool,
    pub timeout: Duration,
    pub max_body_size: usize,
    pub user_agent: Option<String>,
}

impl DestinationHttpSettings {
    #[must_use]
    pub fn resolve(config: &DestinationConfig, settings: &DocsSettings) -> Self {
        let fetch = &settings.fetch;
        Self {
            headers: config
                .headers
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
            allow_insecure_http: config.allow_insecure_http.unwrap_or(fetch.allow_insecure_http),
            timeout: Duration::from_millis(config.timeout_ms.unwrap_or(fetch.timeout_ms)),
            max_body_size: fetch.max_body_size,
            user_agent: fetch.user_agent.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Destination {
    pub id: String,
    pub base_address: Url,
    pub sources: Vec<SourceDescriptor>,
    pub http: DestinationHttpSettings,
}

impl Destination {
    /// Absolute URL of a document path, resolved against the base address.
    ///
    /// # Errors
    /// Returns [`ConfigError::UnresolvableUrl`] when the combination does not
    /// yield an `http`/`https` URL.
    pub fn document_url(&self, document_path: &str) -> Result<Url, ConfigError> {
        let unresolvable = |reason: String| ConfigError::UnresolvableUrl {
            base: self.base_address.to_string(),
            document_path: document_path.to_owned(),
            reason,
        };
        let url = self
            .base_address
            .join(document_path)
            .map_err(|e| unresolvable(e.to_string()))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(unresolvable(format!("unsupported scheme '{other}'"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Cluster {
    pub id: String,
    pub destinations: IndexMap<String, Destination>,
}

/// Resolved clusters in configuration order.
#[derive(Debug, Clone, Default)]
pub struct ClusterTopology {
    pub clusters: IndexMap<String, Cluster>,
}

impl ClusterTopology {
    /// Resolve the `clusters` section.
    ///
    /// Defective destinations and sources are left out and reported as
    /// configuration failures; the rest of the topology stays usable.
    #[must_use]
    pub fn resolve(config: &GatewayConfig) -> (Self, Vec<SourceFailure>) {
        let mut rejected = Vec::new();
        let mut clusters = IndexMap::with_capacity(config.clusters.len());

        for (cluster_id, cluster_config) in &config.clusters {
            let mut destinations = IndexMap::with_capacity(cluster_config.destinations.len());

            for (destination_id, destination_config) in &cluster_config.destinations {
                let reject = |source_index: usize, err: &ConfigError| SourceFailure {
                    cluster_id: cluster_id.clone(),
                    destination_id: destination_id.clone(),
                    source_index,
                    document_path: None,
                    kind: FailureKind::Configuration,
                    message: err.to_string(),
                };

                let base_address = match parse_address(destination_id, &destination_config.address)
                {
                    Ok(url) => url,
                    Err(err) => {
                        tracing::warn!(
                            cluster_id = %cluster_id,
                            destination_id = %destination_id,
                            error = %err,
                            "destination rejected"
                        );
                        rejected.extend(
                            (0..destination_config.sources.len()).map(|index| reject(index, &err)),
                        );
                        continue;
                    }
                };

                let mut sources = Vec::with_capacity(destination_config.sources.len());
                for (index, source_config) in destination_config.sources.iter().enumerate() {
                    match SourceDescriptor::resolve(index, source_config) {
                        Ok(source) => sources.push(source),
                        Err(err) => {
                            tracing::warn!(
                                cluster_id = %cluster_id,
                                destination_id = %destination_id,
                                source_index = index,
                                error = %err,
                                "source rejected"
                            );
                            rejected.push(reject(index, &err));
                        }
                    }
                }

                destinations.insert(
                    destination_id.clone(),
                    Destination {
                        id: destination_id.clone(),
                        base_address,
                        sources,
                        http: DestinationHttpSettings::resolve(destination_config, &config.swagger),
                    },
                );
            }

            clusters.insert(
                cluster_id.clone(),
                Cluster {
                    id: cluster_id.clone(),
                    destinations,
                },
            );
        }

        (Self { clusters }, rejected)
    }

    /// Clusters participating in a request for `document_name`.
    #[must_use]
    pub fn select(&self, selector: OutputSelector, document_name: &str) -> Vec<&Cluster> {
        match selector {
            OutputSelector::Common => self.clusters.values().collect(),
            OutputSelector::PerDocumentName => {
                self.clusters.get(document_name).into_iter().collect()
            }
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }
}

fn parse_address(destination_id: &str, address: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidAddress {
        destination_id: destination_id.to_owned(),
        address: address.to_owned(),
        reason,
    };
    let url = Url::parse(address.trim()).map_err(|e| invalid(e.to_string()))?;
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(invalid("address must be an absolute URL with a host".to_owned()));
    }
    Ok(url)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::config::{ClusterConfig, SourceConfig};

    #[test]
    fn test_join_path_collapses_one_slash() {
        assert_eq!(join_path("/svc/", "/items"), "/svc/items");
        assert_eq!(join_path("/svc", "/items"), "/svc/items");
        assert_eq!(join_path("", "/items"), "/items");
        assert_eq!(join_path("/svc/", "items"), "/svc/items");
        assert_eq!(join_path("/", "/"), "/");
    }

    #[test]
    fn test_filter_must_match_whole_key() {
        let filter = compile_filter(Some("/items.*")).unwrap().unwrap();
        assert!(filter.is_match("/items/{id}"));
        assert!(!filter.is_match("/v1/items"));

        let alternation = compile_filter(Some("/a|/b")).unwrap().unwrap();
        assert!(alternation.is_match("/b"));
        assert!(!alternation.is_match("/bc"));

        assert!(compile_filter(Some("  ")).unwrap().is_none());
        assert!(compile_filter(None).unwrap().is_none());
    }

    #[test]
    fn test_invalid_filter_is_rejected() {
        let err = compile_filter(Some("/items(")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { .. }));
    }

    #[test]
    fn test_source_document_paths_are_deduplicated() {
        let source = SourceDescriptor::resolve(0, &SourceConfig {
            document_paths: vec!["/a.json".into(), "/b.json".into(), "/a.json".into(), String::new()],
            ..SourceConfig::default()
        })
        .unwrap();
        assert_eq!(source.document_paths, vec!["/a.json", "/b.json"]);
    }

    #[test]
    fn test_document_url_resolution() {
        let destination = Destination {
            id: "d1".into(),
            base_address: Url::parse("http://orders:8080/api/").unwrap(),
            sources: Vec::new(),
            http: DestinationHttpSettings::resolve(
                &DestinationConfig::default(),
                &DocsSettings::default(),
            ),
        };

        assert_eq!(
            destination.document_url("swagger.json").unwrap().as_str(),
            "http://orders:8080/api/swagger.json"
        );
        assert_eq!(
            destination.document_url("/swagger.json").unwrap().as_str(),
            "http://orders:8080/swagger.json"
        );
        assert!(matches!(
            destination.document_url("mailto:ops@example.com"),
            Err(ConfigError::UnresolvableUrl { .. })
        ));
    }

    #[test]
    fn test_resolve_rejects_only_defective_parts() {
        let mut config = GatewayConfig::default();
        let mut cluster = ClusterConfig::default();
        cluster.destinations.insert(
            "good".into(),
            DestinationConfig {
                address: "http://good/".into(),
                timeout_ms: Some(500),
                sources: vec![
                    SourceConfig {
                        document_paths: vec!["/a.json".into()],
                        filter_pattern: Some("(".into()),
                        ..SourceConfig::default()
                    },
                    SourceConfig {
                        document_paths: vec!["/b.json".into()],
                        ..SourceConfig::default()
                    },
                ],
                ..DestinationConfig::default()
            },
        );
        cluster.destinations.insert(
            "bad".into(),
            DestinationConfig {
                address: "not a url".into(),
                sources: vec![SourceConfig::default()],
                ..DestinationConfig::default()
            },
        );
        config.clusters.insert("orders".into(), cluster);

        let (topology, rejected) = ClusterTopology::resolve(&config);

        let destinations = &topology.clusters["orders"].destinations;
        assert_eq!(destinations.len(), 1);
        assert_eq!(destinations["good"].sources.len(), 1);
        assert_eq!(destinations["good"].sources[0].index, 1);
        assert_eq!(destinations["good"].http.timeout, Duration::from_millis(500));

        assert_eq!(rejected.len(), 2);
        assert_eq!(rejected[0].destination_id, "good");
        assert_eq!(rejected[0].source_index, 0);
        assert_eq!(rejected[1].destination_id, "bad");
        assert!(rejected.iter().all(|f| f.kind == FailureKind::Configuration));
    }

    #[test]
    fn test_select_by_mode() {
        let mut config = GatewayConfig::default();
        config.clusters.insert("a".into(), ClusterConfig::default());
        config.clusters.insert("b".into(), ClusterConfig::default());
        let (topology, _) = ClusterTopology::resolve(&config);

        assert_eq!(topology.select(OutputSelector::Common, "ignored").len(), 2);
        let only_b = topology.select(OutputSelector::PerDocumentName, "b");
        assert_eq!(only_b.len(), 1);
        assert_eq!(only_b[0].id, "b");
        assert!(topology.select(OutputSelector::PerDocumentName, "c").is_empty());
    }
}
