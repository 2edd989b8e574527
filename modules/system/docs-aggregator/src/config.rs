//! Gateway configuration consumed by the aggregator.
//!
//! The file carries three sections: `swagger` (aggregation settings),
//! `routes` and `clusters`. Routes, clusters and destinations are ordered
//! maps, so configuration order is iteration order everywhere downstream.

use crate::error::ConfigError;
use figment::Figment;
use figment::providers::{Env, Serialized};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Prefix of environment variables overriding [`DocsSettings`]; `__` separates nesting.
pub const ENV_PREFIX: &str = "DOCS_AGGREGATOR__";

/// A single transform directive, e.g. `{RequestHeader: X-Tenant, Set: acme}`.
pub type TransformValues = BTreeMap<String, String>;

/// Whole gateway configuration file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    pub swagger: DocsSettings,
    pub routes: IndexMap<String, RouteConfig>,
    pub clusters: IndexMap<String, ClusterConfig>,
}

impl GatewayConfig {
    /// Parse a YAML (or JSON) configuration document.
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] when the text is not a valid configuration.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_saphyr::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Read a configuration file and layer environment overrides onto its settings.
    ///
    /// # Errors
    /// Returns [`ConfigError::Io`] if the file cannot be read, [`ConfigError::Parse`]
    /// if it is malformed, or [`ConfigError::Settings`] if the overrides do not fit.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_yaml_str(&text)?;
        config.swagger = config.swagger.with_env_overrides()?;
        tracing::debug!(
            path = %path.display(),
            routes = config.routes.len(),
            clusters = config.clusters.len(),
            "loaded gateway configuration"
        );
        Ok(config)
    }

    /// True when nothing is configured to aggregate.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }
}

/// Aggregation settings (`swagger` section).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DocsSettings {
    /// Merge every cluster into one document instead of one document per cluster.
    #[serde(alias = "is_common_document")]
    pub common_document: bool,
    /// Output name used in common mode.
    pub common_document_name: String,
    /// Rename colliding, differing components instead of overwriting them.
    pub rename_duplicate_schemas: bool,
    /// Abort the whole request on the first per-source failure.
    pub fail_fast: bool,
    pub fetch: FetchSettings,
    /// Metadata of the base document built by the engine.
    pub info: InfoSettings,
}

impl Default for DocsSettings {
    fn default() -> Self {
        Self {
            common_document: false,
            common_document_name: "gateway".to_owned(),
            rename_duplicate_schemas: true,
            fail_fast: false,
            fetch: FetchSettings::default(),
            info: InfoSettings::default(),
        }
    }
}

impl DocsSettings {
    /// Layer `DOCS_AGGREGATOR__*` environment variables over these settings.
    ///
    /// # Errors
    /// Returns [`ConfigError::Settings`] when an override has the wrong type.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.merged_with(Env::prefixed(ENV_PREFIX).split("__"))
    }

    fn merged_with(self, provider: impl figment::Provider) -> Result<Self, ConfigError> {
        let settings = Figment::new()
            .merge(Serialized::defaults(self))
            .merge(provider)
            .extract()?;
        Ok(settings)
    }
}

/// Upstream fetch limits.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchSettings {
    /// Per-document timeout in milliseconds.
    pub timeout_ms: u64,
    /// Documents fetched concurrently per request.
    pub max_concurrent_fetches: usize,
    /// Maximum decoded body size in bytes.
    pub max_body_size: usize,
    /// Permit `http://` destinations unless a destination says otherwise.
    pub allow_insecure_http: bool,
    pub user_agent: Option<String>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            max_concurrent_fetches: 4,
            max_body_size: 10 * 1024 * 1024, // 10 MB
            allow_insecure_http: true,
            user_agent: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct InfoSettings {
    pub title: String,
    pub version: String,
    pub description: Option<String>,
}

impl Default for InfoSettings {
    fn default() -> Self {
        Self {
            title: "Gateway API".to_owned(),
            version: "v1".to_owned(),
            description: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RouteConfig {
    pub cluster_id: Option<String>,
    #[serde(rename = "match")]
    pub route_match: MatchConfig,
    pub transforms: Vec<TransformValues>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatchConfig {
    pub path: Option<String>,
    /// `None` accepts every method.
    pub methods: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClusterConfig {
    pub destinations: IndexMap<String, DestinationConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DestinationConfig {
    pub address: String,
    /// Static headers sent with every document request to this destination.
    pub headers: IndexMap<String, String>,
    /// Overrides `fetch.allow_insecure_http` for this destination.
    pub allow_insecure_http: Option<bool>,
    /// Overrides `fetch.timeout_ms` for this destination.
    pub timeout_ms: Option<u64>,
    #[serde(alias = "swaggers")]
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    /// Document paths relative to the destination address.
    #[serde(alias = "paths")]
    pub document_paths: Vec<String>,
    /// Prefix prepended to every path key of these documents.
    #[serde(alias = "prefix_path")]
    pub path_prefix: String,
    /// Only path keys fully matching this regex are kept.
    #[serde(alias = "path_filter_regex_pattern")]
    pub filter_pattern: Option<String>,
    /// Keep only paths and methods reachable through configured routes.
    #[serde(alias = "add_only_published_paths")]
    pub only_published_paths: bool,
    /// Document path whose `info` becomes the merged document's metadata.
    pub metadata_path: Option<String>,
}
