//! Hot-reloadable configuration snapshot.
//!
//! A snapshot is built in full from a [`GatewayConfig`] and never mutated
//! afterwards. [`ConfigStore`] swaps whole snapshots atomically, so a request
//! that loaded one keeps seeing it even if a reload lands mid-flight.

use crate::config::{DocsSettings, GatewayConfig};
use crate::domain::{ClusterTopology, OutputSelector, RouteTable};
use crate::error::{ConfigError, SourceFailure};
use arc_swap::ArcSwap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Default)]
pub struct ConfigSnapshot {
    /// Increases by one on every swap; `0` for the initial snapshot.
    pub generation: u64,
    pub settings: DocsSettings,
    pub topology: ClusterTopology,
    pub routes: RouteTable,
    /// Sources left out of the topology because their configuration is defective.
    pub rejected: Vec<SourceFailure>,
}

impl ConfigSnapshot {
    #[must_use]
    pub fn build(config: &GatewayConfig, generation: u64) -> Self {
        let (topology, rejected) = ClusterTopology::resolve(config);
        Self {
            generation,
            settings: config.swagger.clone(),
            topology,
            routes: RouteTable::from_config(&config.routes),
            rejected,
        }
    }

    #[must_use]
    pub fn selector(&self) -> OutputSelector {
        OutputSelector::from_settings(&self.settings)
    }

    /// Output document names served by this snapshot.
    #[must_use]
    pub fn document_names(&self) -> Vec<String> {
        match self.selector() {
            OutputSelector::Common => vec![self.settings.common_document_name.clone()],
            OutputSelector::PerDocumentName => self.topology.clusters.keys().cloned().collect(),
        }
    }

    /// Configuration failures recorded for the given clusters.
    pub fn rejected_for<'a>(
        &'a self,
        cluster_ids: &'a [&'a str],
    ) -> impl Iterator<Item = &'a SourceFailure> + 'a {
        self.rejected
            .iter()
            .filter(move |failure| cluster_ids.contains(&failure.cluster_id.as_str()))
    }
}

/// Atomically swappable holder of the current [`ConfigSnapshot`].
#[derive(Debug)]
pub struct ConfigStore {
    current: ArcSwap<ConfigSnapshot>,
    generation: AtomicU64,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(&GatewayConfig::default())
    }
}

impl ConfigStore {
    #[must_use]
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            current: ArcSwap::from_pointee(ConfigSnapshot::build(config, 0)),
            generation: AtomicU64::new(0),
        }
    }

    /// Load the store from a configuration file.
    ///
    /// # Errors
    /// Propagates [`GatewayConfig::load`] failures.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        Ok(Self::new(&GatewayConfig::load(path)?))
    }

    /// The snapshot in force right now.
    #[must_use]
    pub fn snapshot(&self) -> Arc<ConfigSnapshot> {
        self.current.load_full()
    }

    /// Build a snapshot from `config` and make it current.
    pub fn replace(&self, config: &GatewayConfig) -> Arc<ConfigSnapshot> {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let snapshot = Arc::new(ConfigSnapshot::build(config, generation));
        self.current.store(Arc::clone(&snapshot));
        tracing::info!(
            generation,
            clusters = snapshot.topology.clusters.len(),
            routes = snapshot.routes.routes().len(),
            rejected = snapshot.rejected.len(),
            "configuration snapshot replaced"
        );
        snapshot
    }

    /// Re-read `path` and swap in the result. On error the current snapshot stays.
    ///
    /// # Errors
    /// Propagates [`GatewayConfig::load`] failures.
    pub fn reload_from_path(&self, path: &Path) -> Result<Arc<ConfigSnapshot>, ConfigError> {
        let config = GatewayConfig::load(path).inspect_err(|e| {
            tracing::warn!(path = %path.display(), error = %e, "configuration reload failed; keeping current snapshot");
        })?;
        Ok(self.replace(&config))
    }
}
