//! Request-level orchestration: resolve clusters, fetch, filter, transform, merge.

use crate::document::{Info, OpenApiDocument};
use crate::domain::{Cluster, Destination, SourceDescriptor};
use crate::error::{AggregationError, FailureKind, FetchError, SourceFailure};
use crate::fetch::{DocumentFetcher, DocumentRequest, HttpClientRegistry, HttpDocumentFetcher};
use crate::filter::filter_document;
use crate::merge::{Contribution, MergeAccumulator};
use crate::snapshot::{ConfigSnapshot, ConfigStore};
use crate::transform::TransformApplier;
use futures::StreamExt;
use futures::stream;
use serde::Serialize;
use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Placeholder substituted by [`AggregationEngine::document_endpoints`].
pub const DOCUMENT_NAME_PLACEHOLDER: &str = "{documentName}";

/// Result of one aggregation request.
#[derive(Debug, Clone)]
pub struct AggregationOutcome {
    pub document: OpenApiDocument,
    /// Sources that did not contribute, in configuration order.
    pub failures: Vec<SourceFailure>,
}

impl AggregationOutcome {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Where a documentation UI finds one output document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentEndpoint {
    pub name: String,
    pub url: String,
}

/// One document of one source, ready to fetch.
struct FetchJob<'a> {
    cluster: &'a Cluster,
    destination: &'a Destination,
    source: &'a SourceDescriptor,
    document_path: &'a str,
    url: Url,
}

impl FetchJob<'_> {
    fn failure(&self, kind: FailureKind, message: String) -> SourceFailure {
        SourceFailure {
            cluster_id: self.cluster.id.clone(),
            destination_id: self.destination.id.clone(),
            source_index: self.source.index,
            document_path: Some(self.document_path.to_owned()),
            kind,
            message,
        }
    }
}

/// Builds aggregated documents from the configuration snapshot in force.
pub struct AggregationEngine {
    store: Arc<ConfigStore>,
    fetcher: Arc<dyn DocumentFetcher>,
    transforms: TransformApplier,
    clients: Option<Arc<HttpClientRegistry>>,
    pruned_generation: AtomicU64,
}

impl std::fmt::Debug for AggregationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregationEngine")
            .field("generation", &self.store.snapshot().generation)
            .field("transforms", &self.transforms)
            .finish_non_exhaustive()
    }
}

impl AggregationEngine {
    /// Engine fetching over HTTP with the built-in transform factories.
    #[must_use]
    pub fn new(store: Arc<ConfigStore>) -> Self {
        let clients = Arc::new(HttpClientRegistry::new());
        let fetcher = Arc::new(HttpDocumentFetcher::new(Arc::clone(&clients)));
        Self {
            store,
            fetcher,
            transforms: TransformApplier::with_defaults(),
            clients: Some(clients),
            pruned_generation: AtomicU64::new(0),
        }
    }

    /// Engine using a caller-supplied fetcher.
    #[must_use]
    pub fn with_fetcher(store: Arc<ConfigStore>, fetcher: Arc<dyn DocumentFetcher>) -> Self {
        Self {
            store,
            fetcher,
            transforms: TransformApplier::with_defaults(),
            clients: None,
            pruned_generation: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn with_transforms(mut self, transforms: TransformApplier) -> Self {
        self.transforms = transforms;
        self
    }

    #[must_use]
    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    /// Output document names served by the current snapshot.
    #[must_use]
    pub fn document_names(&self) -> Vec<String> {
        self.store.snapshot().document_names()
    }

    /// One endpoint per output document, `{documentName}` substituted in `route_template`.
    #[must_use]
    pub fn document_endpoints(&self, route_template: &str) -> Vec<DocumentEndpoint> {
        self.document_names()
            .into_iter()
            .map(|name| DocumentEndpoint {
                url: route_template.replace(DOCUMENT_NAME_PLACEHOLDER, &name),
                name,
            })
            .collect()
    }

    /// Base document built from the current settings.
    #[must_use]
    pub fn base_document(&self) -> OpenApiDocument {
        base_document(&self.store.snapshot())
    }

    /// Aggregate `document_name` onto a base document built from the settings.
    ///
    /// # Errors
    /// Returns [`AggregationError::SourceFailed`] only when `fail_fast` is on.
    pub async fn aggregate(&self, document_name: &str) -> Result<AggregationOutcome, AggregationError> {
        let snapshot = self.store.snapshot();
        let base = base_document(&snapshot);
        self.run(snapshot, base, document_name, &CancellationToken::new())
            .await
    }

    /// Aggregate `document_name` onto `base`.
    ///
    /// # Errors
    /// Returns [`AggregationError::SourceFailed`] only when `fail_fast` is on.
    pub async fn aggregate_into(
        &self,
        base: OpenApiDocument,
        document_name: &str,
    ) -> Result<AggregationOutcome, AggregationError> {
        self.aggregate_with_cancel(base, document_name, &CancellationToken::new())
            .await
    }

    /// Aggregate `document_name` onto `base`, stopping early when `cancel` fires.
    ///
    /// # Errors
    /// Returns [`AggregationError::Cancelled`] when cancelled, or
    /// [`AggregationError::SourceFailed`] on the first failure with `fail_fast` on.
    pub async fn aggregate_with_cancel(
        &self,
        base: OpenApiDocument,
        document_name: &str,
        cancel: &CancellationToken,
    ) -> Result<AggregationOutcome, AggregationError> {
        self.run(self.store.snapshot(), base, document_name, cancel)
            .await
    }

    #[tracing::instrument(
        name = "aggregate",
        skip(self, snapshot, base, cancel),
        fields(generation = snapshot.generation)
    )]
    async fn run(
        &self,
        snapshot: Arc<ConfigSnapshot>,
        base: OpenApiDocument,
        document_name: &str,
        cancel: &CancellationToken,
    ) -> Result<AggregationOutcome, AggregationError> {
        self.prune_clients(&snapshot);

        let settings = &snapshot.settings;
        let clusters = snapshot.topology.select(snapshot.selector(), document_name);
        if clusters.is_empty() {
            tracing::debug!("no clusters selected; returning base document");
            return Ok(AggregationOutcome {
                document: base,
                failures: Vec::new(),
            });
        }

        let mut failures = Vec::new();
        let cluster_ids: Vec<&str> = clusters.iter().map(|c| c.id.as_str()).collect();
        for rejected in snapshot.rejected_for(&cluster_ids) {
            record(&mut failures, rejected.clone(), settings.fail_fast)?;
        }

        let mut jobs = Vec::new();
        for &cluster in &clusters {
            for destination in cluster.destinations.values() {
                for source in &destination.sources {
                    for document_path in &source.document_paths {
                        match destination.document_url(document_path) {
                            Ok(url) => jobs.push(FetchJob {
                                cluster,
                                destination,
                                source,
                                document_path,
                                url,
                            }),
                            Err(err) => {
                                let failure = SourceFailure {
                                    cluster_id: cluster.id.clone(),
                                    destination_id: destination.id.clone(),
                                    source_index: source.index,
                                    document_path: Some(document_path.clone()),
                                    kind: FailureKind::Configuration,
                                    message: err.to_string(),
                                };
                                record(&mut failures, failure, settings.fail_fast)?;
                            }
                        }
                    }
                }
            }
        }

        tracing::debug!(
            clusters = clusters.len(),
            documents = jobs.len(),
            "fetching upstream documents"
        );

        let window = settings.fetch.max_concurrent_fetches.max(1);
        let mut fetched = pin!(
            stream::iter(jobs)
                .map(|job| async move {
                    let result = self.fetch_one(&job, cancel).await;
                    (job, result)
                })
                .buffered(window)
        );

        let published = snapshot.routes.published_paths();
        let mut accumulator = MergeAccumulator::new(settings.rename_duplicate_schemas);

        while let Some((job, result)) = fetched.next().await {
            if cancel.is_cancelled() {
                tracing::info!("aggregation cancelled");
                return Err(AggregationError::Cancelled);
            }

            let document = match result {
                Ok(document) => document,
                Err(err) => {
                    let failure = job.failure(FailureKind::Fetch, err.to_string());
                    record(&mut failures, failure, settings.fail_fast)?;
                    continue;
                }
            };

            let mut document = filter_document(document, job.source, published);
            let directives = snapshot.routes.transforms_for_cluster(&job.cluster.id);
            for item in document.paths.values_mut() {
                self.transforms.apply(item, &directives);
            }

            accumulator = accumulator.fold(Contribution {
                document,
                path_prefix: &job.source.path_prefix,
                cluster_id: &job.cluster.id,
                destination_id: &job.destination.id,
                document_path: job.document_path,
                is_metadata: job.source.is_metadata_source(job.document_path),
            });
        }

        tracing::info!(
            merged = accumulator.contributions(),
            failed = failures.len(),
            "aggregation finished"
        );

        Ok(AggregationOutcome {
            document: accumulator.finish(base),
            failures,
        })
    }

    async fn fetch_one(
        &self,
        job: &FetchJob<'_>,
        cancel: &CancellationToken,
    ) -> Result<OpenApiDocument, FetchError> {
        let timeout = job.destination.http.timeout;
        let request = DocumentRequest {
            cluster_id: &job.cluster.id,
            destination: job.destination,
            url: &job.url,
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(FetchError::Cancelled),
            result = tokio::time::timeout(timeout, self.fetcher.fetch(request)) => {
                result.unwrap_or(Err(FetchError::Timeout(timeout)))
            }
        }
    }

    /// Drop cached HTTP clients of destinations removed by a reload.
    fn prune_clients(&self, snapshot: &ConfigSnapshot) {
        let Some(clients) = &self.clients else {
            return;
        };
        let previous = self
            .pruned_generation
            .swap(snapshot.generation, Ordering::AcqRel);
        if previous != snapshot.generation {
            clients.retain_configured(&snapshot.topology);
        }
    }
}

fn base_document(snapshot: &ConfigSnapshot) -> OpenApiDocument {
    let info = &snapshot.settings.info;
    OpenApiDocument::new(Info {
        title: info.title.clone(),
        version: info.version.clone(),
        description: info.description.clone(),
        ..Info::default()
    })
}

/// Log a failure and keep it, or abort when `fail_fast` is set.
fn record(
    failures: &mut Vec<SourceFailure>,
    failure: SourceFailure,
    fail_fast: bool,
) -> Result<(), AggregationError> {
    tracing::warn!(
        cluster_id = %failure.cluster_id,
        destination_id = %failure.destination_id,
        source_index = failure.source_index,
        document = failure.document_path.as_deref().unwrap_or_default(),
        kind = ?failure.kind,
        error = %failure.message,
        "source skipped"
    );
    if fail_fast {
        return Err(AggregationError::SourceFailed(failure));
    }
    failures.push(failure);
    Ok(())
}
