#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Documentation aggregator for the API gateway.
//!
//! Builds one merged `OpenAPI` document per output name from the documents
//! published by the gateway's upstream services:
//!
//! 1. the current [`ConfigSnapshot`] selects the participating clusters,
//! 2. every configured document is fetched with bounded concurrency,
//! 3. paths are pruned by regex and the published-route whitelist,
//! 4. route transform directives are mirrored onto operations,
//! 5. the results are folded, in configuration order, into the output.
//!
//! ```ignore
//! use docs_aggregator::{AggregationEngine, ConfigStore};
//! use std::sync::Arc;
//!
//! let store = Arc::new(ConfigStore::from_path("gateway.yaml".as_ref())?);
//! let engine = AggregationEngine::new(store);
//! for name in engine.document_names() {
//!     let outcome = engine.aggregate(&name).await?;
//!     println!("{}", serde_json::to_string_pretty(&outcome.document)?);
//! }
//! ```

pub mod config;
pub mod document;
pub mod domain;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod merge;
pub mod snapshot;
pub mod transform;

pub use config::{DocsSettings, GatewayConfig};
pub use document::OpenApiDocument;
pub use engine::{AggregationEngine, AggregationOutcome, DocumentEndpoint};
pub use error::{AggregationError, ConfigError, FailureKind, FetchError, SourceFailure};
pub use fetch::{DocumentFetcher, DocumentRequest, HttpClientRegistry, HttpDocumentFetcher};
pub use snapshot::{ConfigSnapshot, ConfigStore};
pub use transform::{
    HeaderTransformFactory, QueryTransformFactory, SwaggerTransformFactory, TransformApplier,
};
