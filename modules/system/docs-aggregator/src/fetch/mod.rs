//! Retrieval of upstream documents.

mod clients;
mod decode;

pub use clients::HttpClientRegistry;
pub use decode::decode_document;

use crate::document::OpenApiDocument;
use crate::domain::Destination;
use crate::error::FetchError;
use async_trait::async_trait;
use std::sync::Arc;
use url::Url;

const ACCEPT: &str = "application/json, application/yaml;q=0.9, text/yaml;q=0.8, */*;q=0.5";

/// One document to retrieve.
#[derive(Debug, Clone, Copy)]
pub struct DocumentRequest<'a> {
    pub cluster_id: &'a str,
    pub destination: &'a Destination,
    /// Absolute document URL, already resolved against the destination address.
    pub url: &'a Url,
}

/// Source of upstream documents.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    /// Retrieve and decode one document.
    ///
    /// # Errors
    /// Returns [`FetchError`] on transport failure, non-2xx status, or an undecodable body.
    async fn fetch(&self, request: DocumentRequest<'_>) -> Result<OpenApiDocument, FetchError>;
}

/// [`DocumentFetcher`] issuing HTTP GET requests through per-destination clients.
#[derive(Debug, Clone, Default)]
pub struct HttpDocumentFetcher {
    clients: Arc<HttpClientRegistry>,
}

impl HttpDocumentFetcher {
    #[must_use]
    pub fn new(clients: Arc<HttpClientRegistry>) -> Self {
        Self { clients }
    }

    #[must_use]
    pub fn clients(&self) -> &Arc<HttpClientRegistry> {
        &self.clients
    }
}

#[async_trait]
impl DocumentFetcher for HttpDocumentFetcher {
    async fn fetch(&self, request: DocumentRequest<'_>) -> Result<OpenApiDocument, FetchError> {
        let client = self
            .clients
            .client_for(request.cluster_id, request.destination)?;

        let body = client
            .get(request.url.as_str())
            .header("accept", ACCEPT)
            .send()
            .await?
            .checked_bytes()
            .await?;

        tracing::trace!(url = %request.url, bytes = body.len(), "fetched upstream document");
        decode_document(&body)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::config::{ClusterConfig, DestinationConfig, GatewayConfig};
    use crate::domain::ClusterTopology;
    use httpmock::prelude::*;

    fn topology_for(server: &MockServer) -> ClusterTopology {
        let mut config = GatewayConfig::default();
        let mut cluster = ClusterConfig::default();
        let mut destination = DestinationConfig {
            address: server.base_url(),
            ..DestinationConfig::default()
        };
        destination
            .headers
            .insert("authorization".into(), "Bearer upstream".into());
        cluster.destinations.insert("d1".into(), destination);
        config.clusters.insert("orders".into(), cluster);
        ClusterTopology::resolve(&config).0
    }

    #[tokio::test]
    async fn test_fetch_sends_destination_headers() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/swagger/v1/swagger.json")
                .header("authorization", "Bearer upstream");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"openapi":"3.0.1","info":{"title":"Orders","version":"1"},"paths":{}}"#);
        });

        let topology = topology_for(&server);
        let destination = &topology.clusters["orders"].destinations["d1"];
        let url = destination.document_url("/swagger/v1/swagger.json").unwrap();
        let fetcher = HttpDocumentFetcher::default();

        let doc = fetcher
            .fetch(DocumentRequest {
                cluster_id: "orders",
                destination,
                url: &url,
            })
            .await
            .unwrap();

        mock.assert();
        assert_eq!(doc.info.title, "Orders");
        assert_eq!(fetcher.clients().len(), 1);
    }

    #[tokio::test]
    async fn test_non_success_status_is_fetch_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/missing.json");
            then.status(404).body("not here");
        });

        let topology = topology_for(&server);
        let destination = &topology.clusters["orders"].destinations["d1"];
        let url = destination.document_url("/missing.json").unwrap();

        let err = HttpDocumentFetcher::default()
            .fetch(DocumentRequest {
                cluster_id: "orders",
                destination,
                url: &url,
            })
            .await
            .unwrap_err();

        match err {
            FetchError::Http(http) => {
                assert_eq!(http.status().map(|s| s.as_u16()), Some(404));
            }
            other => panic!("expected HTTP error, got {other:?}"),
        }
    }
}
