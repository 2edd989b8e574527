use crate::domain::{ClusterTopology, Destination, DestinationHttpSettings};
use dashmap::DashMap;
use docs_http::{HttpClient, HttpClientBuilder, HttpClientConfig, HttpError, TransportSecurity};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ClientKey {
    cluster_id: String,
    destination_id: String,
}

#[derive(Debug)]
struct CachedClient {
    settings: DestinationHttpSettings,
    client: HttpClient,
}

/// One HTTP client per (cluster, destination) pair.
///
/// Clients are built lazily from the destination's settings and rebuilt when
/// those settings change between snapshots.
#[derive(Debug, Default)]
pub struct HttpClientRegistry {
    clients: DashMap<ClientKey, CachedClient>,
}

impl HttpClientRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Client for `destination` of `cluster_id`.
    ///
    /// # Errors
    /// Returns an error if the client cannot be built (TLS setup, invalid header).
    pub fn client_for(
        &self,
        cluster_id: &str,
        destination: &Destination,
    ) -> Result<HttpClient, HttpError> {
        let key = ClientKey {
            cluster_id: cluster_id.to_owned(),
            destination_id: destination.id.clone(),
        };

        if let Some(cached) = self.clients.get(&key)
            && cached.settings == destination.http
        {
            return Ok(cached.client.clone());
        }

        let client = build_client(&destination.http)?;
        tracing::debug!(
            cluster_id,
            destination_id = %destination.id,
            "built upstream HTTP client"
        );
        self.clients.insert(
            key,
            CachedClient {
                settings: destination.http.clone(),
                client: client.clone(),
            },
        );
        Ok(client)
    }

    /// Drop clients whose destination no longer exists in `topology`.
    pub fn retain_configured(&self, topology: &ClusterTopology) {
        self.clients.retain(|key, _| {
            topology
                .clusters
                .get(&key.cluster_id)
                .is_some_and(|cluster| cluster.destinations.contains_key(&key.destination_id))
        });
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

fn build_client(settings: &DestinationHttpSettings) -> Result<HttpClient, HttpError> {
    let mut config = HttpClientConfig::upstream(
        settings.timeout,
        TransportSecurity::from_allow_http(settings.allow_insecure_http),
    );
    config.max_body_size = settings.max_body_size;
    config.default_headers.clone_from(&settings.headers);
    if let Some(user_agent) = &settings.user_agent {
        config.user_agent.clone_from(user_agent);
    }
    HttpClientBuilder::with_config(config).build()
}
