use crate::builder::HttpClientBuilder;
use crate::config::TransportSecurity;
use crate::error::HttpError;
use crate::request::RequestBuilder;
use crate::response::ResponseBody;
use bytes::Bytes;
use http::header::HeaderMap;
use http::{Request, Response};
use http_body_util::Full;
use std::fmt;
use std::sync::Arc;
use tower::util::BoxCloneSyncService;

/// Type-erased tower stack behind an [`HttpClient`].
pub type ClientService =
    BoxCloneSyncService<Request<Full<Bytes>>, Response<ResponseBody>, HttpError>;

/// HTTP client with tower middleware stack
///
/// `HttpClient` is `Clone + Send + Sync`; cloning shares the connection pool.
/// Callers do NOT need to wrap it in a `Mutex`.
///
/// Use [`HttpClientBuilder`] to construct instances with custom configuration.
#[derive(Clone)]
pub struct HttpClient {
    pub(crate) service: ClientService,
    pub(crate) default_headers: Arc<HeaderMap>,
    pub(crate) max_body_size: usize,
    pub(crate) transport_security: TransportSecurity,
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("default_headers", &self.default_headers.len())
            .field("max_body_size", &self.max_body_size)
            .field("transport_security", &self.transport_security)
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    /// Create a new HTTP client with default configuration
    ///
    /// # Errors
    /// Returns an error if TLS initialization fails
    pub fn new() -> Result<Self, HttpError> {
        HttpClientBuilder::new().build()
    }

    /// Create a builder for configuring the HTTP client
    #[must_use]
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::new()
    }

    /// Create a GET request builder
    ///
    /// The URL must be absolute (`https://host/path`, or `http://` when the
    /// client allows insecure HTTP); anything else is rejected by `send()`
    /// with [`HttpError::InvalidUri`] or [`HttpError::InvalidScheme`].
    pub fn get(&self, url: &str) -> RequestBuilder {
        RequestBuilder::new(self.clone(), http::Method::GET, url.to_owned())
    }

    /// Maximum body size enforced when reading responses
    #[must_use]
    pub fn max_body_size(&self) -> usize {
        self.max_body_size
    }

    /// Transport security mode of this client
    #[must_use]
    pub fn transport_security(&self) -> TransportSecurity {
        self.transport_security
    }
}
