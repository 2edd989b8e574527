use crate::client::HttpClient;
use crate::config::TransportSecurity;
use crate::error::{HttpError, InvalidUriKind};
use crate::response::HttpResponse;
use bytes::Bytes;
use http::Request;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http_body_util::Full;
use tower::ServiceExt;

/// HTTP request builder with fluent API
///
/// Created by [`HttpClient::get`]. Header errors are deferred and reported by
/// [`send()`](RequestBuilder::send).
///
/// This crate does **not** compose URLs. Resolve the final URL externally
/// (e.g. via `url::Url::join`) and pass the string to the client:
///
/// ```ignore
/// let base = url::Url::parse("http://orders:8080/")?;
/// let url = base.join("swagger/v1/swagger.json")?;
/// let resp = client.get(url.as_str()).send().await?;
/// ```
#[must_use = "RequestBuilder does nothing until .send() is called"]
pub struct RequestBuilder {
    client: HttpClient,
    method: http::Method,
    url: String,
    headers: HeaderMap,
    /// Error captured during building (deferred to `send()`)
    error: Option<HttpError>,
}

impl RequestBuilder {
    pub(crate) fn new(client: HttpClient, method: http::Method, url: String) -> Self {
        Self {
            client,
            method,
            url,
            headers: HeaderMap::new(),
            error: None,
        }
    }

    /// Add a single header to the request
    ///
    /// A header set here replaces the client default of the same name.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if self.error.is_some() {
            return self;
        }

        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            (Err(e), _) => {
                self.error = Some(HttpError::InvalidHeaderName(e));
            }
            (_, Err(e)) => {
                self.error = Some(HttpError::InvalidHeaderValue(e));
            }
        }
        self
    }

    /// Validate URL and scheme against transport security configuration.
    fn validate_url(&self) -> Result<http::Uri, HttpError> {
        let uri: http::Uri =
            self.url
                .parse()
                .map_err(|e: http::uri::InvalidUri| HttpError::InvalidUri {
                    url: self.url.clone(),
                    kind: InvalidUriKind::ParseError,
                    reason: e.to_string(),
                })?;

        if uri.authority().is_none() {
            return Err(HttpError::InvalidUri {
                url: self.url.clone(),
                kind: InvalidUriKind::MissingAuthority,
                reason: "missing host/authority".to_owned(),
            });
        }

        match uri.scheme_str() {
            Some("https") => Ok(uri),
            Some("http") => match self.client.transport_security {
                TransportSecurity::AllowInsecureHttp => Ok(uri),
                TransportSecurity::TlsOnly => Err(HttpError::InvalidScheme {
                    scheme: "http".to_owned(),
                    reason: "HTTPS required (transport security is TlsOnly)".to_owned(),
                }),
            },
            Some(scheme) => Err(HttpError::InvalidScheme {
                scheme: scheme.to_owned(),
                reason: "only http:// and https:// schemes are supported".to_owned(),
            }),
            None => Err(HttpError::InvalidUri {
                url: self.url.clone(),
                kind: InvalidUriKind::MissingScheme,
                reason: "missing scheme".to_owned(),
            }),
        }
    }

    /// Send the request and return the response
    ///
    /// Every HTTP status yields `Ok`; use [`HttpResponse::checked_bytes`] to
    /// turn non-2xx into an error.
    ///
    /// # Errors
    ///
    /// Returns `HttpError` if:
    /// - a header was invalid
    /// - the URL is malformed or its scheme is not allowed
    /// - the connection failed
    /// - the request timed out
    pub async fn send(mut self) -> Result<HttpResponse, HttpError> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }

        let uri = self.validate_url()?;

        let mut request = Request::builder()
            .method(self.method)
            .uri(uri)
            .body(Full::new(Bytes::new()))?;

        let merged = request.headers_mut();
        for (name, value) in self.client.default_headers.iter() {
            if !self.headers.contains_key(name) {
                merged.append(name.clone(), value.clone());
            }
        }
        merged.extend(self.headers);

        let inner = self.client.service.clone().oneshot(request).await?;

        Ok(HttpResponse {
            inner,
            max_body_size: self.client.max_body_size,
        })
    }
}
