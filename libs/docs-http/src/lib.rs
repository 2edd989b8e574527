#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! HTTP client used by the documentation aggregator to fetch upstream
//! `OpenAPI` documents.
//!
//! This crate provides a hyper-based HTTP client with:
//! - Automatic TLS via rustls (HTTPS only by default)
//! - Connection pooling
//! - A per-request timeout
//! - Static default headers (per-destination auth, tenant headers, ...)
//! - Bounded redirect following
//! - **Transparent response decompression** (gzip, brotli, deflate)
//!
//! Body size limits apply to **decompressed** bytes.
//!
//! # Example
//!
//! ```ignore
//! use docs_http::HttpClient;
//! use std::time::Duration;
//!
//! let client = HttpClient::builder()
//!     .timeout(Duration::from_secs(10))
//!     .default_header("authorization", "Bearer token")
//!     .build()?;
//!
//! let body = client
//!     .get("https://inventory.internal/swagger/v1/swagger.json")
//!     .send()
//!     .await?
//!     .checked_bytes()
//!     .await?;
//! ```

mod builder;
mod client;
mod config;
mod error;
mod request;
mod response;
mod tls;

pub use builder::HttpClientBuilder;
pub use client::HttpClient;
pub use config::{DEFAULT_USER_AGENT, HttpClientConfig, RootStore, TransportSecurity};
pub use error::{HttpError, InvalidUriKind};
pub use request::RequestBuilder;
pub use response::{ERROR_BODY_PREVIEW_LIMIT, HttpResponse, ResponseBody};
