//! HTTP fetch collaborator
//!
//! The pipeline only needs `fetch(PreparedRequest) -> Response`. This module
//! defines that seam as the [`Fetcher`] trait and ships a `reqwest`-backed
//! implementation. Connection pooling, TLS, and redirects belong to the
//! client; retries, if wanted, belong inside a custom `Fetcher`.

use crate::crawler::request::PreparedRequest;
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client, Method};
use std::time::Duration;
use thiserror::Error;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_REDIRECTS: usize = 10;

/// A fetched page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// HTTP status code
    pub status: u16,
    /// Final URL after redirects; relative links resolve against it
    pub url: Url,
    /// Response body as text
    pub body: String,
}

/// Fetch failures, recorded per job and never fatal to the pipeline
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Invalid request for {url}: {message}")]
    InvalidRequest { url: String, message: String },

    #[error("Invalid response from {url}: {message}")]
    InvalidResponse { url: String, message: String },
}

/// Sends prepared requests
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: PreparedRequest) -> Result<Response, FetchError>;
}

/// Builds the HTTP client used by [`ReqwestFetcher`]
pub fn build_http_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .connect_timeout(CONNECT_TIMEOUT)
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// [`Fetcher`] backed by a shared `reqwest::Client`
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: Client,
}

impl ReqwestFetcher {
    pub fn new() -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client()?,
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, request: PreparedRequest) -> Result<Response, FetchError> {
        let url_str = request.url.to_string();

        let method = Method::from_bytes(request.method.as_bytes()).map_err(|e| {
            FetchError::InvalidRequest {
                url: url_str.clone(),
                message: e.to_string(),
            }
        })?;

        let mut builder = self.client.request(method, request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(auth) = &request.auth {
            builder = builder.basic_auth(&auth.username, auth.password.as_ref());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| classify_error(&url_str, e))?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::InvalidResponse {
                url: url_str.clone(),
                message: e.to_string(),
            })?;

        Ok(Response {
            status,
            url: final_url,
            body,
        })
    }
}

fn classify_error(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else if error.is_builder() {
        FetchError::InvalidRequest {
            url: url.to_string(),
            message: error.to_string(),
        }
    } else {
        FetchError::Transport {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}
