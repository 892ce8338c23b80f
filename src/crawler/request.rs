//! Request model
//!
//! A [`Request`] describes an HTTP call that has not been sent yet. Preparing
//! it against a [`Session`] resolves the URL, appends query parameters and
//! folds cookies into headers, producing the [`PreparedRequest`] handed to the
//! fetch collaborator.

use crate::config::{BasicAuth, RequestParams};
use crate::url::parse_fetchable;
use crate::UrlError;
use std::collections::BTreeMap;
use url::Url;

/// An HTTP call description, built from a URL and the request template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub params: Vec<(String, String)>,
    pub body: Option<String>,
    pub auth: Option<BasicAuth>,
    pub cookies: BTreeMap<String, String>,
}

impl Request {
    /// Creates a bare GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            url: url.into(),
            headers: BTreeMap::new(),
            params: Vec::new(),
            body: None,
            auth: None,
            cookies: BTreeMap::new(),
        }
    }

    /// Creates a request for `url` using the configured template
    pub fn from_template(url: impl Into<String>, template: &RequestParams) -> Self {
        Self {
            method: template.method.to_ascii_uppercase(),
            url: url.into(),
            headers: template.headers.clone(),
            params: template
                .params
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            body: template.body.clone(),
            auth: template.auth.clone(),
            cookies: template.cookies.clone(),
        }
    }

    /// The URL this request will hit once params are appended
    pub fn full_url(&self) -> Result<Url, UrlError> {
        let mut url = parse_fetchable(&self.url)?;
        if !self.params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.params {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Resolves this request into a sendable form
    ///
    /// Session cookies are merged underneath the request's own cookies.
    pub fn prepare(self, session: &Session) -> Result<PreparedRequest, UrlError> {
        let url = self.full_url()?;

        let mut cookies = session.cookies.clone();
        cookies.extend(self.cookies);

        let mut headers = self.headers;
        if !cookies.is_empty() {
            let cookie_header = cookies
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("; ");
            headers.insert("Cookie".to_string(), cookie_header);
        }

        Ok(PreparedRequest {
            method: self.method.to_ascii_uppercase(),
            url,
            headers,
            body: self.body,
            auth: self.auth,
        })
    }
}

/// A request ready to be sent by the fetch collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRequest {
    pub method: String,
    pub url: Url,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
    pub auth: Option<BasicAuth>,
}

/// State shared by every request of one pipeline
///
/// Holds the fixed cookies applied when `fixed-cookie` mode is on. Read-only
/// once the pipeline starts.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub cookies: BTreeMap<String, String>,
}

impl Session {
    pub fn with_cookies(cookies: BTreeMap<String, String>) -> Self {
        Self { cookies }
    }
}
