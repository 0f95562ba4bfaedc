//! The request model and the seam to whatever actually talks to the network.

use std::{collections::BTreeMap, future::Future, sync::Arc, time::Duration};

use futures::{future::BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{address::Method, state::DEFAULT_ERROR_MESSAGE};

#[cfg(feature = "http")]
pub mod reqwest;
pub mod url;

#[cfg(feature = "http")]
pub use self::reqwest::ReqwestTransport;

/// Building the effective request failed.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum RequestError {
    #[error("no url specified")]
    MissingUrl,
    #[error("no url specified: {url:?} is not a valid url ({reason})")]
    InvalidUrl { url: String, reason: String },
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Request failed with status code {status}")]
    Status { status: u16, body: Option<Value> },
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid payload: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("{0}")]
    Other(String),
}

/// Turns a transport failure into the text stored in an entry's `error`.
pub type ErrorParser = Arc<dyn Fn(&TransportError) -> String + Send + Sync>;

pub fn default_parse_error(error: &TransportError) -> String {
    let text = error.to_string();
    if text.is_empty() {
        DEFAULT_ERROR_MESSAGE.to_owned()
    } else {
        text
    }
}

/// Everything needed to issue one call, before the url is resolved.
///
/// This is what `transform_request` sees; a [`RequestPatch`] replaces fields of it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOptions {
    pub method: Method,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Query parameters.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
    /// Values of `{name}` / `:name` placeholders in the url.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub url_params: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip)]
    pub timeout: Option<Duration>,
}

/// Shallow replacement of [`RequestOptions`] fields. Maps are replaced, not merged.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RequestPatch {
    pub method: Option<Method>,
    pub url: Option<String>,
    pub base_url: Option<String>,
    pub params: Option<BTreeMap<String, String>>,
    pub url_params: Option<BTreeMap<String, String>>,
    pub headers: Option<BTreeMap<String, String>>,
    pub data: Option<Value>,
}

impl RequestOptions {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        RequestOptions {
            method,
            url: url.into(),
            base_url: None,
            params: BTreeMap::new(),
            url_params: BTreeMap::new(),
            headers: BTreeMap::new(),
            data: None,
            timeout: None,
        }
    }

    pub fn apply(mut self, patch: RequestPatch) -> Self {
        if let Some(method) = patch.method {
            self.method = method;
        }
        if let Some(url) = patch.url {
            self.url = url;
        }
        if let Some(base_url) = patch.base_url {
            self.base_url = Some(base_url);
        }
        if let Some(params) = patch.params {
            self.params = params;
        }
        if let Some(url_params) = patch.url_params {
            self.url_params = url_params;
        }
        if let Some(headers) = patch.headers {
            self.headers = headers;
        }
        if let Some(data) = patch.data {
            self.data = Some(data);
        }
        self
    }

    /// Merge the url, substitute placeholders and validate.
    pub fn resolve(&self) -> Result<ResolvedRequest, RequestError> {
        let url = self::url::effective_url(self.base_url.as_deref(), &self.url, &self.url_params)?;

        Ok(ResolvedRequest {
            method: self.method,
            url,
            params: self.params.clone(),
            headers: self.headers.clone(),
            data: self.data.clone(),
            timeout: self.timeout,
        })
    }
}

/// A request ready to be sent.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResolvedRequest {
    pub method: Method,
    pub url: String,
    pub params: BTreeMap<String, String>,
    pub headers: BTreeMap<String, String>,
    pub data: Option<Value>,
    #[serde(skip)]
    pub timeout: Option<Duration>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Response {
    pub status: u16,
    pub data: Option<Value>,
}

impl Response {
    pub fn ok(data: Value) -> Self {
        Response {
            status: 200,
            data: Some(data),
        }
    }
}

/// Sends resolved requests.
///
/// Any `Err` is a failed call; non-2xx statuses should be reported as
/// [`TransportError::Status`].
pub trait Transport: Send + Sync + 'static {
    fn send(&self, request: ResolvedRequest) -> BoxFuture<'_, Result<Response, TransportError>>;
}

/// A [`Transport`] made of an async closure. See [`transport_fn`].
#[derive(Clone)]
pub struct FnTransport<F>(F);

pub fn transport_fn<F, Fut>(f: F) -> FnTransport<F>
where
    F: Fn(ResolvedRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, TransportError>> + Send + 'static,
{
    FnTransport(f)
}

impl<F, Fut> Transport for FnTransport<F>
where
    F: Fn(ResolvedRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, TransportError>> + Send + 'static,
{
    fn send(&self, request: ResolvedRequest) -> BoxFuture<'_, Result<Response, TransportError>> {
        (self.0)(request).boxed()
    }
}
