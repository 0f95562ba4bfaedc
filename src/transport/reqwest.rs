use std::time::Duration;

use futures::{future::BoxFuture, FutureExt};
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Client,
};
use serde_json::Value;

use super::{ResolvedRequest, Response, Transport, TransportError};
use crate::address::Method;

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => TransportError::Status {
                status: status.as_u16(),
                body: None,
            },
            None if e.is_builder() => TransportError::InvalidRequest(e.to_string()),
            None => TransportError::Network(e.to_string()),
        }
    }
}

/// Production transport: JSON over `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

fn method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
        Method::Patch => reqwest::Method::PATCH,
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: ResolvedRequest) -> BoxFuture<'_, Result<Response, TransportError>> {
        async move {
            let mut headers = HeaderMap::new();
            for (name, value) in &request.headers {
                let name = HeaderName::try_from(name.as_str())
                    .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
                let value = HeaderValue::try_from(value.as_str())
                    .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
                headers.insert(name, value);
            }

            let mut builder = self
                .client
                .request(method(request.method), &request.url)
                .headers(headers);

            if !request.params.is_empty() {
                builder = builder.query(&request.params);
            }

            if let Some(timeout) = request.timeout {
                builder = builder.timeout(timeout);
            }

            if let Some(body) = request.data.as_ref().filter(|_| request.method != Method::Get) {
                builder = builder.json(body);
            }

            let response = builder.send().await?;
            let status = response.status().as_u16();
            let text = response.text().await?;

            let data = if text.is_empty() {
                None
            } else {
                Some(serde_json::from_str(&text).unwrap_or(Value::String(text)))
            };

            if !(200..300).contains(&status) {
                return Err(TransportError::Status { status, body: data });
            }

            Ok(Response { status, data })
        }
        .boxed()
    }
}
