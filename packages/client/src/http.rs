//! HTTP transport abstraction.
//!
//! [`HttpClient`] sends one fully-resolved request. Production code uses
//! [`ReqwestClient`]; unit tests swap in the recording mock.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::{Error, Result};
use crate::request::{Body, Request};
use crate::response::Response;

/// Trait for sending HTTP requests.
pub trait HttpClient: Send + Sync {
    /// Send `request` to the absolute `url` and return the response.
    ///
    /// Non-2xx statuses are returned as responses, not errors.
    fn send(&self, url: &str, request: &Request) -> Result<Response>;
}

/// Blocking transport over `reqwest`.
pub struct ReqwestClient {
    client: Client,
}

impl ReqwestClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
        })
    }

    /// 30 second request timeout.
    pub fn with_default_timeout() -> Result<Self> {
        Self::new(Duration::from_secs(30))
    }
}

fn header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        map.insert(
            HeaderName::try_from(name.as_str())?,
            HeaderValue::try_from(value.as_str())?,
        );
    }
    Ok(map)
}

/// Connect failures, timeouts and dropped connections become
/// `Error::Transport`, with the cause chain folded into the message.
fn transport_error(err: reqwest::Error) -> Error {
    if err.is_builder() {
        return Error::Http(err);
    }
    let mut message = err.to_string();
    let mut source = std::error::Error::source(&err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = std::error::Error::source(cause);
    }
    Error::Transport { message }
}

impl HttpClient for ReqwestClient {
    fn send(&self, url: &str, request: &Request) -> Result<Response> {
        let mut builder = self
            .client
            .request(request.method().into(), url)
            .headers(header_map(request.headers())?);
        if !request.params().is_empty() {
            builder = builder.query(request.params());
        }
        builder = match request.body() {
            Some(Body::Json(body)) => builder.json(body),
            Some(Body::Raw(text)) => builder.body(text.clone()),
            None => builder,
        };

        let reply = builder.send().map_err(transport_error)?;
        let status = reply.status();
        // Header names come back lowercased from reqwest.
        let headers: BTreeMap<String, String> = reply
            .headers()
            .iter()
            .filter_map(|(name, value)| Some((name.to_string(), value.to_str().ok()?.to_string())))
            .collect();

        Ok(Response::new(
            request.method(),
            url,
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown"),
            headers,
            reply.text().map_err(transport_error)?,
        ))
    }
}
