use std::collections::BTreeMap;
use std::sync::OnceLock;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::request::Method;

/// HTTP response from a request
///
/// Header names are stored lowercased. The body is kept raw and parsed as
/// JSON on first access.
#[derive(Debug, Clone)]
pub struct Response {
    method: Method,
    url: String,
    status: u16,
    status_text: String,
    headers: BTreeMap<String, String>,
    raw_body: String,
    body: OnceLock<Value>,
}

impl Response {
    pub fn new(
        method: Method,
        url: impl Into<String>,
        status: u16,
        status_text: impl Into<String>,
        headers: BTreeMap<String, String>,
        raw_body: impl Into<String>,
    ) -> Self {
        let headers = headers
            .into_iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value))
            .collect();

        Self {
            method,
            url: url.into(),
            status,
            status_text: status_text.into(),
            headers,
            raw_body: raw_body.into(),
            body: OnceLock::new(),
        }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn raw_body(&self) -> &str {
        &self.raw_body
    }

    /// Parsed body. Non-JSON text comes back as a JSON string, an empty body
    /// as `null`.
    pub fn body(&self) -> &Value {
        self.body.get_or_init(|| {
            if self.raw_body.trim().is_empty() {
                return Value::Null;
            }
            serde_json::from_str(&self.raw_body)
                .unwrap_or_else(|_| Value::String(self.raw_body.clone()))
        })
    }

    /// Check if the response status indicates success (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Server error number (`errorNum`), if the body carries one.
    pub fn error_code(&self) -> Option<i64> {
        self.body().get("errorNum").and_then(Value::as_i64)
    }

    /// Server error message (`errorMessage`), if the body carries one.
    pub fn error_message(&self) -> Option<&str> {
        self.body().get("errorMessage").and_then(Value::as_str)
    }

    /// True for a 404 status or a `404` error number.
    pub fn is_not_found(&self) -> bool {
        self.status == 404 || self.error_code() == Some(crate::error::HTTP_NOT_FOUND)
    }

    /// Try to deserialize the body into a specific type
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.body().clone())
    }

    /// Deserialize one top-level field of the body.
    pub fn field<T: DeserializeOwned>(&self, name: &str) -> Result<T, serde_json::Error> {
        let value = self.body().get(name).cloned().unwrap_or(Value::Null);
        serde_json::from_value(value)
    }
}
