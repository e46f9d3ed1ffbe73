//! Document collections.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::api::{ApiWrapper, Output};
use crate::error::{Error, ErrorKind, Result, ServerError, DOCUMENT_NOT_FOUND};
use crate::executor::Executor;
use crate::request::{Method, Request};
use crate::response::Response;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "u8", into = "u8")]
pub enum CollectionType {
    #[default]
    Document,
    Edge,
}

impl From<u8> for CollectionType {
    fn from(code: u8) -> Self {
        if code == 3 {
            CollectionType::Edge
        } else {
            CollectionType::Document
        }
    }
}

impl From<CollectionType> for u8 {
    fn from(kind: CollectionType) -> Self {
        match kind {
            CollectionType::Document => 2,
            CollectionType::Edge => 3,
        }
    }
}

/// Summary returned by collection listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectionInfo {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(rename = "isSystem", default)]
    pub system: bool,
    #[serde(rename = "type", default)]
    pub collection_type: CollectionType,
    #[serde(default)]
    pub stream: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CreateCollectionOptions {
    pub edge: bool,
    pub system: bool,
    /// Attach a change stream to the collection.
    pub stream: bool,
    pub wait_for_sync: Option<bool>,
}

impl CreateCollectionOptions {
    pub(crate) fn to_body(&self, name: &str) -> Value {
        let kind = if self.edge {
            CollectionType::Edge
        } else {
            CollectionType::Document
        };
        let mut body = json!({
            "name": name,
            "type": u8::from(kind),
            "isSystem": self.system,
            "stream": self.stream,
        });
        if let Some(sync) = self.wait_for_sync {
            body["waitForSync"] = json!(sync);
        }
        body
    }
}

/// Flags for document writes. Unset flags fall back to the server default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteOptions {
    pub return_new: Option<bool>,
    pub return_old: Option<bool>,
    /// Return `true` instead of document metadata.
    pub silent: Option<bool>,
    pub wait_for_sync: Option<bool>,
    /// Update only: keep attributes set to `null`.
    pub keep_null: Option<bool>,
    /// Update only: merge nested objects instead of replacing them.
    pub merge_objects: Option<bool>,
}

impl WriteOptions {
    fn flags(&self) -> [(&'static str, Option<bool>); 6] {
        [
            ("returnNew", self.return_new),
            ("returnOld", self.return_old),
            ("silent", self.silent),
            ("waitForSync", self.wait_for_sync),
            ("keepNull", self.keep_null),
            ("mergeObjects", self.merge_objects),
        ]
    }

    fn apply(&self, mut request: Request) -> Request {
        for (name, value) in self.flags() {
            request = request.with_opt_param(name, value);
        }
        request
    }

    fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .flags()
            .into_iter()
            .filter_map(|(name, value)| value.map(|v| (name.to_string(), Value::Bool(v))))
            .collect();
        Value::Object(map)
    }

    fn is_silent(&self) -> bool {
        self.silent == Some(true)
    }
}

/// Identifies a document: a key, a full `collection/key` id, or a body
/// carrying `_id` or `_key`.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentRef {
    Handle(String),
    Body(Value),
}

impl From<&str> for DocumentRef {
    fn from(handle: &str) -> Self {
        DocumentRef::Handle(handle.to_string())
    }
}

impl From<String> for DocumentRef {
    fn from(handle: String) -> Self {
        DocumentRef::Handle(handle)
    }
}

impl From<Value> for DocumentRef {
    fn from(body: Value) -> Self {
        DocumentRef::Body(body)
    }
}

impl From<&Value> for DocumentRef {
    fn from(body: &Value) -> Self {
        DocumentRef::Body(body.clone())
    }
}

/// A document collection in a fabric.
#[derive(Debug, Clone)]
pub struct Collection<E: Executor> {
    executor: E,
    name: String,
}

impl<E: Executor> ApiWrapper for Collection<E> {
    type Executor = E;

    fn executor(&self) -> &E {
        &self.executor
    }
}

fn quote(text: &str) -> String {
    Value::String(text.to_string()).to_string()
}

fn item_error(kind: ErrorKind, response: &Response, item: &Value) -> Error {
    Error::Server(ServerError {
        kind,
        http_status: response.status(),
        error_num: item.get("errorNum").and_then(Value::as_i64),
        message: item
            .get("errorMessage")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        method: response.method().to_string(),
        url: response.url().to_string(),
    })
}

impl<E: Executor> Collection<E> {
    pub fn new(executor: E, name: impl Into<String>) -> Self {
        Self {
            executor,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn validate_id(&self, id: &str) -> Result<String> {
        let prefix = format!("{}/", self.name);
        if !id.starts_with(&prefix) || id.len() == prefix.len() {
            return Err(Error::client(
                ErrorKind::DocumentParse,
                format!("bad collection name in document ID \"{}\"", id),
            ));
        }
        Ok(id.to_string())
    }

    /// Resolve a document reference to its full `collection/key` id.
    pub fn document_id(&self, document: &DocumentRef) -> Result<String> {
        match document {
            DocumentRef::Handle(handle) if handle.contains('/') => self.validate_id(handle),
            DocumentRef::Handle(key) => Ok(format!("{}/{}", self.name, key)),
            DocumentRef::Body(body) => {
                if let Some(id) = body.get("_id").and_then(Value::as_str) {
                    return self.validate_id(id);
                }
                if let Some(key) = body.get("_key").and_then(Value::as_str) {
                    return Ok(format!("{}/{}", self.name, key));
                }
                Err(Error::client(
                    ErrorKind::DocumentParse,
                    "field \"_key\" or \"_id\" required",
                ))
            }
        }
    }

    /// Fill `_key` from `_id` when only the latter is present.
    fn ensure_key_from_id(&self, document: &Value) -> Result<Value> {
        let mut document = document.clone();
        if document.get("_key").is_none() {
            if let Some(id) = document.get("_id").and_then(Value::as_str) {
                let id = self.validate_id(id)?;
                let key = id[self.name.len() + 1..].to_string();
                document["_key"] = Value::String(key);
            }
        }
        Ok(document)
    }

    fn db(&self) -> String {
        format!("db.{}", self.name)
    }

    pub fn properties(&self) -> Result<Output<E, Value>> {
        let request = Request::get(format!("/_api/collection/{}/properties", self.name))
            .with_command(format!("{}.properties()", self.db()))
            .with_read(self.name.as_str());

        self.execute(request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::CollectionProperties, &resp));
            }
            Ok(resp.body().clone())
        })
    }

    pub fn count(&self) -> Result<Output<E, u64>> {
        let request = Request::get(format!("/_api/collection/{}/count", self.name))
            .with_command(format!("{}.count()", self.db()))
            .with_read(self.name.as_str());

        self.execute(request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::CollectionCount, &resp));
            }
            Ok(resp.field::<u64>("count")?)
        })
    }

    /// Remove every document while keeping the collection and its indexes.
    pub fn truncate(&self) -> Result<Output<E, bool>> {
        let request = Request::put(format!("/_api/collection/{}/truncate", self.name))
            .with_command(format!("{}.truncate()", self.db()))
            .with_write(self.name.as_str());

        self.execute(request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::CollectionTruncate, &resp));
            }
            Ok(true)
        })
    }

    /// Fetch a document. A missing document is `None`.
    pub fn get(&self, document: impl Into<DocumentRef>) -> Result<Output<E, Option<Value>>> {
        let id = self.document_id(&document.into())?;
        let request = Request::get(format!("/_api/document/{}", id))
            .with_command(format!("{}.document({})", self.db(), quote(&id)))
            .with_read(self.name.as_str());

        self.execute(request, |resp| {
            if resp.status() == 404 || resp.error_code() == Some(DOCUMENT_NOT_FOUND) {
                return Ok(None);
            }
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::DocumentGet, &resp));
            }
            Ok(Some(resp.body().clone()))
        })
    }

    pub fn has(&self, document: impl Into<DocumentRef>) -> Result<Output<E, bool>> {
        let id = self.document_id(&document.into())?;
        let request = Request::get(format!("/_api/document/{}", id))
            .with_command(format!("{}.exists({}) !== false", self.db(), quote(&id)))
            .with_read(self.name.as_str());

        self.execute(request, |resp| {
            if resp.is_not_found() || resp.error_code() == Some(DOCUMENT_NOT_FOUND) {
                return Ok(false);
            }
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::DocumentIn, &resp));
            }
            Ok(true)
        })
    }

    /// Insert a document and return its metadata (`_id`, `_key`, `_rev`).
    pub fn insert(&self, document: &Value, options: &WriteOptions) -> Result<Output<E, Value>> {
        let document = self.ensure_key_from_id(document)?;
        let command = format!("{}.insert({},{})", self.db(), document, options.to_json());
        let request = options
            .apply(Request::post(format!("/_api/document/{}", self.name)))
            .with_json_body(document)
            .with_command(command)
            .with_write(self.name.as_str());

        let silent = options.is_silent();
        self.execute(request, move |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::DocumentInsert, &resp));
            }
            if silent {
                return Ok(Value::Bool(true));
            }
            Ok(resp.body().clone())
        })
    }

    /// Insert several documents in one request.
    ///
    /// A document the server rejects shows up as an `Err` at its position in
    /// the returned list; the others are still inserted.
    pub fn insert_many(
        &self,
        documents: &[Value],
        options: &WriteOptions,
    ) -> Result<Output<E, Vec<Result<Value>>>> {
        let documents = documents
            .iter()
            .map(|doc| self.ensure_key_from_id(doc))
            .collect::<Result<Vec<_>>>()?;
        let body = Value::Array(documents);
        let command = format!("{}.insert({},{})", self.db(), body, options.to_json());
        let request = options
            .apply(Request::post(format!("/_api/document/{}", self.name)))
            .with_json_body(body)
            .with_command(command)
            .with_write(self.name.as_str());

        self.execute(request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::DocumentInsert, &resp));
            }
            let items = resp.body().as_array().cloned().unwrap_or_default();
            Ok(items
                .into_iter()
                .map(|item| {
                    if item.get("error").and_then(Value::as_bool) == Some(true) {
                        Err(item_error(ErrorKind::DocumentInsert, &resp, &item))
                    } else {
                        Ok(item)
                    }
                })
                .collect::<Vec<_>>())
        })
    }

    /// Patch a document with the attributes in `document`.
    pub fn update(&self, document: &Value, options: &WriteOptions) -> Result<Output<E, Value>> {
        self.write_document(document, options, Method::PATCH, "update", ErrorKind::DocumentUpdate)
    }

    /// Replace a document wholesale.
    pub fn replace(&self, document: &Value, options: &WriteOptions) -> Result<Output<E, Value>> {
        self.write_document(document, options, Method::PUT, "replace", ErrorKind::DocumentReplace)
    }

    fn write_document(
        &self,
        document: &Value,
        options: &WriteOptions,
        method: Method,
        verb: &str,
        kind: ErrorKind,
    ) -> Result<Output<E, Value>> {
        let id = self.document_id(&DocumentRef::from(document))?;
        let command = format!(
            "{}.{}({},{},{})",
            self.db(),
            verb,
            quote(&id),
            document,
            options.to_json()
        );
        let request = options
            .apply(Request::new(method, format!("/_api/document/{}", id)))
            .with_json_body(document.clone())
            .with_command(command)
            .with_write(self.name.as_str());

        let silent = options.is_silent();
        self.execute(request, move |resp| {
            if !resp.is_success() {
                return Err(Error::server(kind, &resp));
            }
            if silent {
                return Ok(Value::Bool(true));
            }
            Ok(resp.body().clone())
        })
    }

    /// Delete a document. Returns `false` for a missing document when
    /// `ignore_missing` is set.
    pub fn delete(
        &self,
        document: impl Into<DocumentRef>,
        ignore_missing: bool,
        options: &WriteOptions,
    ) -> Result<Output<E, bool>> {
        let id = self.document_id(&document.into())?;
        let command = format!("{}.remove({},{})", self.db(), quote(&id), options.to_json());
        let request = options
            .apply(Request::delete(format!("/_api/document/{}", id)))
            .with_command(command)
            .with_write(self.name.as_str());

        self.execute(request, move |resp| {
            if resp.error_code() == Some(DOCUMENT_NOT_FOUND) && ignore_missing {
                return Ok(false);
            }
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::DocumentDelete, &resp));
            }
            Ok(true)
        })
    }
}
