use std::collections::VecDeque;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::connection::Connection;
use crate::error::{Error, ErrorKind, Result};
use crate::request::Request;
use crate::response::Response;

/// Options for a C8QL query.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<u32>,
    /// Ask the server for the total result count.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<bool>,
    /// Seconds the server keeps an idle cursor alive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
}

/// Iterator over query results, fetching further batches on demand.
pub struct Cursor {
    conn: Arc<Connection>,
    id: Option<String>,
    batch: VecDeque<Value>,
    has_more: bool,
    count: Option<u64>,
    extra: Value,
}

impl Cursor {
    pub(crate) fn from_response(conn: Arc<Connection>, response: &Response) -> Self {
        let mut cursor = Self {
            conn,
            id: None,
            batch: VecDeque::new(),
            has_more: false,
            count: None,
            extra: Value::Null,
        };
        cursor.update(response.body());
        cursor
    }

    fn update(&mut self, body: &Value) {
        if let Some(id) = body.get("id").and_then(Value::as_str) {
            self.id = Some(id.to_string());
        }
        if let Some(items) = body.get("result").and_then(Value::as_array) {
            self.batch.extend(items.iter().cloned());
        }
        self.has_more = body.get("hasMore").and_then(Value::as_bool).unwrap_or(false);
        if let Some(count) = body.get("count").and_then(Value::as_u64) {
            self.count = Some(count);
        }
        if let Some(extra) = body.get("extra") {
            self.extra = extra.clone();
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// Total result count reported by the server, when the query asked for it.
    ///
    /// Unlike `Iterator::count`, this reads the cached value and consumes
    /// nothing.
    pub fn total_count(&self) -> Option<u64> {
        self.count
    }

    /// Query statistics and warnings.
    pub fn extra(&self) -> &Value {
        &self.extra
    }

    /// Results of the current batch not yet consumed.
    pub fn batch(&self) -> impl Iterator<Item = &Value> {
        self.batch.iter()
    }

    /// Fetch the next batch from the server.
    pub fn fetch(&mut self) -> Result<()> {
        let id = self
            .id
            .clone()
            .ok_or_else(|| Error::state(ErrorKind::CursorState, "cursor has no ID"))?;

        let response = self
            .conn
            .send_request(&Request::put(format!("/_api/cursor/{}", id)))?;
        if !response.is_success() {
            return Err(Error::server(ErrorKind::CursorNext, &response));
        }
        self.update(response.body());
        Ok(())
    }

    /// Release the cursor on the server. Returns `false` when the server
    /// already dropped it and `ignore_missing` is set.
    pub fn close(&mut self, ignore_missing: bool) -> Result<bool> {
        let Some(id) = self.id.clone() else {
            return Ok(false);
        };

        let response = self
            .conn
            .send_request(&Request::delete(format!("/_api/cursor/{}", id)))?;
        if response.is_success() {
            self.has_more = false;
            return Ok(true);
        }
        if response.status() == 404 && ignore_missing {
            return Ok(false);
        }
        Err(Error::server(ErrorKind::CursorClose, &response))
    }
}

impl Iterator for Cursor {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        // A batch may come back empty while more remain.
        while self.batch.is_empty() && self.has_more {
            if let Err(e) = self.fetch() {
                self.has_more = false;
                return Some(Err(e));
            }
        }
        self.batch.pop_front().map(Ok)
    }
}

impl std::fmt::Debug for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("id", &self.id)
            .field("buffered", &self.batch.len())
            .field("has_more", &self.has_more)
            .finish()
    }
}
