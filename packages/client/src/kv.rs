//! Key-value collections.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::api::{ApiWrapper, Output};
use crate::error::{Error, ErrorKind, Result};
use crate::executor::Executor;
use crate::request::Request;

/// One entry written with [`KeyValue::insert`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KvPair {
    #[serde(rename = "_key")]
    pub key: String,
    pub value: Value,
    /// Unix timestamp after which the server drops the entry.
    #[serde(rename = "expireAt", skip_serializing_if = "Option::is_none", default)]
    pub expire_at: Option<i64>,
}

impl KvPair {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
            expire_at: None,
        }
    }

    pub fn expiring_at(mut self, timestamp: i64) -> Self {
        self.expire_at = Some(timestamp);
        self
    }
}

/// Key-value API of a fabric.
#[derive(Debug, Clone)]
pub struct KeyValue<E: Executor> {
    executor: E,
}

impl<E: Executor> ApiWrapper for KeyValue<E> {
    type Executor = E;

    fn executor(&self) -> &E {
        &self.executor
    }
}

impl<E: Executor> KeyValue<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    /// Names of the fabric's key-value collections.
    pub fn collections(&self) -> Result<Output<E, Vec<String>>> {
        self.execute(Request::get("/_api/kv"), |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::KvCollectionList, &resp));
            }
            let names = resp
                .body()
                .get("result")
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|item| item.get("name").and_then(Value::as_str))
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            Ok::<Vec<String>, Error>(names)
        })
    }

    pub fn has_collection(&self, name: &str) -> Result<Output<E, bool>> {
        let name = name.to_string();
        self.execute(Request::get("/_api/kv"), move |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::KvCollectionList, &resp));
            }
            let found = resp
                .body()
                .get("result")
                .and_then(Value::as_array)
                .is_some_and(|items| {
                    items
                        .iter()
                        .any(|item| item.get("name").and_then(Value::as_str) == Some(name.as_str()))
                });
            Ok(found)
        })
    }

    /// Create a collection; `expiration` enables per-entry `expireAt`.
    pub fn create_collection(&self, name: &str, expiration: bool) -> Result<Output<E, bool>> {
        let request = Request::post(format!("/_api/kv/{}", name)).with_param("expiration", expiration);
        self.execute(request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::KvCollectionCreate, &resp));
            }
            Ok(true)
        })
    }

    pub fn delete_collection(&self, name: &str) -> Result<Output<E, bool>> {
        self.execute(Request::delete(format!("/_api/kv/{}", name)), |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::KvCollectionDelete, &resp));
            }
            Ok(true)
        })
    }

    /// Upsert entries; returns the server's per-entry metadata.
    pub fn insert(&self, collection: &str, pairs: &[KvPair]) -> Result<Output<E, Value>> {
        let request = Request::put(format!("/_api/kv/{}/value", collection)).with_body(pairs)?;
        self.execute(request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::KvInsert, &resp));
            }
            Ok(resp.body().clone())
        })
    }

    /// Value stored under `key`, or `None` when absent.
    pub fn get(&self, collection: &str, key: &str) -> Result<Output<E, Option<Value>>> {
        let request = Request::get(format!("/_api/kv/{}/value/{}", collection, key));
        self.execute(request, |resp| {
            if resp.status() == 404 {
                return Ok(None);
            }
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::KvGet, &resp));
            }
            Ok(Some(resp.body().get("value").cloned().unwrap_or(Value::Null)))
        })
    }

    pub fn remove(&self, collection: &str, key: &str) -> Result<Output<E, bool>> {
        let request = Request::delete(format!("/_api/kv/{}/value/{}", collection, key));
        self.execute(request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::KvRemove, &resp));
            }
            Ok(true)
        })
    }

    pub fn remove_many(&self, collection: &str, keys: &[&str]) -> Result<Output<E, bool>> {
        let request =
            Request::delete(format!("/_api/kv/{}/values", collection)).with_json_body(json!(keys));
        self.execute(request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::KvRemove, &resp));
            }
            Ok(true)
        })
    }

    pub fn count(&self, collection: &str) -> Result<Output<E, u64>> {
        let request = Request::get(format!("/_api/kv/{}/count", collection));
        self.execute(request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::KvCount, &resp));
            }
            Ok(resp.field::<u64>("count")?)
        })
    }

    /// A page of keys, in server order.
    pub fn keys(&self, collection: &str, offset: u64, limit: u64) -> Result<Output<E, Vec<String>>> {
        let request = Request::get(format!("/_api/kv/{}/keys", collection))
            .with_param("offset", offset)
            .with_param("limit", limit);
        self.execute(request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::KvKeys, &resp));
            }
            Ok(resp.field::<Vec<String>>("result")?)
        })
    }

    pub fn truncate(&self, collection: &str) -> Result<Output<E, bool>> {
        let request = Request::put(format!("/_api/kv/{}/truncate", collection));
        self.execute(request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::KvTruncate, &resp));
            }
            Ok(true)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Connection;
    use crate::executor::{AsyncExecutor, DefaultExecutor};
    use crate::http::mock::MockHttpClient;
    use crate::request::{Body, Method};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn kv(mock: &MockHttpClient) -> KeyValue<DefaultExecutor> {
        let conn = Connection::new("http://localhost", None, "_system", None, Arc::new(mock.clone()))
            .unwrap();
        KeyValue::new(DefaultExecutor::new(Arc::new(conn)))
    }

    #[test]
    fn lists_collections() {
        let mock = MockHttpClient::new().with_json(
            Method::GET,
            "/_fabric/_system/_api/kv",
            200,
            json!({"result": [{"name": "sessions", "expiration": true}, {"name": "cache"}]}),
        );
        let kv = kv(&mock);
        assert_eq!(kv.collections().unwrap(), vec!["sessions", "cache"]);
        assert!(kv.has_collection("cache").unwrap());
        assert!(!kv.has_collection("other").unwrap());
    }

    #[test]
    fn create_collection_sends_expiration_flag() {
        let mock = MockHttpClient::new().with_json(
            Method::POST,
            "/_fabric/_system/_api/kv/sessions",
            200,
            json!({"error": false}),
        );
        assert!(kv(&mock).create_collection("sessions", true).unwrap());
        let (_, request) = &mock.recorded_requests()[0];
        assert_eq!(request.params().get("expiration"), Some(&"true".to_string()));
    }

    #[test]
    fn insert_serializes_pairs() {
        let mock = MockHttpClient::new().with_json(
            Method::PUT,
            "/_fabric/_system/_api/kv/sessions/value",
            200,
            json!([{"_key": "s1"}]),
        );
        let pairs = [
            KvPair::new("s1", json!({"user": "alice"})).expiring_at(1_700_000_000),
            KvPair::new("s2", json!(7)),
        ];
        kv(&mock).insert("sessions", &pairs).unwrap();

        let (_, request) = &mock.recorded_requests()[0];
        assert_eq!(
            request.body(),
            Some(&Body::Json(json!([
                {"_key": "s1", "value": {"user": "alice"}, "expireAt": 1_700_000_000},
                {"_key": "s2", "value": 7},
            ])))
        );
    }

    #[test]
    fn get_returns_value_or_none() {
        let mock = MockHttpClient::new().with_json(
            Method::GET,
            "/_fabric/_system/_api/kv/sessions/value/s1",
            200,
            json!({"_key": "s1", "value": "token"}),
        );
        let kv = kv(&mock);
        assert_eq!(kv.get("sessions", "s1").unwrap(), Some(json!("token")));
        assert_eq!(kv.get("sessions", "missing").unwrap(), None);
    }

    #[test]
    fn count_keys_and_failures() {
        let mock = MockHttpClient::new()
            .with_json(Method::GET, "/_fabric/_system/_api/kv/cache/count", 200, json!({"count": 2}))
            .with_json(Method::GET, "/_fabric/_system/_api/kv/cache/keys", 200, json!({"result": ["a", "b"]}));
        let kv = kv(&mock);

        assert_eq!(kv.count("cache").unwrap(), 2);
        assert_eq!(kv.keys("cache", 0, 10).unwrap(), vec!["a", "b"]);
        assert_eq!(kv.truncate("cache").unwrap_err().kind(), Some(ErrorKind::KvTruncate));
        assert_eq!(kv.remove("cache", "a").unwrap_err().kind(), Some(ErrorKind::KvRemove));
    }

    #[test]
    fn remove_many_sends_keys() {
        let mock = MockHttpClient::new().with_json(
            Method::DELETE,
            "/_fabric/_system/_api/kv/cache/values",
            200,
            json!({}),
        );
        assert!(kv(&mock).remove_many("cache", &["a", "b"]).unwrap());
        let (_, request) = &mock.recorded_requests()[0];
        assert_eq!(request.body(), Some(&Body::Json(json!(["a", "b"]))));
    }

    #[test]
    fn works_under_async_executor() {
        let mut headers = BTreeMap::new();
        headers.insert("x-c8-async-id".to_string(), "9".to_string());
        let mock = MockHttpClient::new().with_response(
            Method::GET,
            "/_fabric/_system/_api/kv/cache/count",
            MockHttpClient::raw_response(202, headers, ""),
        );
        let conn = Connection::new("http://localhost", None, "_system", None, Arc::new(mock.clone()))
            .unwrap();
        let kv = KeyValue::new(AsyncExecutor::new(Arc::new(conn), true));

        let job = kv.count("cache").unwrap().unwrap();
        assert_eq!(job.id(), "9");
    }
}
