//! Saved queries (RESTQL).

use serde_json::{json, Value};

use crate::api::{ApiWrapper, Output};
use crate::error::{Error, ErrorKind, Result};
use crate::executor::Executor;
use crate::request::Request;

/// Saved C8QL queries of a fabric, callable by name.
///
/// [`RestQl::execute`] shadows [`ApiWrapper::execute`], so the methods here
/// name the trait explicitly.
#[derive(Debug, Clone)]
pub struct RestQl<E: Executor> {
    executor: E,
}

impl<E: Executor> ApiWrapper for RestQl<E> {
    type Executor = E;

    fn executor(&self) -> &E {
        &self.executor
    }
}

impl<E: Executor> RestQl<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    /// Save `value` as a query called `name`.
    pub fn create(&self, name: &str, value: &str, parameters: Option<&Value>) -> Result<Output<E, Value>> {
        let request = Request::post("/_api/restql").with_json_body(json!({
            "query": {
                "name": name,
                "value": value,
                "parameter": parameters.cloned().unwrap_or_else(|| json!({})),
            }
        }));
        ApiWrapper::execute(self, request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::RestqlCreate, &resp));
            }
            Ok(resp.body().get("result").cloned().unwrap_or(Value::Null))
        })
    }

    /// Saved queries owned by the current user.
    pub fn list(&self) -> Result<Output<E, Vec<Value>>> {
        ApiWrapper::execute(self, Request::get("/_api/restql/user"), |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::RestqlList, &resp));
            }
            Ok(resp.field::<Vec<Value>>("result")?)
        })
    }

    /// Run a saved query. The reply carries the first batch and, when more
    /// results remain, an `id` to pass to [`RestQl::fetch`].
    pub fn execute(
        &self,
        name: &str,
        bind_vars: Option<&Value>,
        batch_size: Option<u32>,
    ) -> Result<Output<E, Value>> {
        let mut body = json!({
            "bindVars": bind_vars.cloned().unwrap_or_else(|| json!({})),
        });
        if let Some(size) = batch_size {
            body["batchSize"] = json!(size);
        }
        let request = Request::post(format!("/_api/restql/execute/{}", name)).with_json_body(body);
        ApiWrapper::execute(self, request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::RestqlExecute, &resp));
            }
            Ok(resp.body().clone())
        })
    }

    /// Next batch of a saved-query cursor.
    pub fn fetch(&self, cursor_id: &str) -> Result<Output<E, Value>> {
        let request = Request::put(format!("/_api/restql/fetch/{}", cursor_id));
        ApiWrapper::execute(self, request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::RestqlFetch, &resp));
            }
            Ok(resp.body().clone())
        })
    }

    pub fn update(&self, name: &str, value: &str, parameters: Option<&Value>) -> Result<Output<E, Value>> {
        let request = Request::put(format!("/_api/restql/{}", name)).with_json_body(json!({
            "query": {
                "value": value,
                "parameter": parameters.cloned().unwrap_or_else(|| json!({})),
            }
        }));
        ApiWrapper::execute(self, request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::RestqlUpdate, &resp));
            }
            Ok(resp.body().get("result").cloned().unwrap_or(Value::Null))
        })
    }

    pub fn delete(&self, name: &str) -> Result<Output<E, bool>> {
        let request = Request::delete(format!("/_api/restql/{}", name));
        ApiWrapper::execute(self, request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::RestqlDelete, &resp));
            }
            Ok(true)
        })
    }
}
