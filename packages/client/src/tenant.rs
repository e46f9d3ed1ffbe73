//! Tenant administration. These endpoints need a `_mm` (admin) login.

use serde_json::{json, Value};

use crate::api::{ApiWrapper, Output};
use crate::error::{Error, ErrorKind, Result};
use crate::executor::Executor;
use crate::request::Request;

#[derive(Debug, Clone)]
pub struct Tenants<E: Executor> {
    executor: E,
}

impl<E: Executor> ApiWrapper for Tenants<E> {
    type Executor = E;

    fn executor(&self) -> &E {
        &self.executor
    }
}

impl<E: Executor> Tenants<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub fn list(&self) -> Result<Output<E, Vec<Value>>> {
        self.execute(Request::get("/_api/tenants"), |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::TenantList, &resp));
            }
            Ok(resp.field::<Vec<Value>>("result")?)
        })
    }

    /// Create a tenant whose fabrics may span `dc_list`.
    pub fn create(&self, name: &str, password: &str, dc_list: &[&str]) -> Result<Output<E, Value>> {
        let request = Request::post("/_api/tenant").with_json_body(json!({
            "name": name,
            "passwd": password,
            "dcList": dc_list.join(","),
        }));
        self.execute(request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::TenantCreate, &resp));
            }
            Ok(resp.body().get("result").cloned().unwrap_or(Value::Null))
        })
    }

    pub fn details(&self, name: &str) -> Result<Output<E, Value>> {
        self.execute(Request::get(format!("/_api/tenant/{}", name)), |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::TenantDetails, &resp));
            }
            Ok(resp.body().get("result").cloned().unwrap_or(Value::Null))
        })
    }

    pub fn delete(&self, name: &str, ignore_missing: bool) -> Result<Output<E, bool>> {
        let request = Request::delete(format!("/_api/tenant/{}", name));
        self.execute(request, move |resp| {
            if resp.is_not_found() && ignore_missing {
                return Ok(false);
            }
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::TenantDelete, &resp));
            }
            Ok(true)
        })
    }
}
