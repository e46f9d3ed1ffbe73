//! Plans and per-tenant billing.
//!
//! Plan management needs an admin login. Billing queries are scoped to one
//! tenant.

use serde_json::Value;

use crate::api::{ApiWrapper, Output};
use crate::error::{Error, ErrorKind, Result};
use crate::executor::Executor;
use crate::request::Request;

#[derive(Debug, Clone)]
pub struct Plans<E: Executor> {
    executor: E,
}

impl<E: Executor> ApiWrapper for Plans<E> {
    type Executor = E;

    fn executor(&self) -> &E {
        &self.executor
    }
}

impl<E: Executor> Plans<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub fn list(&self) -> Result<Output<E, Vec<Value>>> {
        self.execute(Request::get("/_api/plan"), |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::PlanList, &resp));
            }
            Ok(resp.json::<Vec<Value>>()?)
        })
    }

    pub fn get(&self, name: &str) -> Result<Output<E, Value>> {
        self.execute(Request::get(format!("/_api/plan/{}", name)), |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::PlanList, &resp));
            }
            Ok(resp.body().clone())
        })
    }

    pub fn create(&self, plan: &Value) -> Result<Output<E, Value>> {
        let request = Request::post("/_api/plan").with_json_body(plan.clone());
        self.execute(request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::PlanCreate, &resp));
            }
            Ok(resp.body().clone())
        })
    }

    pub fn update(&self, name: &str, plan: &Value) -> Result<Output<E, Value>> {
        let request = Request::put(format!("/_api/plan/{}", name)).with_json_body(plan.clone());
        self.execute(request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::PlanUpdate, &resp));
            }
            Ok(resp.body().clone())
        })
    }

    pub fn delete(&self, name: &str) -> Result<Output<E, bool>> {
        self.execute(Request::delete(format!("/_api/plan/{}", name)), |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::PlanDelete, &resp));
            }
            Ok(true)
        })
    }

    /// Move a tenant onto another plan.
    pub fn change_tenant_plan(&self, tenant: &str, plan: &str) -> Result<Output<E, bool>> {
        let request = Request::put(format!("/_api/tenant/{}/plan", tenant))
            .with_json_body(serde_json::json!({"plan": plan}));
        self.execute(request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::PlanUpdate, &resp));
            }
            Ok(true)
        })
    }
}

#[derive(Debug, Clone)]
pub struct Billing<E: Executor> {
    executor: E,
    tenant: String,
}

impl<E: Executor> ApiWrapper for Billing<E> {
    type Executor = E;

    fn executor(&self) -> &E {
        &self.executor
    }
}

impl<E: Executor> Billing<E> {
    pub fn new(executor: E, tenant: impl Into<String>) -> Self {
        Self {
            executor,
            tenant: tenant.into(),
        }
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    fn fetch(&self, endpoint: String, kind: ErrorKind) -> Result<Output<E, Value>> {
        self.execute(Request::get(endpoint), move |resp| {
            if !resp.is_success() {
                return Err(Error::server(kind, &resp));
            }
            Ok(resp.body().clone())
        })
    }

    /// Contact and payment details of the tenant's account.
    pub fn account(&self) -> Result<Output<E, Value>> {
        self.fetch(format!("/_api/billing/{}/account", self.tenant), ErrorKind::BillingAccount)
    }

    pub fn update_contact(&self, contact: &Value) -> Result<Output<E, bool>> {
        let request = Request::put(format!("/_api/billing/{}/contact", self.tenant))
            .with_json_body(contact.clone());
        self.execute(request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::BillingAccount, &resp));
            }
            Ok(true)
        })
    }

    /// Usage between two `YYYY-MM-DD` dates, inclusive.
    pub fn usage(&self, start_date: Option<&str>, end_date: Option<&str>) -> Result<Output<E, Value>> {
        let request = Request::get(format!("/_api/billing/{}/usage", self.tenant))
            .with_opt_param("startDate", start_date)
            .with_opt_param("endDate", end_date);
        self.execute(request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::BillingUsage, &resp));
            }
            Ok(resp.body().clone())
        })
    }

    /// The `limit` most recent invoices.
    pub fn invoices(&self, limit: Option<u32>) -> Result<Output<E, Value>> {
        let request = Request::get(format!("/_api/billing/{}/invoices", self.tenant))
            .with_opt_param("limit", limit);
        self.execute(request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::BillingInvoices, &resp));
            }
            Ok(resp.body().clone())
        })
    }

    pub fn current_invoice(&self) -> Result<Output<E, Value>> {
        self.fetch(
            format!("/_api/billing/{}/invoice/current", self.tenant),
            ErrorKind::BillingInvoices,
        )
    }
}
