//! Full-text search: search views, analyzers and per-collection search
//! flags.

use serde_json::{json, Value};

use crate::api::{ApiWrapper, Output};
use crate::error::{Error, ErrorKind, Result};
use crate::executor::Executor;
use crate::request::Request;

#[derive(Debug, Clone)]
pub struct Search<E: Executor> {
    executor: E,
}

impl<E: Executor> ApiWrapper for Search<E> {
    type Executor = E;

    fn executor(&self) -> &E {
        &self.executor
    }
}

impl<E: Executor> Search<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    /// Enable or disable search on one attribute of a collection.
    pub fn set_search(&self, collection: &str, enable: bool, field: &str) -> Result<Output<E, bool>> {
        let request = Request::post("/_api/search")
            .with_param("collection", collection)
            .with_param("enable", enable)
            .with_param("field", field);
        self.execute(request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::SearchSet, &resp));
            }
            Ok(true)
        })
    }

    pub fn views(&self) -> Result<Output<E, Vec<Value>>> {
        self.execute(Request::get("/_api/search/view"), |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::ViewList, &resp));
            }
            Ok(resp.field::<Vec<Value>>("result")?)
        })
    }

    /// Create a search view; `links` maps collection names to link settings.
    pub fn create_view(&self, name: &str, links: &Value, primary_sort: &[Value]) -> Result<Output<E, Value>> {
        let request = Request::post("/_api/search/view").with_json_body(json!({
            "name": name,
            "type": "search",
            "links": links,
            "primarySort": primary_sort,
        }));
        self.execute(request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::ViewCreate, &resp));
            }
            Ok(resp.body().clone())
        })
    }

    pub fn view_properties(&self, name: &str) -> Result<Output<E, Value>> {
        let request = Request::get(format!("/_api/search/view/{}/properties", name));
        self.execute(request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::ViewProperties, &resp));
            }
            Ok(resp.body().clone())
        })
    }

    /// Merge `properties` into the view's current settings.
    pub fn update_view(&self, name: &str, properties: &Value) -> Result<Output<E, Value>> {
        let request = Request::patch(format!("/_api/search/view/{}/properties", name))
            .with_json_body(properties.clone());
        self.execute(request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::ViewUpdate, &resp));
            }
            Ok(resp.body().clone())
        })
    }

    pub fn rename_view(&self, name: &str, new_name: &str) -> Result<Output<E, bool>> {
        let request = Request::put(format!("/_api/search/view/{}/rename", name))
            .with_json_body(json!({"name": new_name}));
        self.execute(request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::ViewUpdate, &resp));
            }
            Ok(true)
        })
    }

    pub fn delete_view(&self, name: &str, ignore_missing: bool) -> Result<Output<E, bool>> {
        let request = Request::delete(format!("/_api/search/view/{}", name));
        self.execute(request, move |resp| {
            if resp.is_not_found() && ignore_missing {
                return Ok(false);
            }
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::ViewDelete, &resp));
            }
            Ok(true)
        })
    }

    pub fn analyzers(&self) -> Result<Output<E, Vec<Value>>> {
        self.execute(Request::get("/_api/search/analyzer"), |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::AnalyzerList, &resp));
            }
            Ok(resp.field::<Vec<Value>>("result")?)
        })
    }

    pub fn analyzer(&self, name: &str) -> Result<Output<E, Value>> {
        let request = Request::get(format!("/_api/search/analyzer/{}", name));
        self.execute(request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::AnalyzerList, &resp));
            }
            Ok(resp.body().clone())
        })
    }
}
