//! Fabrics: the logical databases of a tenant.
//!
//! A [`Fabric`] is the entry point for everything scoped to one fabric. Its
//! executor decides how operations run; on a default-context fabric,
//! [`Fabric::begin_batch_execution`] and friends hand out fabrics bound to the
//! other contexts over the same connection.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::api::{ApiWrapper, Output};
use crate::billing::{Billing, Plans};
use crate::collection::{Collection, CollectionInfo, CreateCollectionOptions};
use crate::cursor::{Cursor, QueryOptions};
use crate::error::{Error, ErrorKind, Result, COLLECTION_NOT_FOUND};
use crate::executor::{
    AsyncExecutor, BatchExecutor, DefaultExecutor, Executor, TransactionExecutor,
    TransactionOptions,
};
use crate::function::Functions;
use crate::graph::{EdgeDefinition, Graph, GraphInfo};
use crate::kv::KeyValue;
use crate::redis::Redis;
use crate::request::Request;
use crate::restql::RestQl;
use crate::search::Search;
use crate::stream::Streams;
use crate::tenant::Tenants;
use crate::user::Users;

/// Properties of the current fabric.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FabricInfo {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub path: String,
    #[serde(rename = "isSystem", default)]
    pub system: bool,
}

/// A datacenter the tenant's fabrics can span.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatacenterInfo {
    #[serde(rename = "_key", alias = "name")]
    pub name: String,
    #[serde(default)]
    pub local: bool,
    #[serde(default)]
    pub tags: Value,
    #[serde(rename = "locationInfo", default)]
    pub location: Value,
}

/// Which server-side async jobs to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobFilter {
    Pending,
    Done,
}

impl JobFilter {
    fn as_str(&self) -> &'static str {
        match self {
            JobFilter::Pending => "pending",
            JobFilter::Done => "done",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Fabric<E: Executor> {
    executor: E,
}

impl<E: Executor> ApiWrapper for Fabric<E> {
    type Executor = E;

    fn executor(&self) -> &E {
        &self.executor
    }
}

fn names_of(body: &Value) -> Vec<String> {
    body.get("result")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().or_else(|| item.get("name")?.as_str()))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

impl<E: Executor> Fabric<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub fn name(&self) -> &str {
        self.connection().fabric()
    }

    pub fn properties(&self) -> Result<Output<E, FabricInfo>> {
        self.execute(Request::get("/_api/database/current"), |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::FabricProperties, &resp));
            }
            Ok(resp.field::<FabricInfo>("result")?)
        })
    }

    /// Names of the fabrics visible to the current user.
    pub fn fabrics(&self) -> Result<Output<E, Vec<String>>> {
        self.execute(Request::get("/_api/database"), |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::FabricList, &resp));
            }
            Ok(names_of(resp.body()))
        })
    }

    pub fn has_fabric(&self, name: &str) -> Result<Output<E, bool>> {
        let name = name.to_string();
        self.execute(Request::get("/_api/database"), move |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::FabricList, &resp));
            }
            Ok(names_of(resp.body()).contains(&name))
        })
    }

    /// Create a fabric spanning the given datacenters.
    pub fn create_fabric(&self, name: &str, dc_list: &[&str]) -> Result<Output<E, bool>> {
        let request = Request::post("/_api/database").with_json_body(json!({
            "name": name,
            "options": {"dcList": dc_list.join(",")},
        }));
        self.execute(request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::FabricCreate, &resp));
            }
            Ok(true)
        })
    }

    pub fn delete_fabric(&self, name: &str, ignore_missing: bool) -> Result<Output<E, bool>> {
        let request = Request::delete(format!("/_api/database/{}", name));
        self.execute(request, move |resp| {
            if resp.is_not_found() && ignore_missing {
                return Ok(false);
            }
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::FabricDelete, &resp));
            }
            Ok(true)
        })
    }

    pub fn collections(&self) -> Result<Output<E, Vec<CollectionInfo>>> {
        self.execute(Request::get("/_api/collection"), |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::CollectionList, &resp));
            }
            Ok(resp.field::<Vec<CollectionInfo>>("result")?)
        })
    }

    pub fn has_collection(&self, name: &str) -> Result<Output<E, bool>> {
        let request = Request::get(format!("/_api/collection/{}", name))
            .with_command(format!("db._collection({}) !== null", Value::from(name)));
        self.execute(request, |resp| {
            if resp.is_not_found() || resp.error_code() == Some(COLLECTION_NOT_FOUND) {
                return Ok(false);
            }
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::CollectionList, &resp));
            }
            Ok(true)
        })
    }

    /// Create a collection and return a wrapper for it bound to this
    /// fabric's executor.
    pub fn create_collection(
        &self,
        name: &str,
        options: &CreateCollectionOptions,
    ) -> Result<Output<E, Collection<E>>> {
        let request = Request::post("/_api/collection").with_json_body(options.to_body(name));
        let collection = self.collection(name);
        self.execute(request, move |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::CollectionCreate, &resp));
            }
            Ok(collection.clone())
        })
    }

    pub fn delete_collection(&self, name: &str, ignore_missing: bool) -> Result<Output<E, bool>> {
        let request = Request::delete(format!("/_api/collection/{}", name));
        self.execute(request, move |resp| {
            if resp.error_code() == Some(COLLECTION_NOT_FOUND) && ignore_missing {
                return Ok(false);
            }
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::CollectionDelete, &resp));
            }
            Ok(true)
        })
    }

    pub fn collection(&self, name: &str) -> Collection<E> {
        Collection::new(self.executor.clone(), name)
    }

    /// Run a C8QL query.
    pub fn c8ql(
        &self,
        query: &str,
        bind_vars: Option<&Value>,
        options: &QueryOptions,
    ) -> Result<Output<E, Cursor>> {
        let mut body = serde_json::to_value(options)?;
        body["query"] = Value::from(query);
        if let Some(vars) = bind_vars {
            body["bindVars"] = vars.clone();
        }
        let command = format!(
            "db._query({}, {}).toArray()",
            Value::from(query),
            bind_vars.cloned().unwrap_or_else(|| json!({}))
        );
        let request = Request::post("/_api/cursor")
            .with_json_body(body)
            .with_command(command);

        let conn = Arc::clone(self.connection());
        self.execute(request, move |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::QueryExecute, &resp));
            }
            Ok(Cursor::from_response(Arc::clone(&conn), &resp))
        })
    }

    pub fn kv(&self) -> KeyValue<E> {
        KeyValue::new(self.executor.clone())
    }

    pub fn restql(&self) -> RestQl<E> {
        RestQl::new(self.executor.clone())
    }

    pub fn streams(&self) -> Streams<E> {
        Streams::new(self.executor.clone())
    }

    pub fn tenants(&self) -> Tenants<E> {
        Tenants::new(self.executor.clone())
    }

    pub fn graphs(&self) -> Result<Output<E, Vec<GraphInfo>>> {
        self.execute(Request::get("/_api/graph"), |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::GraphList, &resp));
            }
            Ok(resp.field::<Vec<GraphInfo>>("graphs")?)
        })
    }

    pub fn has_graph(&self, name: &str) -> Result<Output<E, bool>> {
        let name = name.to_string();
        self.execute(Request::get("/_api/graph"), move |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::GraphList, &resp));
            }
            let graphs = resp.field::<Vec<GraphInfo>>("graphs")?;
            Ok(graphs.iter().any(|graph| graph.name == name))
        })
    }

    /// Create a graph and return a wrapper for it bound to this fabric's
    /// executor.
    pub fn create_graph(
        &self,
        name: &str,
        edge_definitions: &[EdgeDefinition],
        orphan_collections: &[&str],
    ) -> Result<Output<E, Graph<E>>> {
        let request = Request::post("/_api/graph").with_json_body(json!({
            "name": name,
            "edgeDefinitions": edge_definitions,
            "orphanCollections": orphan_collections,
        }));
        let graph = self.graph(name);
        self.execute(request, move |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::GraphCreate, &resp));
            }
            Ok(graph.clone())
        })
    }

    /// Delete a graph; `drop_collections` also drops its collections.
    pub fn delete_graph(
        &self,
        name: &str,
        drop_collections: bool,
        ignore_missing: bool,
    ) -> Result<Output<E, bool>> {
        let request = Request::delete(format!("/_api/graph/{}", name))
            .with_param("dropCollections", drop_collections);
        self.execute(request, move |resp| {
            if resp.is_not_found() && ignore_missing {
                return Ok(false);
            }
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::GraphDelete, &resp));
            }
            Ok(true)
        })
    }

    pub fn graph(&self, name: &str) -> Graph<E> {
        Graph::new(self.executor.clone(), name)
    }

    /// Redis-compatible commands against the key-value collection `collection`.
    pub fn redis(&self, collection: &str) -> Redis<E> {
        Redis::new(self.executor.clone(), collection)
    }

    pub fn search(&self) -> Search<E> {
        Search::new(self.executor.clone())
    }

    pub fn users(&self) -> Users<E> {
        Users::new(self.executor.clone())
    }

    pub fn functions(&self) -> Functions<E> {
        Functions::new(self.executor.clone())
    }

    pub fn plans(&self) -> Plans<E> {
        Plans::new(self.executor.clone())
    }

    pub fn billing(&self, tenant: &str) -> Billing<E> {
        Billing::new(self.executor.clone(), tenant)
    }

    pub fn datacenters(&self) -> Result<Output<E, Vec<DatacenterInfo>>> {
        self.execute(Request::get("/_api/datacenter/all"), |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::DatacenterList, &resp));
            }
            Ok(resp.json::<Vec<DatacenterInfo>>()?)
        })
    }

    /// The datacenter serving this connection.
    pub fn local_datacenter(&self) -> Result<Output<E, DatacenterInfo>> {
        self.execute(Request::get("/_api/datacenter/local"), |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::DatacenterList, &resp));
            }
            Ok(resp.json::<DatacenterInfo>()?)
        })
    }

    /// IDs of server-side async jobs, newest first, at most `count`.
    pub fn async_jobs(
        &self,
        filter: JobFilter,
        count: Option<u32>,
    ) -> Result<Output<E, Vec<String>>> {
        let request =
            Request::get(format!("/_api/job/{}", filter.as_str())).with_opt_param("count", count);
        self.execute(request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::AsyncJobList, &resp));
            }
            Ok(resp.json::<Vec<String>>()?)
        })
    }

    /// Drop stored async job results: all of them, or only those older
    /// than the Unix timestamp `threshold`.
    pub fn clear_async_jobs(&self, threshold: Option<u64>) -> Result<Output<E, bool>> {
        let request = match threshold {
            Some(stamp) => Request::delete("/_api/job/expired").with_param("stamp", stamp),
            None => Request::delete("/_api/job/all"),
        };
        self.execute(request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::AsyncJobClear, &resp));
            }
            Ok(true)
        })
    }
}

impl Fabric<DefaultExecutor> {
    /// A fabric whose operations run in the background on the server.
    pub fn begin_async_execution(&self, return_result: bool) -> Fabric<AsyncExecutor> {
        Fabric::new(AsyncExecutor::new(Arc::clone(self.connection()), return_result))
    }

    /// A fabric whose operations are queued until [`Fabric::commit`].
    pub fn begin_batch_execution(&self, return_result: bool) -> Fabric<BatchExecutor> {
        Fabric::new(BatchExecutor::new(Arc::clone(self.connection()), return_result))
    }

    /// A fabric whose operations run as one server transaction on
    /// [`Fabric::commit`].
    pub fn begin_transaction(&self, options: TransactionOptions) -> Fabric<TransactionExecutor> {
        Fabric::new(TransactionExecutor::new(Arc::clone(self.connection()), options))
    }
}

impl Fabric<BatchExecutor> {
    pub fn commit(&self) -> Result<()> {
        self.executor.commit()
    }

    pub fn queue_size(&self) -> usize {
        self.executor.queue_size()
    }
}

impl Fabric<TransactionExecutor> {
    pub fn commit(&self) -> Result<()> {
        self.executor.commit()
    }

    pub fn queue_size(&self) -> usize {
        self.executor.queue_size()
    }
}
