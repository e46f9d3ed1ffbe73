//! Named graphs: vertex collections tied together by edge definitions.
//!
//! Graph management goes through the graph API. Vertex and edge writes also
//! carry a server-side command, so they can be queued in a transaction like
//! plain document writes.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::api::{ApiWrapper, Output};
use crate::error::{Error, ErrorKind, Result, DOCUMENT_NOT_FOUND};
use crate::executor::Executor;
use crate::request::Request;

/// Which edge collection connects which vertex collections.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EdgeDefinition {
    #[serde(rename = "collection")]
    pub edge_collection: String,
    #[serde(rename = "from")]
    pub from_collections: Vec<String>,
    #[serde(rename = "to")]
    pub to_collections: Vec<String>,
}

impl EdgeDefinition {
    pub fn new(edge_collection: impl Into<String>, from: &[&str], to: &[&str]) -> Self {
        Self {
            edge_collection: edge_collection.into(),
            from_collections: from.iter().map(|name| name.to_string()).collect(),
            to_collections: to.iter().map(|name| name.to_string()).collect(),
        }
    }
}

/// Summary returned by graph listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphInfo {
    #[serde(rename = "_key", alias = "name")]
    pub name: String,
    #[serde(rename = "edgeDefinitions", default)]
    pub edge_definitions: Vec<EdgeDefinition>,
    #[serde(rename = "orphanCollections", default)]
    pub orphan_collections: Vec<String>,
}

/// Edges to follow from a vertex.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EdgeDirection {
    #[default]
    Any,
    In,
    Out,
}

impl EdgeDirection {
    fn as_param(&self) -> Option<&'static str> {
        match self {
            EdgeDirection::Any => None,
            EdgeDirection::In => Some("in"),
            EdgeDirection::Out => Some("out"),
        }
    }

    fn command(&self) -> &'static str {
        match self {
            EdgeDirection::Any => "edges",
            EdgeDirection::In => "inEdges",
            EdgeDirection::Out => "outEdges",
        }
    }
}

fn quote(text: &str) -> String {
    Value::String(text.to_string()).to_string()
}

/// Split `collection/key`, rejecting ids without both halves.
fn split_id(id: &str) -> Result<(&str, &str)> {
    match id.split_once('/') {
        Some((collection, key)) if !collection.is_empty() && !key.is_empty() => Ok((collection, key)),
        _ => Err(Error::client(
            ErrorKind::DocumentParse,
            format!("bad document ID \"{}\"", id),
        )),
    }
}

/// A named graph in a fabric.
#[derive(Debug, Clone)]
pub struct Graph<E: Executor> {
    executor: E,
    name: String,
}

impl<E: Executor> ApiWrapper for Graph<E> {
    type Executor = E;

    fn executor(&self) -> &E {
        &self.executor
    }
}

impl<E: Executor> Graph<E> {
    pub fn new(executor: E, name: impl Into<String>) -> Self {
        Self {
            executor,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn path(&self, rest: &str) -> String {
        format!("/_api/graph/{}{}", self.name, rest)
    }

    pub fn properties(&self) -> Result<Output<E, GraphInfo>> {
        self.execute(Request::get(self.path("")), |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::GraphProperties, &resp));
            }
            Ok(resp.field::<GraphInfo>("graph")?)
        })
    }

    pub fn vertex_collections(&self) -> Result<Output<E, Vec<String>>> {
        self.execute(Request::get(self.path("/vertex")), |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::VertexCollectionList, &resp));
            }
            Ok(resp.field::<Vec<String>>("collections")?)
        })
    }

    /// Add a vertex collection outside any edge definition.
    pub fn create_vertex_collection(&self, collection: &str) -> Result<Output<E, bool>> {
        let request = Request::post(self.path("/vertex")).with_json_body(json!({"collection": collection}));
        self.execute(request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::VertexCollectionCreate, &resp));
            }
            Ok(true)
        })
    }

    /// Remove a vertex collection from the graph; `purge` also drops it.
    pub fn delete_vertex_collection(&self, collection: &str, purge: bool) -> Result<Output<E, bool>> {
        let request = Request::delete(self.path(&format!("/vertex/{}", collection)))
            .with_param("dropCollection", purge);
        self.execute(request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::VertexCollectionDelete, &resp));
            }
            Ok(true)
        })
    }

    /// Names of the graph's edge collections.
    pub fn edge_collections(&self) -> Result<Output<E, Vec<String>>> {
        self.execute(Request::get(self.path("/edge")), |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::EdgeDefinitionList, &resp));
            }
            Ok(resp.field::<Vec<String>>("collections")?)
        })
    }

    pub fn create_edge_definition(&self, definition: &EdgeDefinition) -> Result<Output<E, bool>> {
        let request = Request::post(self.path("/edge")).with_body(definition)?;
        self.execute(request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::EdgeDefinitionCreate, &resp));
            }
            Ok(true)
        })
    }

    pub fn delete_edge_definition(&self, collection: &str, purge: bool) -> Result<Output<E, bool>> {
        let request = Request::delete(self.path(&format!("/edge/{}", collection)))
            .with_param("dropCollections", purge);
        self.execute(request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::EdgeDefinitionDelete, &resp));
            }
            Ok(true)
        })
    }

    /// Insert a vertex and return its metadata.
    pub fn insert_vertex(&self, collection: &str, vertex: &Value) -> Result<Output<E, Value>> {
        let request = Request::post(self.path(&format!("/vertex/{}", collection)))
            .with_json_body(vertex.clone())
            .with_command(format!("db.{}.insert({})", collection, vertex))
            .with_write(collection);
        self.execute(request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::VertexInsert, &resp));
            }
            Ok(resp.body().get("vertex").cloned().unwrap_or(Value::Null))
        })
    }

    /// Fetch a vertex by `collection/key`. A missing vertex is `None`.
    pub fn vertex(&self, id: &str) -> Result<Output<E, Option<Value>>> {
        let (collection, _) = split_id(id)?;
        let request = Request::get(self.path(&format!("/vertex/{}", id)))
            .with_command(format!("db.{}.document({})", collection, quote(id)))
            .with_read(collection);
        self.execute(request, |resp| {
            if resp.is_not_found() || resp.error_code() == Some(DOCUMENT_NOT_FOUND) {
                return Ok(None);
            }
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::VertexGet, &resp));
            }
            Ok(resp.body().get("vertex").cloned())
        })
    }

    /// Delete a vertex and the edges touching it.
    pub fn delete_vertex(&self, id: &str, ignore_missing: bool) -> Result<Output<E, bool>> {
        let (collection, _) = split_id(id)?;
        let request = Request::delete(self.path(&format!("/vertex/{}", id)))
            .with_command(format!("db.{}.remove({})", collection, quote(id)))
            .with_write(collection);
        self.execute(request, move |resp| {
            if resp.error_code() == Some(DOCUMENT_NOT_FOUND) && ignore_missing {
                return Ok(false);
            }
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::VertexDelete, &resp));
            }
            Ok(true)
        })
    }

    /// Insert an edge. The body must carry `_from` and `_to`.
    pub fn insert_edge(&self, collection: &str, edge: &Value) -> Result<Output<E, Value>> {
        for field in ["_from", "_to"] {
            let endpoint = edge.get(field).and_then(Value::as_str).ok_or_else(|| {
                Error::client(ErrorKind::DocumentParse, format!("field \"{}\" required", field))
            })?;
            split_id(endpoint)?;
        }
        let request = Request::post(self.path(&format!("/edge/{}", collection)))
            .with_json_body(edge.clone())
            .with_command(format!("db.{}.insert({})", collection, edge))
            .with_write(collection);
        self.execute(request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::EdgeInsert, &resp));
            }
            Ok(resp.body().get("edge").cloned().unwrap_or(Value::Null))
        })
    }

    pub fn edge(&self, id: &str) -> Result<Output<E, Option<Value>>> {
        let (collection, _) = split_id(id)?;
        let request = Request::get(self.path(&format!("/edge/{}", id)))
            .with_command(format!("db.{}.document({})", collection, quote(id)))
            .with_read(collection);
        self.execute(request, |resp| {
            if resp.is_not_found() || resp.error_code() == Some(DOCUMENT_NOT_FOUND) {
                return Ok(None);
            }
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::EdgeGet, &resp));
            }
            Ok(resp.body().get("edge").cloned())
        })
    }

    pub fn delete_edge(&self, id: &str, ignore_missing: bool) -> Result<Output<E, bool>> {
        let (collection, _) = split_id(id)?;
        let request = Request::delete(self.path(&format!("/edge/{}", id)))
            .with_command(format!("db.{}.remove({})", collection, quote(id)))
            .with_write(collection);
        self.execute(request, move |resp| {
            if resp.error_code() == Some(DOCUMENT_NOT_FOUND) && ignore_missing {
                return Ok(false);
            }
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::EdgeDelete, &resp));
            }
            Ok(true)
        })
    }

    /// Edges of `collection` touching `vertex`.
    pub fn edges(
        &self,
        collection: &str,
        vertex: &str,
        direction: EdgeDirection,
    ) -> Result<Output<E, Vec<Value>>> {
        split_id(vertex)?;
        let request = Request::get(format!("/_api/edges/{}", collection))
            .with_param("vertex", vertex)
            .with_opt_param("direction", direction.as_param())
            .with_command(format!("db.{}.{}({})", collection, direction.command(), quote(vertex)))
            .with_read(collection);
        self.execute(request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::EdgeList, &resp));
            }
            Ok(resp.field::<Vec<Value>>("edges")?)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Connection;
    use crate::executor::{DefaultExecutor, TransactionExecutor, TransactionOptions};
    use crate::http::mock::MockHttpClient;
    use crate::request::{Body, Method};
    use std::sync::Arc;

    fn conn(mock: &MockHttpClient) -> Arc<Connection> {
        Arc::new(
            Connection::new("http://localhost", None, "_system", None, Arc::new(mock.clone()))
                .unwrap(),
        )
    }

    fn graph(mock: &MockHttpClient) -> Graph<DefaultExecutor> {
        Graph::new(DefaultExecutor::new(conn(mock)), "social")
    }

    #[test]
    fn reads_properties_and_collections() {
        let mock = MockHttpClient::new()
            .with_json(
                Method::GET,
                "/_fabric/_system/_api/graph/social",
                200,
                json!({"graph": {
                    "_key": "social",
                    "edgeDefinitions": [{"collection": "knows", "from": ["people"], "to": ["people"]}],
                    "orphanCollections": []
                }}),
            )
            .with_json(
                Method::GET,
                "/_fabric/_system/_api/graph/social/vertex",
                200,
                json!({"collections": ["people"]}),
            )
            .with_json(
                Method::GET,
                "/_fabric/_system/_api/graph/social/edge",
                200,
                json!({"collections": ["knows"]}),
            );
        let graph = graph(&mock);

        let info = graph.properties().unwrap();
        assert_eq!(info.name, "social");
        assert_eq!(
            info.edge_definitions,
            vec![EdgeDefinition::new("knows", &["people"], &["people"])]
        );
        assert_eq!(graph.vertex_collections().unwrap(), vec!["people"]);
        assert_eq!(graph.edge_collections().unwrap(), vec!["knows"]);
    }

    #[test]
    fn manages_definitions() {
        let mock = MockHttpClient::new()
            .with_json(Method::POST, "/_fabric/_system/_api/graph/social/edge", 202, json!({}))
            .with_json(Method::DELETE, "/_fabric/_system/_api/graph/social/vertex/pets", 202, json!({}));
        let graph = graph(&mock);

        let definition = EdgeDefinition::new("owns", &["people"], &["pets"]);
        assert!(graph.create_edge_definition(&definition).unwrap());
        assert!(graph.delete_vertex_collection("pets", true).unwrap());
        assert_eq!(
            graph.delete_edge_definition("owns", false).unwrap_err().kind(),
            Some(ErrorKind::EdgeDefinitionDelete)
        );

        let requests = mock.recorded_requests();
        assert_eq!(
            requests[0].1.body(),
            Some(&Body::Json(json!({"collection": "owns", "from": ["people"], "to": ["pets"]})))
        );
        assert_eq!(requests[1].1.params().get("dropCollection"), Some(&"true".to_string()));
    }

    #[test]
    fn vertex_round_trip() {
        let mock = MockHttpClient::new()
            .with_json(
                Method::POST,
                "/_fabric/_system/_api/graph/social/vertex/people",
                202,
                json!({"vertex": {"_id": "people/ada", "_key": "ada"}}),
            )
            .with_json(
                Method::GET,
                "/_fabric/_system/_api/graph/social/vertex/people/ada",
                200,
                json!({"vertex": {"_id": "people/ada", "name": "Ada"}}),
            );
        let graph = graph(&mock);

        let meta = graph.insert_vertex("people", &json!({"_key": "ada", "name": "Ada"})).unwrap();
        assert_eq!(meta["_id"], "people/ada");
        assert_eq!(graph.vertex("people/ada").unwrap().unwrap()["name"], "Ada");
        assert_eq!(graph.vertex("people/bob").unwrap(), None);
        assert_eq!(graph.vertex("ada").unwrap_err().kind(), Some(ErrorKind::DocumentParse));
    }

    #[test]
    fn edge_needs_endpoints() {
        let mock = MockHttpClient::new();
        let graph = graph(&mock);

        let err = graph.insert_edge("knows", &json!({"_from": "people/ada"})).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::DocumentParse));
        assert!(err.to_string().contains("_to"));
        assert_eq!(mock.request_count(), 0);
    }

    #[test]
    fn lists_edges_by_direction() {
        let mock = MockHttpClient::new().with_json(
            Method::GET,
            "/_fabric/_system/_api/edges/knows",
            200,
            json!({"edges": [{"_from": "people/ada", "_to": "people/bob"}]}),
        );
        let edges = graph(&mock).edges("knows", "people/ada", EdgeDirection::Out).unwrap();
        assert_eq!(edges.len(), 1);

        let (_, request) = &mock.recorded_requests()[0];
        assert_eq!(request.params().get("vertex"), Some(&"people/ada".to_string()));
        assert_eq!(request.params().get("direction"), Some(&"out".to_string()));
    }

    #[test]
    fn graph_writes_join_transactions() {
        let mock = MockHttpClient::new();
        let executor = TransactionExecutor::new(conn(&mock), TransactionOptions::default());
        let graph = Graph::new(executor.clone(), "social");

        graph
            .insert_edge("knows", &json!({"_from": "people/ada", "_to": "people/bob"}))
            .unwrap();
        graph.delete_vertex("people/bob", true).unwrap();
        assert_eq!(executor.queue_size(), 2);
        assert_eq!(mock.request_count(), 0);

        let reply = json!({"error": false, "result": {}});
        let mock = mock.with_json(Method::POST, "/_fabric/_system/_api/transaction", 200, reply);
        executor.commit().unwrap();

        let (_, request) = &mock.recorded_requests()[0];
        let body = match request.body() {
            Some(Body::Json(body)) => body.clone(),
            other => panic!("unexpected body {:?}", other),
        };
        assert_eq!(body["collections"]["write"], json!(["knows", "people"]));
        let action = body["action"].as_str().unwrap();
        assert!(action.contains("db.knows.insert({\"_from\":\"people/ada\",\"_to\":\"people/bob\"})"));
        assert!(action.contains("db.people.remove(\"people/bob\")"));
    }
}
