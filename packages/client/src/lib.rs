//! # c8-client
//!
//! Blocking client for a multi-model, geo-distributed database service.
//!
//! Every operation is written once, on a wrapper generic over an
//! [`Executor`]. The executor decides whether the request is sent now, run in
//! the background by the server, queued into a multipart batch, or folded into
//! a server-side transaction.
//!
//! ## Default execution
//!
//! ```ignore
//! use c8_client::{C8Client, ClientConfig, WriteOptions};
//! use serde_json::json;
//!
//! let config = ClientConfig::new("https://gdn.example.com")
//!     .with_password("ops@acme.io", "secret");
//! let client = C8Client::new(config)?;
//! let fabric = client.fabric("sales")?;
//!
//! let users = fabric.collection("users");
//! let meta = users.insert(&json!({"_key": "alice"}), &WriteOptions::default())?;
//! ```
//!
//! ## Async execution
//!
//! Requests return immediately; results are polled from the server:
//!
//! ```ignore
//! let async_fabric = fabric.begin_async_execution(true);
//! let job = async_fabric.collection("users").count()?.expect("job");
//! let count = job.wait(Duration::from_millis(100))?;
//! ```
//!
//! ## Batch execution
//!
//! Requests are queued and sent as one multipart request:
//!
//! ```ignore
//! let batch = fabric.begin_batch_execution(true);
//! let a = batch.collection("users").get("alice")?.expect("job");
//! let b = batch.kv().count("sessions")?.expect("job");
//! batch.commit()?;
//! let (alice, sessions) = (a.result()?, b.result()?);
//! ```
//!
//! ## Transactions
//!
//! Document operations are compiled into one server-side transaction:
//!
//! ```ignore
//! let txn = fabric.begin_transaction(TransactionOptions { return_result: true, ..Default::default() });
//! let job = txn.collection("users").insert(&json!({"_key": "bob"}), &WriteOptions::default())?;
//! txn.commit()?;
//! ```
//!
//! Graph vertex and edge writes join transactions the same way:
//!
//! ```ignore
//! let social = txn.graph("social");
//! social.insert_edge("knows", &json!({"_from": "people/ada", "_to": "people/bob"}))?;
//! txn.commit()?;
//! ```

pub mod api;
pub mod billing;
pub mod client;
pub mod collection;
pub mod config;
pub mod connection;
pub mod cursor;
pub mod error;
pub mod executor;
pub mod fabric;
pub mod function;
pub mod graph;
pub mod http;
pub mod job;
pub mod kv;
pub mod multipart;
pub mod redis;
pub mod request;
pub mod response;
pub mod restql;
pub mod search;
pub mod stream;
pub mod tenant;
pub mod user;

// Re-export main types
pub use api::{ApiWrapper, Output};
pub use billing::{Billing, Plans};
pub use client::C8Client;
pub use collection::{
    Collection, CollectionInfo, CollectionType, CreateCollectionOptions, DocumentRef, WriteOptions,
};
pub use config::{ClientConfig, Credentials};
pub use connection::Connection;
pub use cursor::{Cursor, QueryOptions};
pub use error::{Error, ErrorKind, Result, ServerError};
pub use executor::{
    AsyncExecutor, BatchExecutor, Context, DefaultExecutor, Executor, TransactionExecutor,
    TransactionOptions,
};
pub use fabric::{DatacenterInfo, Fabric, FabricInfo, JobFilter};
pub use function::Functions;
pub use graph::{EdgeDefinition, EdgeDirection, Graph, GraphInfo};
pub use crate::http::{HttpClient, ReqwestClient};
pub use job::{AsyncJob, BatchJob, JobStatus, TransactionJob};
pub use kv::{KeyValue, KvPair};
pub use redis::Redis;
pub use request::{Body, Method, Request};
pub use response::Response;
pub use restql::RestQl;
pub use search::Search;
pub use stream::{producer_frame, StreamInfo, StreamMessage, StreamTopic, Streams};
pub use tenant::Tenants;
pub use user::{Permission, UserInfo, Users};
