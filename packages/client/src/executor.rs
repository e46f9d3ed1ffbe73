//! Execution contexts.
//!
//! Every wrapper operation builds a [`Request`] plus a response handler and
//! passes both to an [`Executor`]. The executor decides when the request is
//! sent and what the caller gets back:
//!
//! | Executor | Sent | `Output<T>` |
//! |---|---|---|
//! | [`DefaultExecutor`] | now | `T` |
//! | [`AsyncExecutor`] | now, executed later by the server | `Option<AsyncJob<T>>` |
//! | [`BatchExecutor`] | on `commit()`, as one multipart request | `Option<BatchJob<T>>` |
//! | [`TransactionExecutor`] | on `commit()`, as one server transaction | `Option<TransactionJob>` |

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::connection::Connection;
use crate::error::{Error, ErrorKind, Result};
use crate::job::{
    new_job_id, AsyncJob, BatchJob, OutcomeSlot, PartOutcome, ResponseSlot, TransactionJob,
    TransactionOutcome, ASYNC_ID_HEADER,
};
use crate::multipart;
use crate::request::Request;
use crate::response::Response;

/// Request header asking the server to run a request in the background.
pub const ASYNC_HEADER: &str = "x-c8-async";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Context {
    Default,
    Async,
    Batch,
    Transaction,
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Context::Default => "default",
            Context::Async => "async",
            Context::Batch => "batch",
            Context::Transaction => "transaction",
        };
        f.write_str(s)
    }
}

/// Strategy for dispatching requests.
///
/// Clones share state, so a wrapper and the sub-wrappers it hands out all
/// feed the same queue.
pub trait Executor: Clone + Send + Sync + 'static {
    /// What an operation returns under this executor.
    type Output<T>;

    fn context(&self) -> Context;

    fn connection(&self) -> &Arc<Connection>;

    fn execute<T, F>(&self, request: Request, handler: F) -> Result<Self::Output<T>>
    where
        T: 'static,
        F: Fn(Response) -> Result<T> + Send + Sync + 'static;
}

/// Executes requests immediately and returns the handler's result.
#[derive(Debug, Clone)]
pub struct DefaultExecutor {
    conn: Arc<Connection>,
}

impl DefaultExecutor {
    pub fn new(conn: Arc<Connection>) -> Self {
        Self { conn }
    }
}

impl Executor for DefaultExecutor {
    type Output<T> = T;

    fn context(&self) -> Context {
        Context::Default
    }

    fn connection(&self) -> &Arc<Connection> {
        &self.conn
    }

    fn execute<T, F>(&self, request: Request, handler: F) -> Result<T>
    where
        T: 'static,
        F: Fn(Response) -> Result<T> + Send + Sync + 'static,
    {
        let response = self.conn.send_request(&request)?;
        handler(response)
    }
}

/// Sends requests for background execution on the server.
///
/// With `return_result` the server stores each result and an [`AsyncJob`] is
/// returned to fetch it; without it the result is discarded and `None` is
/// returned.
#[derive(Debug, Clone)]
pub struct AsyncExecutor {
    conn: Arc<Connection>,
    return_result: bool,
}

impl AsyncExecutor {
    pub fn new(conn: Arc<Connection>, return_result: bool) -> Self {
        Self {
            conn,
            return_result,
        }
    }

    pub fn return_result(&self) -> bool {
        self.return_result
    }
}

impl Executor for AsyncExecutor {
    type Output<T> = Option<AsyncJob<T>>;

    fn context(&self) -> Context {
        Context::Async
    }

    fn connection(&self) -> &Arc<Connection> {
        &self.conn
    }

    fn execute<T, F>(&self, request: Request, handler: F) -> Result<Option<AsyncJob<T>>>
    where
        T: 'static,
        F: Fn(Response) -> Result<T> + Send + Sync + 'static,
    {
        let mode = if self.return_result { "store" } else { "true" };
        let request = request.with_header(ASYNC_HEADER, mode);

        let response = self.conn.send_request(&request)?;
        if !response.is_success() {
            return Err(Error::server(ErrorKind::AsyncExecute, &response));
        }
        if !self.return_result {
            return Ok(None);
        }

        let job_id = response.header(ASYNC_ID_HEADER).ok_or_else(|| {
            Error::state(
                ErrorKind::AsyncExecute,
                format!("response to {} carries no {} header", request.endpoint(), ASYNC_ID_HEADER),
            )
        })?;

        Ok(Some(AsyncJob::new(
            job_id.to_string(),
            Arc::clone(&self.conn),
            Arc::new(handler),
        )))
    }
}

struct QueuedRequest {
    id: String,
    request: Request,
    slot: ResponseSlot,
}

#[derive(Default)]
struct BatchQueue {
    queue: Vec<QueuedRequest>,
    committed: bool,
}

/// Queues requests and sends them together on [`commit`](Self::commit).
///
/// The executor is single-use: after a commit, further `execute` or
/// `commit` calls fail with a `BatchState` error.
#[derive(Clone)]
pub struct BatchExecutor {
    conn: Arc<Connection>,
    return_result: bool,
    state: Arc<Mutex<BatchQueue>>,
}

impl BatchExecutor {
    pub fn new(conn: Arc<Connection>, return_result: bool) -> Self {
        Self {
            conn,
            return_result,
            state: Arc::new(Mutex::new(BatchQueue::default())),
        }
    }

    pub fn queue_size(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_committed(&self) -> bool {
        self.lock().committed
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BatchQueue> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Send every queued request in one multipart request and hand each
    /// job its part of the response.
    ///
    /// Slots are filled only once the whole response has been checked. Any
    /// failure marks every queued job `Failed`.
    pub fn commit(&self) -> Result<()> {
        let mut state = self.lock();
        if state.committed {
            return Err(Error::state(ErrorKind::BatchState, "batch already committed"));
        }
        state.committed = true;

        if state.queue.is_empty() {
            return Ok(());
        }

        debug!(parts = state.queue.len(), fabric = %self.conn.fabric(), "committing batch");

        match self.dispatch(&state.queue) {
            Ok(responses) => {
                for (queued, response) in state.queue.iter().zip(responses) {
                    *queued.slot.lock().unwrap_or_else(PoisonError::into_inner) =
                        PartOutcome::Done(response);
                }
                Ok(())
            }
            Err(err) => {
                for queued in &state.queue {
                    *queued.slot.lock().unwrap_or_else(PoisonError::into_inner) =
                        PartOutcome::Failed(err.to_string());
                }
                Err(err)
            }
        }
    }

    /// Send the batch and return one response per queued request, in queue
    /// order.
    fn dispatch(&self, queue: &[QueuedRequest]) -> Result<Vec<Response>> {
        let body = multipart::encode(
            queue
                .iter()
                .map(|queued| (queued.id.as_str(), &queued.request)),
        );
        let request = Request::post("/_api/batch")
            .with_header("Content-Type", multipart::content_type())
            .with_raw_body(body);

        let response = self.conn.send_request(&request)?;
        if !response.is_success() {
            return Err(Error::server(ErrorKind::BatchExecute, &response));
        }

        let parts = multipart::decode(response.raw_body())?;
        if parts.len() != queue.len() {
            warn!(
                expected = queue.len(),
                received = parts.len(),
                "batch response part count mismatch"
            );
            return Err(Error::state(
                ErrorKind::BatchState,
                format!(
                    "expecting {} parts in batch response but got {}",
                    queue.len(),
                    parts.len()
                ),
            ));
        }

        let mut slots: Vec<Option<Response>> = vec![None; queue.len()];
        for part in parts {
            let index = queue
                .iter()
                .position(|queued| queued.id == part.content_id)
                .ok_or_else(|| {
                    warn!(content_id = %part.content_id, "batch response part matches no job");
                    Error::state(
                        ErrorKind::BatchState,
                        format!("batch response part {} matches no queued job", part.content_id),
                    )
                })?;
            if slots[index].is_some() {
                warn!(content_id = %part.content_id, "duplicate batch response part");
                return Err(Error::state(
                    ErrorKind::BatchState,
                    format!("batch response carries part {} more than once", part.content_id),
                ));
            }

            let queued = &queue[index];
            let url = format!("{}{}", self.conn.url_prefix(), queued.request.endpoint());
            slots[index] = Some(part.into_response(queued.request.method(), url));
        }

        // Equal counts and no duplicates leave every slot filled.
        Ok(slots.into_iter().flatten().collect())
    }
}

impl fmt::Debug for BatchExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchExecutor")
            .field("return_result", &self.return_result)
            .field("queue_size", &self.queue_size())
            .field("committed", &self.is_committed())
            .finish()
    }
}

impl Executor for BatchExecutor {
    type Output<T> = Option<BatchJob<T>>;

    fn context(&self) -> Context {
        Context::Batch
    }

    fn connection(&self) -> &Arc<Connection> {
        &self.conn
    }

    fn execute<T, F>(&self, request: Request, handler: F) -> Result<Option<BatchJob<T>>>
    where
        T: 'static,
        F: Fn(Response) -> Result<T> + Send + Sync + 'static,
    {
        let mut state = self.lock();
        if state.committed {
            return Err(Error::state(ErrorKind::BatchState, "batch already committed"));
        }

        let job = BatchJob::new(new_job_id(), Arc::new(handler));
        state.queue.push(QueuedRequest {
            id: job.id().to_string(),
            request,
            slot: job.slot(),
        });

        Ok(self.return_result.then_some(job))
    }
}

/// Settings for a transaction context.
#[derive(Debug, Clone, Default)]
pub struct TransactionOptions {
    /// Collections locked for reading, beyond those the queued commands declare.
    pub read: Vec<String>,
    /// Collections locked for writing, beyond those the queued commands declare.
    pub write: Vec<String>,
    pub lock_timeout: Option<u64>,
    pub wait_for_sync: Option<bool>,
    pub return_result: bool,
}

struct QueuedCommand {
    id: String,
    command: String,
    request: Request,
    slot: OutcomeSlot,
}

#[derive(Default)]
struct TransactionQueue {
    queue: Vec<QueuedCommand>,
    committed: bool,
}

/// Queues server-side commands and runs them as one transaction on commit.
///
/// Only requests carrying a command can be queued. A failed transaction
/// marks every queued job as failed.
#[derive(Clone)]
pub struct TransactionExecutor {
    conn: Arc<Connection>,
    options: TransactionOptions,
    state: Arc<Mutex<TransactionQueue>>,
}

impl TransactionExecutor {
    pub fn new(conn: Arc<Connection>, options: TransactionOptions) -> Self {
        Self {
            conn,
            options,
            state: Arc::new(Mutex::new(TransactionQueue::default())),
        }
    }

    pub fn queue_size(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_committed(&self) -> bool {
        self.lock().committed
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TransactionQueue> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn build_action(queue: &[QueuedCommand]) -> String {
        let steps: String = queue
            .iter()
            .map(|queued| format!("_result[\"{}\"] = {}; ", queued.id, queued.command))
            .collect();
        format!(
            "function () {{ var db = require('internal').db; var _result = {{}}; {}return _result; }}",
            steps
        )
    }

    fn build_request(&self, queue: &[QueuedCommand]) -> Request {
        let mut read: BTreeSet<&str> = self.options.read.iter().map(String::as_str).collect();
        let mut write: BTreeSet<&str> = self.options.write.iter().map(String::as_str).collect();
        for queued in queue {
            read.extend(queued.request.read().iter().map(String::as_str));
            write.extend(queued.request.write().iter().map(String::as_str));
        }

        let mut data = json!({
            "collections": {"read": read, "write": write},
            "action": Self::build_action(queue),
        });
        if let Some(timeout) = self.options.lock_timeout {
            data["lockTimeout"] = json!(timeout);
        }
        if let Some(sync) = self.options.wait_for_sync {
            data["waitForSync"] = json!(sync);
        }

        Request::post("/_api/transaction").with_json_body(data)
    }

    fn abort(queue: &[QueuedCommand], err: Error) -> Result<()> {
        warn!(commands = queue.len(), error = %err, "transaction failed");
        for queued in queue {
            *queued.slot.lock().unwrap_or_else(PoisonError::into_inner) =
                TransactionOutcome::Failed(err.to_string());
        }
        Err(err)
    }

    /// Run every queued command in one server transaction.
    pub fn commit(&self) -> Result<()> {
        let mut state = self.lock();
        if state.committed {
            return Err(Error::state(
                ErrorKind::TransactionState,
                "transaction already committed",
            ));
        }
        state.committed = true;

        if state.queue.is_empty() {
            return Ok(());
        }

        debug!(commands = state.queue.len(), fabric = %self.conn.fabric(), "committing transaction");

        let request = self.build_request(&state.queue);
        let response = match self.conn.send_request(&request) {
            Ok(response) if response.is_success() => response,
            Ok(response) => {
                return Self::abort(&state.queue, Error::server(ErrorKind::TransactionExecute, &response))
            }
            Err(err) => return Self::abort(&state.queue, err),
        };

        let results = response.body().get("result").cloned().unwrap_or(Value::Null);
        for queued in &state.queue {
            let value = results.get(&queued.id).cloned().unwrap_or(Value::Null);
            *queued.slot.lock().unwrap_or_else(PoisonError::into_inner) =
                TransactionOutcome::Done(value);
        }

        Ok(())
    }
}

impl fmt::Debug for TransactionExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionExecutor")
            .field("options", &self.options)
            .field("queue_size", &self.queue_size())
            .field("committed", &self.is_committed())
            .finish()
    }
}

impl Executor for TransactionExecutor {
    type Output<T> = Option<TransactionJob>;

    fn context(&self) -> Context {
        Context::Transaction
    }

    fn connection(&self) -> &Arc<Connection> {
        &self.conn
    }

    fn execute<T, F>(&self, request: Request, _handler: F) -> Result<Option<TransactionJob>>
    where
        T: 'static,
        F: Fn(Response) -> Result<T> + Send + Sync + 'static,
    {
        let mut state = self.lock();
        if state.committed {
            return Err(Error::state(
                ErrorKind::TransactionState,
                "transaction already committed",
            ));
        }

        let command = request.command().map(str::to_string).ok_or_else(|| {
            Error::state(
                ErrorKind::TransactionState,
                format!(
                    "{} {} cannot run inside a transaction",
                    request.method(),
                    request.endpoint()
                ),
            )
        })?;

        let job = TransactionJob::new(new_job_id());
        state.queue.push(QueuedCommand {
            id: job.id().to_string(),
            command,
            request,
            slot: job.slot(),
        });

        Ok(self.options.return_result.then_some(job))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::mock::MockHttpClient;
    use crate::request::{Body, Method};
    use std::collections::BTreeMap;

    fn conn(mock: &MockHttpClient) -> Arc<Connection> {
        Arc::new(
            Connection::new("http://localhost", None, "_system", None, Arc::new(mock.clone()))
                .unwrap(),
        )
    }

    fn count_handler(resp: Response) -> Result<u64> {
        if !resp.is_success() {
            return Err(Error::server(ErrorKind::CollectionCount, &resp));
        }
        Ok(resp.field("count")?)
    }

    fn count_request() -> Request {
        Request::get("/_api/collection/users/count")
            .with_command("db.users.count()")
            .with_read("users")
    }

    #[test]
    fn default_executor_returns_handler_result() {
        let mock = MockHttpClient::new().with_json(
            Method::GET,
            "/_fabric/_system/_api/collection/users/count",
            200,
            serde_json::json!({"count": 4}),
        );
        let executor = DefaultExecutor::new(conn(&mock));

        assert_eq!(executor.context(), Context::Default);
        assert_eq!(executor.execute(count_request(), count_handler).unwrap(), 4);
    }

    #[test]
    fn default_executor_raises_handler_error() {
        let executor = DefaultExecutor::new(conn(&MockHttpClient::new()));
        let err = executor.execute(count_request(), count_handler).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::CollectionCount));
    }

    #[test]
    fn async_executor_tags_request_and_returns_job() {
        let mut headers = BTreeMap::new();
        headers.insert("x-c8-async-id".to_string(), "123".to_string());
        let mock = MockHttpClient::new().with_response(
            Method::GET,
            "/_fabric/_system/_api/collection/users/count",
            MockHttpClient::raw_response(202, headers, ""),
        );
        let executor = AsyncExecutor::new(conn(&mock), true);

        let job = executor.execute(count_request(), count_handler).unwrap().unwrap();
        assert_eq!(job.id(), "123");

        let recorded = mock.recorded_requests();
        assert_eq!(recorded[0].1.headers().get(ASYNC_HEADER), Some(&"store".to_string()));
    }

    #[test]
    fn async_executor_without_result_returns_none() {
        let mock = MockHttpClient::new().with_response(
            Method::GET,
            "/_fabric/_system/_api/collection/users/count",
            MockHttpClient::raw_response(202, BTreeMap::new(), ""),
        );
        let executor = AsyncExecutor::new(conn(&mock), false);

        assert!(executor.execute(count_request(), count_handler).unwrap().is_none());
        assert_eq!(
            mock.recorded_requests()[0].1.headers().get(ASYNC_HEADER),
            Some(&"true".to_string())
        );
    }

    #[test]
    fn async_executor_rejected_request() {
        let executor = AsyncExecutor::new(conn(&MockHttpClient::new()), true);
        let err = executor.execute(count_request(), count_handler).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::AsyncExecute));
    }

    #[test]
    fn async_executor_missing_job_id() {
        let mock = MockHttpClient::new().with_response(
            Method::GET,
            "/_fabric/_system/_api/collection/users/count",
            MockHttpClient::raw_response(202, BTreeMap::new(), ""),
        );
        let executor = AsyncExecutor::new(conn(&mock), true);
        let err = executor.execute(count_request(), count_handler).unwrap_err();
        assert!(matches!(err, Error::State { kind: ErrorKind::AsyncExecute, .. }));
    }

    fn batch_reply(ids: &[&str], statuses: &[&str], bodies: &[&str]) -> String {
        let mut out = String::new();
        for ((id, status), body) in ids.iter().zip(statuses).zip(bodies) {
            out.push_str(&format!(
                "--XXXsubpartXXX\r\nContent-Type: application/x-c8-batchpart\r\n\
                 Content-Id: {}\r\n\r\nHTTP/1.1 {}\r\nContent-Type: application/json\r\n\r\n{}\r\n",
                id, status, body
            ));
        }
        out.push_str("--XXXsubpartXXX--");
        out
    }

    #[test]
    fn batch_queues_until_commit() {
        let mock = MockHttpClient::new();
        let executor = BatchExecutor::new(conn(&mock), true);

        let job = executor.execute(count_request(), count_handler).unwrap().unwrap();
        assert_eq!(executor.queue_size(), 1);
        assert_eq!(mock.request_count(), 0);
        assert!(job.status().is_pending());
    }

    #[test]
    fn batch_commit_demultiplexes_by_content_id() {
        let mock = MockHttpClient::new();
        let executor = BatchExecutor::new(conn(&mock), true);
        let first = executor.execute(count_request(), count_handler).unwrap().unwrap();
        let second = executor.execute(count_request(), count_handler).unwrap().unwrap();

        // The server may answer in any order; parts are matched by id.
        let reply = batch_reply(
            &[second.id(), first.id()],
            &["404 Not Found", "200 OK"],
            &[r#"{"error":true,"errorNum":1203,"errorMessage":"collection not found"}"#, r#"{"count":7}"#],
        );
        let mock = mock.with_response(
            Method::POST,
            "/_fabric/_system/_api/batch",
            MockHttpClient::raw_response(200, BTreeMap::new(), &reply),
        );

        executor.commit().unwrap();

        assert!(first.status().is_done());
        assert_eq!(first.result().unwrap(), 7);
        let err = second.result().unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::CollectionCount));
        assert_eq!(err.error_num(), Some(1203));

        let (url, request) = &mock.recorded_requests()[0];
        assert_eq!(url, "http://localhost/_fabric/_system/_api/batch");
        assert_eq!(
            request.headers().get("Content-Type"),
            Some(&"multipart/form-data; boundary=XXXsubpartXXX".to_string())
        );
        match request.body() {
            Some(Body::Raw(body)) => {
                assert!(body.contains(&format!("Content-Id: {}", first.id())));
                assert!(body.contains("GET /_api/collection/users/count HTTP/1.1"));
                assert!(body.ends_with("--XXXsubpartXXX--"));
            }
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn batch_part_count_mismatch_fails() {
        let mock = MockHttpClient::new();
        let executor = BatchExecutor::new(conn(&mock), true);
        let job = executor.execute(count_request(), count_handler).unwrap().unwrap();
        executor.execute(count_request(), count_handler).unwrap();

        let reply = batch_reply(&[job.id()], &["200 OK"], &[r#"{"count":1}"#]);
        mock.clone().with_response(
            Method::POST,
            "/_fabric/_system/_api/batch",
            MockHttpClient::raw_response(200, BTreeMap::new(), &reply),
        );

        let err = executor.commit().unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::BatchState));
        assert!(err.to_string().contains("expecting 2 parts"));
        assert!(executor.is_committed());
    }

    #[test]
    fn batch_unknown_content_id_fails_without_filling_jobs() {
        let mock = MockHttpClient::new();
        let executor = BatchExecutor::new(conn(&mock), true);
        let first = executor.execute(count_request(), count_handler).unwrap().unwrap();
        let second = executor.execute(count_request(), count_handler).unwrap().unwrap();

        // The first part is valid; the second names no queued job.
        let reply = batch_reply(
            &[first.id(), "nope"],
            &["200 OK", "200 OK"],
            &[r#"{"count":1}"#, r#"{"count":2}"#],
        );
        mock.clone().with_response(
            Method::POST,
            "/_fabric/_system/_api/batch",
            MockHttpClient::raw_response(200, BTreeMap::new(), &reply),
        );

        let err = executor.commit().unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::BatchState));
        assert!(err.to_string().contains("nope"));
        for job in [&first, &second] {
            assert_eq!(job.status(), crate::job::JobStatus::Failed);
            assert_eq!(job.result().unwrap_err().kind(), Some(ErrorKind::BatchExecute));
        }
    }

    #[test]
    fn batch_duplicate_content_id_fails() {
        let mock = MockHttpClient::new();
        let executor = BatchExecutor::new(conn(&mock), true);
        let first = executor.execute(count_request(), count_handler).unwrap().unwrap();
        let second = executor.execute(count_request(), count_handler).unwrap().unwrap();

        let reply = batch_reply(
            &[first.id(), first.id()],
            &["200 OK", "200 OK"],
            &[r#"{"count":1}"#, r#"{"count":2}"#],
        );
        mock.clone().with_response(
            Method::POST,
            "/_fabric/_system/_api/batch",
            MockHttpClient::raw_response(200, BTreeMap::new(), &reply),
        );

        let err = executor.commit().unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::BatchState));
        assert!(err.to_string().contains("more than once"));
        assert_eq!(first.status(), crate::job::JobStatus::Failed);
        assert_eq!(second.status(), crate::job::JobStatus::Failed);
    }

    #[test]
    fn batch_transport_failure_fails_every_job() {
        let mock = MockHttpClient::new().fail_with("connection reset");
        let executor = BatchExecutor::new(conn(&mock), true);
        let job = executor.execute(count_request(), count_handler).unwrap().unwrap();

        let err = executor.commit().unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
        assert!(executor.is_committed());
        assert_eq!(job.status(), crate::job::JobStatus::Failed);
        let err = job.result().unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::BatchExecute));
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn batch_server_rejection_fails_every_job() {
        let mock = MockHttpClient::new().with_json(
            Method::POST,
            "/_fabric/_system/_api/batch",
            500,
            serde_json::json!({"error": true, "errorNum": 4, "errorMessage": "internal"}),
        );
        let executor = BatchExecutor::new(conn(&mock), true);
        let job = executor.execute(count_request(), count_handler).unwrap().unwrap();

        assert_eq!(executor.commit().unwrap_err().kind(), Some(ErrorKind::BatchExecute));
        assert_eq!(job.status(), crate::job::JobStatus::Failed);
    }

    #[test]
    fn batch_rejected_commit() {
        let mock = MockHttpClient::new();
        let executor = BatchExecutor::new(conn(&mock), false);
        assert!(executor.execute(count_request(), count_handler).unwrap().is_none());

        let err = executor.commit().unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::BatchExecute));
    }

    #[test]
    fn batch_is_sealed_after_commit() {
        let mock = MockHttpClient::new();
        let executor = BatchExecutor::new(conn(&mock), true);

        executor.commit().unwrap();
        assert!(executor.is_committed());
        assert_eq!(mock.request_count(), 0);

        let err = executor.execute(count_request(), count_handler).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::BatchState));
        assert_eq!(executor.commit().unwrap_err().kind(), Some(ErrorKind::BatchState));
    }

    #[test]
    fn batch_clones_share_queue() {
        let executor = BatchExecutor::new(conn(&MockHttpClient::new()), true);
        let clone = executor.clone();
        clone.execute(count_request(), count_handler).unwrap();
        assert_eq!(executor.queue_size(), 1);
    }

    fn txn(mock: &MockHttpClient) -> TransactionExecutor {
        TransactionExecutor::new(
            conn(mock),
            TransactionOptions {
                write: vec!["audit".to_string()],
                lock_timeout: Some(5),
                return_result: true,
                ..Default::default()
            },
        )
    }

    #[test]
    fn transaction_rejects_request_without_command() {
        let executor = txn(&MockHttpClient::new());
        let err = executor
            .execute(Request::get("/_api/collection"), count_handler)
            .unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::TransactionState));
        assert_eq!(executor.queue_size(), 0);
    }

    #[test]
    fn transaction_commit_assigns_results() {
        let mock = MockHttpClient::new();
        let executor = txn(&mock);
        let insert = Request::post("/_api/document/users")
            .with_command("db.users.insert({\"_key\":\"a\"},{})")
            .with_write("users");
        let job_a = executor.execute(count_request(), count_handler).unwrap().unwrap();
        let job_b = executor.execute(insert, count_handler).unwrap().unwrap();

        let reply = serde_json::json!({
            "error": false,
            "result": {job_a.id(): 3, job_b.id(): {"_key": "a"}}
        });
        let mock = mock.with_json(Method::POST, "/_fabric/_system/_api/transaction", 200, reply);

        executor.commit().unwrap();
        assert_eq!(job_a.result().unwrap(), serde_json::json!(3));
        assert_eq!(job_b.result().unwrap(), serde_json::json!({"_key": "a"}));

        let (_, request) = &mock.recorded_requests()[0];
        let body = match request.body() {
            Some(Body::Json(body)) => body.clone(),
            other => panic!("unexpected body {:?}", other),
        };
        assert_eq!(body["collections"]["read"], serde_json::json!(["users"]));
        assert_eq!(body["collections"]["write"], serde_json::json!(["audit", "users"]));
        assert_eq!(body["lockTimeout"], 5);
        assert!(body.get("waitForSync").is_none());

        let action = body["action"].as_str().unwrap();
        assert!(action.starts_with("function () { var db = require('internal').db;"));
        assert!(action.contains(&format!("_result[\"{}\"] = db.users.count();", job_a.id())));
        assert!(action.ends_with("return _result; }"));
    }

    #[test]
    fn transaction_failure_aborts_every_job() {
        let mock = MockHttpClient::new().with_json(
            Method::POST,
            "/_fabric/_system/_api/transaction",
            409,
            serde_json::json!({"error": true, "errorNum": 1200, "errorMessage": "conflict"}),
        );
        let executor = txn(&mock);
        let job_a = executor.execute(count_request(), count_handler).unwrap().unwrap();
        let job_b = executor.execute(count_request(), count_handler).unwrap().unwrap();

        let err = executor.commit().unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::TransactionExecute));
        assert_eq!(err.error_num(), Some(1200));

        for job in [&job_a, &job_b] {
            assert_eq!(job.status(), crate::job::JobStatus::Failed);
            assert!(job.result().unwrap_err().to_string().contains("conflict"));
        }
    }

    #[test]
    fn transaction_transport_failure_aborts_every_job() {
        let mock = MockHttpClient::new().fail_with("connection reset");
        let executor = txn(&mock);
        let job = executor.execute(count_request(), count_handler).unwrap().unwrap();

        let err = executor.commit().unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
        assert_eq!(mock.request_count(), 1);
        assert_eq!(job.status(), crate::job::JobStatus::Failed);
        let err = job.result().unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::TransactionExecute));
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn transaction_is_sealed_after_commit() {
        let mock = MockHttpClient::new();
        let executor = txn(&mock);
        executor.commit().unwrap();
        assert_eq!(mock.request_count(), 0);

        assert_eq!(
            executor.execute(count_request(), count_handler).unwrap_err().kind(),
            Some(ErrorKind::TransactionState)
        );
        assert_eq!(executor.commit().unwrap_err().kind(), Some(ErrorKind::TransactionState));
    }
}
