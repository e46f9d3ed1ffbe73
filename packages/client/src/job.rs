//! Handles to deferred results.
//!
//! An [`AsyncJob`] polls the server for the outcome of a request executed in
//! the background. A [`BatchJob`] or [`TransactionJob`] is filled in locally
//! when its executor commits.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::connection::Connection;
use crate::error::{Error, ErrorKind, Result, ServerError};
use crate::request::Request;
use crate::response::Response;

/// Maps a raw response to a domain value or a typed error.
pub type ResponseHandler<T> = Arc<dyn Fn(Response) -> Result<T> + Send + Sync>;

/// Response header carrying the server-side async job id.
pub const ASYNC_ID_HEADER: &str = "x-c8-async-id";

/// The state of a deferred job
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Done,
    Cancelled,
    Failed,
}

impl JobStatus {
    pub fn is_pending(&self) -> bool {
        *self == JobStatus::Pending
    }

    pub fn is_done(&self) -> bool {
        *self == JobStatus::Done
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Done => "done",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

pub(crate) fn new_job_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Job for a request the server executes in the background.
pub struct AsyncJob<T> {
    id: String,
    conn: Arc<Connection>,
    handler: ResponseHandler<T>,
}

impl<T> AsyncJob<T> {
    pub(crate) fn new(id: String, conn: Arc<Connection>, handler: ResponseHandler<T>) -> Self {
        Self { id, conn, handler }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    fn endpoint(&self) -> String {
        format!("/_api/job/{}", self.id)
    }

    pub fn status(&self) -> Result<JobStatus> {
        let response = self.conn.send_request(&Request::get(self.endpoint()))?;

        if response.status() == 204 {
            return Ok(JobStatus::Pending);
        }
        if response.is_success() {
            return Ok(JobStatus::Done);
        }
        let err = ServerError::from_response(ErrorKind::AsyncJobStatus, &response);
        if response.is_not_found() {
            return Err(Error::Server(
                err.with_message(format!("job {} not found", self.id)),
            ));
        }
        Err(Error::Server(err))
    }

    /// Fetch the stored result and run it through the response handler.
    ///
    /// A stored failure surfaces here as the operation's typed error.
    pub fn result(&self) -> Result<T> {
        let response = self.conn.send_request(&Request::put(self.endpoint()))?;

        if response.header(ASYNC_ID_HEADER).is_some() {
            return (self.handler)(response);
        }
        let err = ServerError::from_response(ErrorKind::AsyncJobResult, &response);
        if response.status() == 204 {
            return Err(Error::Server(
                err.with_message(format!("job {} not done", self.id)),
            ));
        }
        if response.is_not_found() {
            return Err(Error::Server(
                err.with_message(format!("job {} not found", self.id)),
            ));
        }
        Err(Error::Server(err))
    }

    /// Ask the server to cancel the job. Returns `false` for an unknown job
    /// when `ignore_missing` is set.
    pub fn cancel(&self, ignore_missing: bool) -> Result<bool> {
        let request = Request::put(format!("{}/cancel", self.endpoint()));
        let response = self.conn.send_request(&request)?;
        self.settle(response, ignore_missing, ErrorKind::AsyncJobCancel)
    }

    /// Delete the job and its stored result from the server.
    pub fn clear(&self, ignore_missing: bool) -> Result<bool> {
        let response = self.conn.send_request(&Request::delete(self.endpoint()))?;
        self.settle(response, ignore_missing, ErrorKind::AsyncJobClear)
    }

    fn settle(&self, response: Response, ignore_missing: bool, kind: ErrorKind) -> Result<bool> {
        if response.is_success() {
            return Ok(true);
        }
        if response.is_not_found() {
            if ignore_missing {
                return Ok(false);
            }
            return Err(Error::Server(
                ServerError::from_response(kind, &response)
                    .with_message(format!("job {} not found", self.id)),
            ));
        }
        Err(Error::server(kind, &response))
    }

    /// Poll `status()` every `interval` until the job leaves `Pending`,
    /// then fetch the result.
    pub fn wait(&self, interval: Duration) -> Result<T> {
        while self.status()?.is_pending() {
            thread::sleep(interval);
        }
        self.result()
    }
}

impl<T> fmt::Debug for AsyncJob<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<AsyncJob {}>", self.id)
    }
}

#[derive(Debug, Clone)]
pub(crate) enum PartOutcome {
    Pending,
    Done(Response),
    Failed(String),
}

pub(crate) type ResponseSlot = Arc<Mutex<PartOutcome>>;

/// Job for a request queued in a batch.
pub struct BatchJob<T> {
    id: String,
    slot: ResponseSlot,
    handler: ResponseHandler<T>,
}

impl<T> BatchJob<T> {
    pub(crate) fn new(id: String, handler: ResponseHandler<T>) -> Self {
        Self {
            id,
            slot: Arc::new(Mutex::new(PartOutcome::Pending)),
            handler,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn slot(&self) -> ResponseSlot {
        Arc::clone(&self.slot)
    }

    pub fn status(&self) -> JobStatus {
        match *self.slot.lock().unwrap_or_else(PoisonError::into_inner) {
            PartOutcome::Pending => JobStatus::Pending,
            PartOutcome::Done(_) => JobStatus::Done,
            PartOutcome::Failed(_) => JobStatus::Failed,
        }
    }

    /// Apply the handler to this job's part of the batch response.
    ///
    /// A batch whose commit failed leaves every job `Failed`, and `result()`
    /// then reports the commit error.
    pub fn result(&self) -> Result<T> {
        let outcome = self.slot.lock().unwrap_or_else(PoisonError::into_inner).clone();
        match outcome {
            PartOutcome::Done(response) => (self.handler)(response),
            PartOutcome::Pending => Err(Error::state(
                ErrorKind::BatchJobResult,
                format!("result of batch job {} not available yet", self.id),
            )),
            PartOutcome::Failed(message) => Err(Error::state(
                ErrorKind::BatchExecute,
                format!("batch aborted: {}", message),
            )),
        }
    }
}

impl<T> fmt::Debug for BatchJob<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<BatchJob {}>", self.id)
    }
}

#[derive(Debug, Clone)]
pub(crate) enum TransactionOutcome {
    Pending,
    Done(Value),
    Failed(String),
}

pub(crate) type OutcomeSlot = Arc<Mutex<TransactionOutcome>>;

/// Job for a command queued in a transaction.
///
/// The result is the raw value the command produced on the server.
pub struct TransactionJob {
    id: String,
    slot: OutcomeSlot,
}

impl TransactionJob {
    pub(crate) fn new(id: String) -> Self {
        Self {
            id,
            slot: Arc::new(Mutex::new(TransactionOutcome::Pending)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn slot(&self) -> OutcomeSlot {
        Arc::clone(&self.slot)
    }

    pub fn status(&self) -> JobStatus {
        match *self.slot.lock().unwrap_or_else(PoisonError::into_inner) {
            TransactionOutcome::Pending => JobStatus::Pending,
            TransactionOutcome::Done(_) => JobStatus::Done,
            TransactionOutcome::Failed(_) => JobStatus::Failed,
        }
    }

    pub fn result(&self) -> Result<Value> {
        match &*self.slot.lock().unwrap_or_else(PoisonError::into_inner) {
            TransactionOutcome::Done(value) => Ok(value.clone()),
            TransactionOutcome::Pending => Err(Error::state(
                ErrorKind::TransactionJobResult,
                format!("result of transaction job {} not available yet", self.id),
            )),
            TransactionOutcome::Failed(message) => Err(Error::state(
                ErrorKind::TransactionExecute,
                format!("transaction aborted: {}", message),
            )),
        }
    }
}

impl fmt::Debug for TransactionJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<TransactionJob {}>", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::mock::MockHttpClient;
    use crate::request::Method;
    use serde_json::json;
    use std::collections::BTreeMap;

    const JOB_PATH: &str = "/_fabric/_system/_api/job/77";

    fn count_handler() -> ResponseHandler<u64> {
        Arc::new(|resp: Response| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::CollectionCount, &resp));
            }
            Ok(resp.field("count")?)
        })
    }

    fn async_job(mock: &MockHttpClient) -> AsyncJob<u64> {
        let conn = Connection::new("http://localhost", None, "_system", None, Arc::new(mock.clone()))
            .unwrap();
        AsyncJob::new("77".to_string(), Arc::new(conn), count_handler())
    }

    fn stored(status: u16, body: serde_json::Value) -> Response {
        let mut headers = BTreeMap::new();
        headers.insert("X-C8-Async-Id".to_string(), "77".to_string());
        MockHttpClient::raw_response(status, headers, &body.to_string())
    }

    #[test]
    fn async_status_transitions() {
        let mock = MockHttpClient::new()
            .with_response(Method::GET, JOB_PATH, MockHttpClient::raw_response(204, BTreeMap::new(), ""))
            .with_json(Method::GET, JOB_PATH, 200, json!({}));
        let job = async_job(&mock);

        assert_eq!(job.status().unwrap(), JobStatus::Pending);
        assert_eq!(job.status().unwrap(), JobStatus::Done);
    }

    #[test]
    fn async_status_unknown_job() {
        let job = async_job(&MockHttpClient::new());
        let err = job.status().unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::AsyncJobStatus));
        assert!(err.to_string().contains("job 77 not found"));
    }

    #[test]
    fn async_result_applies_handler() {
        let mock = MockHttpClient::new().with_response(Method::PUT, JOB_PATH, stored(200, json!({"count": 9})));
        assert_eq!(async_job(&mock).result().unwrap(), 9);
    }

    #[test]
    fn async_result_surfaces_stored_failure() {
        let mock = MockHttpClient::new().with_response(
            Method::PUT,
            JOB_PATH,
            stored(404, json!({"error": true, "errorNum": 1203, "errorMessage": "collection not found"})),
        );
        let err = async_job(&mock).result().unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::CollectionCount));
        assert_eq!(err.error_num(), Some(1203));
    }

    #[test]
    fn async_result_not_done() {
        let mock = MockHttpClient::new().with_response(
            Method::PUT,
            JOB_PATH,
            MockHttpClient::raw_response(204, BTreeMap::new(), ""),
        );
        let err = async_job(&mock).result().unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::AsyncJobResult));
        assert!(err.to_string().contains("not done"));
    }

    #[test]
    fn async_cancel_and_clear() {
        let mock = MockHttpClient::new()
            .with_json(Method::PUT, "/_fabric/_system/_api/job/77/cancel", 200, json!({"result": true}))
            .with_json(Method::DELETE, JOB_PATH, 200, json!({"result": true}));
        let job = async_job(&mock);

        assert!(job.cancel(false).unwrap());
        assert!(job.clear(false).unwrap());
    }

    #[test]
    fn async_cancel_missing_job() {
        let job = async_job(&MockHttpClient::new());
        assert!(!job.cancel(true).unwrap());
        assert_eq!(job.cancel(false).unwrap_err().kind(), Some(ErrorKind::AsyncJobCancel));
        assert_eq!(job.clear(false).unwrap_err().kind(), Some(ErrorKind::AsyncJobClear));
    }

    #[test]
    fn async_wait_polls_until_done() {
        let mock = MockHttpClient::new()
            .with_response(Method::GET, JOB_PATH, MockHttpClient::raw_response(204, BTreeMap::new(), ""))
            .with_response(Method::GET, JOB_PATH, MockHttpClient::raw_response(204, BTreeMap::new(), ""))
            .with_json(Method::GET, JOB_PATH, 200, json!({}))
            .with_response(Method::PUT, JOB_PATH, stored(200, json!({"count": 2})));

        let job = async_job(&mock);
        assert_eq!(job.wait(Duration::from_millis(1)).unwrap(), 2);
        assert_eq!(mock.request_count(), 4);
    }

    #[test]
    fn batch_job_pending_then_done() {
        let job = BatchJob::new(new_job_id(), count_handler());
        assert_eq!(job.status(), JobStatus::Pending);
        assert_eq!(job.result().unwrap_err().kind(), Some(ErrorKind::BatchJobResult));

        *job.slot().lock().unwrap() =
            PartOutcome::Done(MockHttpClient::json_response(200, json!({"count": 5})));
        assert_eq!(job.status(), JobStatus::Done);
        assert_eq!(job.result().unwrap(), 5);
    }

    #[test]
    fn batch_job_failed_reports_commit_error() {
        let job = BatchJob::new(new_job_id(), count_handler());
        *job.slot().lock().unwrap() = PartOutcome::Failed("connection reset".to_string());

        assert_eq!(job.status(), JobStatus::Failed);
        let err = job.result().unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::BatchExecute));
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn transaction_job_outcomes() {
        let job = TransactionJob::new(new_job_id());
        assert!(job.status().is_pending());
        assert_eq!(job.result().unwrap_err().kind(), Some(ErrorKind::TransactionJobResult));

        *job.slot().lock().unwrap() = TransactionOutcome::Done(json!({"_key": "a"}));
        assert!(job.status().is_done());
        assert_eq!(job.result().unwrap(), json!({"_key": "a"}));

        *job.slot().lock().unwrap() = TransactionOutcome::Failed("lock timeout".to_string());
        assert_eq!(job.status(), JobStatus::Failed);
        let err = job.result().unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::TransactionExecute));
        assert!(err.to_string().contains("lock timeout"));
    }

    #[test]
    fn job_ids_are_unique_hex() {
        let a = new_job_id();
        let b = new_job_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
