use std::fmt;

use crate::response::Response;

/// Server error number for a missing document.
pub const DOCUMENT_NOT_FOUND: i64 = 1202;

/// Server error number for a missing collection.
pub const COLLECTION_NOT_FOUND: i64 = 1203;

/// Server error number for a generic not-found condition.
pub const HTTP_NOT_FOUND: i64 = 404;

/// The operation that produced an error.
///
/// Callers match on this to tell failures apart, e.g. a failed insert from a
/// failed lookup, without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Authentication,
    Connection,
    Config,

    AsyncExecute,
    AsyncJobStatus,
    AsyncJobResult,
    AsyncJobCancel,
    AsyncJobClear,
    AsyncJobList,

    BatchState,
    BatchExecute,
    BatchJobResult,

    TransactionState,
    TransactionExecute,
    TransactionJobResult,

    FabricProperties,
    FabricList,
    FabricCreate,
    FabricDelete,

    CollectionList,
    CollectionProperties,
    CollectionCreate,
    CollectionDelete,
    CollectionTruncate,
    CollectionCount,

    DocumentParse,
    DocumentGet,
    DocumentIn,
    DocumentInsert,
    DocumentUpdate,
    DocumentReplace,
    DocumentDelete,

    QueryExecute,
    CursorNext,
    CursorClose,
    CursorState,

    KvCollectionList,
    KvCollectionCreate,
    KvCollectionDelete,
    KvInsert,
    KvGet,
    KvRemove,
    KvCount,
    KvKeys,
    KvTruncate,

    RestqlCreate,
    RestqlList,
    RestqlExecute,
    RestqlFetch,
    RestqlUpdate,
    RestqlDelete,

    StreamList,
    StreamCreate,
    StreamDelete,
    StreamMessage,

    TenantList,
    TenantCreate,
    TenantDetails,
    TenantDelete,

    GraphList,
    GraphCreate,
    GraphDelete,
    GraphProperties,
    VertexCollectionList,
    VertexCollectionCreate,
    VertexCollectionDelete,
    EdgeDefinitionList,
    EdgeDefinitionCreate,
    EdgeDefinitionDelete,
    VertexInsert,
    VertexGet,
    VertexDelete,
    EdgeInsert,
    EdgeGet,
    EdgeDelete,
    EdgeList,

    RedisCommand,

    SearchSet,
    ViewList,
    ViewCreate,
    ViewProperties,
    ViewUpdate,
    ViewDelete,
    AnalyzerList,

    UserList,
    UserGet,
    UserCreate,
    UserUpdate,
    UserDelete,
    PermissionList,
    PermissionUpdate,

    FunctionList,
    FunctionGet,
    FunctionDeploy,
    FunctionInvoke,
    FunctionDelete,

    PlanList,
    PlanCreate,
    PlanUpdate,
    PlanDelete,
    BillingAccount,
    BillingUsage,
    BillingInvoices,

    DatacenterList,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Authentication => "authentication failed",
            ErrorKind::Connection => "connection failed",
            ErrorKind::Config => "invalid configuration",
            ErrorKind::AsyncExecute => "async execution failed",
            ErrorKind::AsyncJobStatus => "async job status failed",
            ErrorKind::AsyncJobResult => "async job result failed",
            ErrorKind::AsyncJobCancel => "async job cancel failed",
            ErrorKind::AsyncJobClear => "async job clear failed",
            ErrorKind::AsyncJobList => "async job list failed",
            ErrorKind::BatchState => "invalid batch state",
            ErrorKind::BatchExecute => "batch execution failed",
            ErrorKind::BatchJobResult => "batch job result failed",
            ErrorKind::TransactionState => "invalid transaction state",
            ErrorKind::TransactionExecute => "transaction execution failed",
            ErrorKind::TransactionJobResult => "transaction job result failed",
            ErrorKind::FabricProperties => "fabric properties failed",
            ErrorKind::FabricList => "fabric list failed",
            ErrorKind::FabricCreate => "fabric create failed",
            ErrorKind::FabricDelete => "fabric delete failed",
            ErrorKind::CollectionList => "collection list failed",
            ErrorKind::CollectionProperties => "collection properties failed",
            ErrorKind::CollectionCreate => "collection create failed",
            ErrorKind::CollectionDelete => "collection delete failed",
            ErrorKind::CollectionTruncate => "collection truncate failed",
            ErrorKind::CollectionCount => "collection count failed",
            ErrorKind::DocumentParse => "document parse failed",
            ErrorKind::DocumentGet => "document get failed",
            ErrorKind::DocumentIn => "document lookup failed",
            ErrorKind::DocumentInsert => "document insert failed",
            ErrorKind::DocumentUpdate => "document update failed",
            ErrorKind::DocumentReplace => "document replace failed",
            ErrorKind::DocumentDelete => "document delete failed",
            ErrorKind::QueryExecute => "query execution failed",
            ErrorKind::CursorNext => "cursor fetch failed",
            ErrorKind::CursorClose => "cursor close failed",
            ErrorKind::CursorState => "invalid cursor state",
            ErrorKind::KvCollectionList => "kv collection list failed",
            ErrorKind::KvCollectionCreate => "kv collection create failed",
            ErrorKind::KvCollectionDelete => "kv collection delete failed",
            ErrorKind::KvInsert => "kv insert failed",
            ErrorKind::KvGet => "kv get failed",
            ErrorKind::KvRemove => "kv remove failed",
            ErrorKind::KvCount => "kv count failed",
            ErrorKind::KvKeys => "kv keys failed",
            ErrorKind::KvTruncate => "kv truncate failed",
            ErrorKind::RestqlCreate => "restql create failed",
            ErrorKind::RestqlList => "restql list failed",
            ErrorKind::RestqlExecute => "restql execute failed",
            ErrorKind::RestqlFetch => "restql fetch failed",
            ErrorKind::RestqlUpdate => "restql update failed",
            ErrorKind::RestqlDelete => "restql delete failed",
            ErrorKind::StreamList => "stream list failed",
            ErrorKind::StreamCreate => "stream create failed",
            ErrorKind::StreamDelete => "stream delete failed",
            ErrorKind::StreamMessage => "stream message invalid",
            ErrorKind::TenantList => "tenant list failed",
            ErrorKind::TenantCreate => "tenant create failed",
            ErrorKind::TenantDetails => "tenant details failed",
            ErrorKind::TenantDelete => "tenant delete failed",
            ErrorKind::GraphList => "graph list failed",
            ErrorKind::GraphCreate => "graph create failed",
            ErrorKind::GraphDelete => "graph delete failed",
            ErrorKind::GraphProperties => "graph properties failed",
            ErrorKind::VertexCollectionList => "vertex collection list failed",
            ErrorKind::VertexCollectionCreate => "vertex collection create failed",
            ErrorKind::VertexCollectionDelete => "vertex collection delete failed",
            ErrorKind::EdgeDefinitionList => "edge definition list failed",
            ErrorKind::EdgeDefinitionCreate => "edge definition create failed",
            ErrorKind::EdgeDefinitionDelete => "edge definition delete failed",
            ErrorKind::VertexInsert => "vertex insert failed",
            ErrorKind::VertexGet => "vertex get failed",
            ErrorKind::VertexDelete => "vertex delete failed",
            ErrorKind::EdgeInsert => "edge insert failed",
            ErrorKind::EdgeGet => "edge get failed",
            ErrorKind::EdgeDelete => "edge delete failed",
            ErrorKind::EdgeList => "edge list failed",
            ErrorKind::RedisCommand => "redis command failed",
            ErrorKind::SearchSet => "search setup failed",
            ErrorKind::ViewList => "view list failed",
            ErrorKind::ViewCreate => "view create failed",
            ErrorKind::ViewProperties => "view properties failed",
            ErrorKind::ViewUpdate => "view update failed",
            ErrorKind::ViewDelete => "view delete failed",
            ErrorKind::AnalyzerList => "analyzer list failed",
            ErrorKind::UserList => "user list failed",
            ErrorKind::UserGet => "user get failed",
            ErrorKind::UserCreate => "user create failed",
            ErrorKind::UserUpdate => "user update failed",
            ErrorKind::UserDelete => "user delete failed",
            ErrorKind::PermissionList => "permission list failed",
            ErrorKind::PermissionUpdate => "permission update failed",
            ErrorKind::FunctionList => "function list failed",
            ErrorKind::FunctionGet => "function get failed",
            ErrorKind::FunctionDeploy => "function deploy failed",
            ErrorKind::FunctionInvoke => "function invoke failed",
            ErrorKind::FunctionDelete => "function delete failed",
            ErrorKind::PlanList => "plan list failed",
            ErrorKind::PlanCreate => "plan create failed",
            ErrorKind::PlanUpdate => "plan update failed",
            ErrorKind::PlanDelete => "plan delete failed",
            ErrorKind::BillingAccount => "billing account failed",
            ErrorKind::BillingUsage => "billing usage failed",
            ErrorKind::BillingInvoices => "billing invoices failed",
            ErrorKind::DatacenterList => "datacenter list failed",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-2xx answer from the server, tagged with the vendor error number.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerError {
    pub kind: ErrorKind,
    pub http_status: u16,
    pub error_num: Option<i64>,
    pub message: String,
    pub method: String,
    pub url: String,
}

impl ServerError {
    pub fn from_response(kind: ErrorKind, response: &Response) -> Self {
        let message = response
            .error_message()
            .map(str::to_string)
            .unwrap_or_else(|| response.status_text().to_string());

        Self {
            kind,
            http_status: response.status(),
            error_num: response.error_code(),
            message,
            method: response.method().to_string(),
            url: response.url().to_string(),
        }
    }

    /// Override the server-supplied message, keeping the status tags.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: [HTTP {}]", self.kind, self.http_status)?;
        if let Some(num) = self.error_num {
            write!(f, "[ERR {}]", num)?;
        }
        write!(f, " {}", self.message)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Invalid header name: {0}")]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),

    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transport failure: {message}")]
    Transport { message: String },

    /// Malformed input caught before anything was sent.
    #[error("{kind}: {message}")]
    Client { kind: ErrorKind, message: String },

    #[error("{0}")]
    Server(ServerError),

    /// An executor or job was used outside its lifecycle.
    #[error("{kind}: {message}")]
    State { kind: ErrorKind, message: String },
}

impl Error {
    pub fn client(kind: ErrorKind, message: impl Into<String>) -> Self {
        Error::Client {
            kind,
            message: message.into(),
        }
    }

    pub fn state(kind: ErrorKind, message: impl Into<String>) -> Self {
        Error::State {
            kind,
            message: message.into(),
        }
    }

    pub fn server(kind: ErrorKind, response: &Response) -> Self {
        Error::Server(ServerError::from_response(kind, response))
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Error::Client { kind, .. } | Error::State { kind, .. } => Some(*kind),
            Error::Server(e) => Some(e.kind),
            Error::Transport { .. } => Some(ErrorKind::Connection),
            _ => None,
        }
    }

    pub fn error_num(&self) -> Option<i64> {
        match self {
            Error::Server(e) => e.error_num,
            _ => None,
        }
    }

    pub fn http_status(&self) -> Option<u16> {
        match self {
            Error::Server(e) => Some(e.http_status),
            _ => None,
        }
    }

    pub fn is_server(&self) -> bool {
        matches!(self, Error::Server(_))
    }

    pub fn is_client(&self) -> bool {
        matches!(self, Error::Client { .. })
    }
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;
