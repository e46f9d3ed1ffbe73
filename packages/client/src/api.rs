use std::sync::Arc;

use crate::connection::Connection;
use crate::error::Result;
use crate::executor::{Context, Executor};
use crate::request::Request;
use crate::response::Response;

/// Result type of an operation run under executor `E`.
pub type Output<E, T> = <E as Executor>::Output<T>;

/// Common base of the domain wrappers.
///
/// Operations never send requests themselves; they hand a request and a
/// response handler to [`ApiWrapper::execute`], so the same method body works
/// under every execution context.
pub trait ApiWrapper {
    type Executor: Executor;

    fn executor(&self) -> &Self::Executor;

    fn connection(&self) -> &Arc<Connection> {
        self.executor().connection()
    }

    fn context(&self) -> Context {
        self.executor().context()
    }

    fn execute<T, F>(&self, request: Request, handler: F) -> Result<Output<Self::Executor, T>>
    where
        T: 'static,
        F: Fn(Response) -> Result<T> + Send + Sync + 'static,
    {
        self.executor().execute(request, handler)
    }
}
