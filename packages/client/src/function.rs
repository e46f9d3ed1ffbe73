//! Serverless functions deployed next to a fabric.

use serde_json::Value;

use crate::api::{ApiWrapper, Output};
use crate::error::{Error, ErrorKind, Result};
use crate::executor::Executor;
use crate::request::Request;

#[derive(Debug, Clone)]
pub struct Functions<E: Executor> {
    executor: E,
}

impl<E: Executor> ApiWrapper for Functions<E> {
    type Executor = E;

    fn executor(&self) -> &E {
        &self.executor
    }
}

impl<E: Executor> Functions<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    /// Deployed functions, optionally only those of one backend `kind`.
    pub fn list(&self, kind: Option<&str>) -> Result<Output<E, Vec<Value>>> {
        let request = Request::get("/_api/function").with_opt_param("type", kind);
        self.execute(request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::FunctionList, &resp));
            }
            Ok(resp.field::<Vec<Value>>("result")?)
        })
    }

    pub fn get(&self, name: &str) -> Result<Output<E, Option<Value>>> {
        self.execute(Request::get(format!("/_api/function/{}", name)), |resp| {
            if resp.is_not_found() {
                return Ok(None);
            }
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::FunctionGet, &resp));
            }
            Ok(resp.body().get("result").cloned())
        })
    }

    /// Deploy a function from a query worker or stream worker definition.
    pub fn deploy(&self, kind: &str, definition: &Value) -> Result<Output<E, Value>> {
        let request = Request::post(format!("/_api/function/{}", kind)).with_json_body(definition.clone());
        self.execute(request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::FunctionDeploy, &resp));
            }
            Ok(resp.body().get("result").cloned().unwrap_or(Value::Null))
        })
    }

    /// Call a function with `params` and return what it answered.
    pub fn invoke(&self, name: &str, params: &Value) -> Result<Output<E, Value>> {
        let request =
            Request::post(format!("/_api/function/invoke/{}", name)).with_json_body(params.clone());
        self.execute(request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::FunctionInvoke, &resp));
            }
            Ok(resp.body().clone())
        })
    }

    pub fn delete(&self, name: &str, ignore_missing: bool) -> Result<Output<E, bool>> {
        let request = Request::delete(format!("/_api/function/{}", name));
        self.execute(request, move |resp| {
            if resp.is_not_found() && ignore_missing {
                return Ok(false);
            }
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::FunctionDelete, &resp));
            }
            Ok(true)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Connection;
    use crate::executor::{AsyncExecutor, DefaultExecutor};
    use crate::http::mock::MockHttpClient;
    use crate::request::{Body, Method};
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn conn(mock: &MockHttpClient) -> Arc<Connection> {
        Arc::new(
            Connection::new("http://localhost", None, "_system", None, Arc::new(mock.clone()))
                .unwrap(),
        )
    }

    fn functions(mock: &MockHttpClient) -> Functions<DefaultExecutor> {
        Functions::new(DefaultExecutor::new(conn(mock)))
    }

    #[test]
    fn list_filters_by_kind() {
        let mock = MockHttpClient::new().with_json(
            Method::GET,
            "/_fabric/_system/_api/function",
            200,
            json!({"result": [{"name": "greet", "type": "aws"}]}),
        );
        assert_eq!(functions(&mock).list(Some("aws")).unwrap().len(), 1);
        let (_, request) = &mock.recorded_requests()[0];
        assert_eq!(request.params().get("type"), Some(&"aws".to_string()));
    }

    #[test]
    fn invoke_posts_params() {
        let mock = MockHttpClient::new().with_json(
            Method::POST,
            "/_fabric/_system/_api/function/invoke/greet",
            200,
            json!({"message": "hello ada"}),
        );
        let answer = functions(&mock).invoke("greet", &json!({"name": "ada"})).unwrap();
        assert_eq!(answer["message"], "hello ada");

        let (_, request) = &mock.recorded_requests()[0];
        assert_eq!(request.body(), Some(&Body::Json(json!({"name": "ada"}))));
    }

    #[test]
    fn missing_function() {
        let functions = functions(&MockHttpClient::new());
        assert_eq!(functions.get("ghost").unwrap(), None);
        assert!(!functions.delete("ghost", true).unwrap());
        assert_eq!(
            functions.invoke("ghost", &json!({})).unwrap_err().kind(),
            Some(ErrorKind::FunctionInvoke)
        );
    }

    #[test]
    fn invoke_in_background() {
        let mut headers = BTreeMap::new();
        headers.insert("x-c8-async-id".to_string(), "12".to_string());
        let mock = MockHttpClient::new().with_response(
            Method::POST,
            "/_fabric/_system/_api/function/invoke/report",
            MockHttpClient::raw_response(202, headers, ""),
        );
        let functions = Functions::new(AsyncExecutor::new(conn(&mock), true));

        let job = functions.invoke("report", &json!({})).unwrap().unwrap();
        assert_eq!(job.id(), "12");
    }
}
