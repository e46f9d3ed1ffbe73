//! Users of a tenant and their fabric and collection permissions.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::api::{ApiWrapper, Output};
use crate::error::{Error, ErrorKind, Result};
use crate::executor::Executor;
use crate::request::Request;

/// Access level granted on a fabric or collection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Permission {
    #[serde(rename = "rw")]
    ReadWrite,
    #[serde(rename = "ro")]
    ReadOnly,
    #[serde(rename = "none")]
    NoAccess,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ReadWrite => "rw",
            Permission::ReadOnly => "ro",
            Permission::NoAccess => "none",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserInfo {
    pub user: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub extra: Value,
}

#[derive(Debug, Clone)]
pub struct Users<E: Executor> {
    executor: E,
}

impl<E: Executor> ApiWrapper for Users<E> {
    type Executor = E;

    fn executor(&self) -> &E {
        &self.executor
    }
}

impl<E: Executor> Users<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub fn list(&self) -> Result<Output<E, Vec<UserInfo>>> {
        self.execute(Request::get("/_api/user"), |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::UserList, &resp));
            }
            Ok(resp.field::<Vec<UserInfo>>("result")?)
        })
    }

    /// A user, or `None` when unknown.
    pub fn get(&self, username: &str) -> Result<Output<E, Option<UserInfo>>> {
        self.execute(Request::get(format!("/_api/user/{}", username)), |resp| {
            if resp.is_not_found() {
                return Ok(None);
            }
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::UserGet, &resp));
            }
            Ok(Some(resp.json::<UserInfo>()?))
        })
    }

    pub fn create(
        &self,
        username: &str,
        password: &str,
        active: bool,
        extra: Option<&Value>,
    ) -> Result<Output<E, UserInfo>> {
        let mut body = json!({"user": username, "passwd": password, "active": active});
        if let Some(extra) = extra {
            body["extra"] = extra.clone();
        }
        self.execute(Request::post("/_api/user").with_json_body(body), |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::UserCreate, &resp));
            }
            Ok(resp.json::<UserInfo>()?)
        })
    }

    /// Change the password, the active flag or the extra data. Unset
    /// arguments keep their current value.
    pub fn update(
        &self,
        username: &str,
        password: Option<&str>,
        active: Option<bool>,
        extra: Option<&Value>,
    ) -> Result<Output<E, UserInfo>> {
        let mut body = json!({});
        if let Some(password) = password {
            body["passwd"] = json!(password);
        }
        if let Some(active) = active {
            body["active"] = json!(active);
        }
        if let Some(extra) = extra {
            body["extra"] = extra.clone();
        }
        let request = Request::patch(format!("/_api/user/{}", username)).with_json_body(body);
        self.execute(request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::UserUpdate, &resp));
            }
            Ok(resp.json::<UserInfo>()?)
        })
    }

    pub fn delete(&self, username: &str, ignore_missing: bool) -> Result<Output<E, bool>> {
        let request = Request::delete(format!("/_api/user/{}", username));
        self.execute(request, move |resp| {
            if resp.is_not_found() && ignore_missing {
                return Ok(false);
            }
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::UserDelete, &resp));
            }
            Ok(true)
        })
    }

    /// Fabric names mapped to the user's access level.
    pub fn permissions(&self, username: &str) -> Result<Output<E, Value>> {
        let request = Request::get(format!("/_api/user/{}/database", username));
        self.execute(request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::PermissionList, &resp));
            }
            Ok(resp.body().get("result").cloned().unwrap_or(Value::Null))
        })
    }

    /// Grant access to a fabric, or to one collection in it.
    pub fn set_permission(
        &self,
        username: &str,
        permission: Permission,
        fabric: &str,
        collection: Option<&str>,
    ) -> Result<Output<E, bool>> {
        let endpoint = match collection {
            Some(collection) => format!("/_api/user/{}/database/{}/{}", username, fabric, collection),
            None => format!("/_api/user/{}/database/{}", username, fabric),
        };
        let request = Request::put(endpoint).with_json_body(json!({"grant": permission.as_str()}));
        self.execute(request, |resp| {
            if !resp.is_success() {
                return Err(Error::server(ErrorKind::PermissionUpdate, &resp));
            }
            Ok(true)
        })
    }
}
