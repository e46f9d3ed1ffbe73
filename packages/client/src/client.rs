use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info};

use crate::config::{ClientConfig, Credentials, DEFAULT_FABRIC};
use crate::connection::Connection;
use crate::error::{Error, ErrorKind, Result, ServerError};
use crate::executor::DefaultExecutor;
use crate::fabric::Fabric;
use crate::http::{HttpClient, ReqwestClient};
use crate::request::Request;

/// Entry point: an authenticated handle that opens fabrics.
pub struct C8Client {
    config: ClientConfig,
    auth: Option<String>,
    http: Arc<dyn HttpClient>,
}

impl C8Client {
    /// Connect with the reqwest transport and the configured timeout.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = ReqwestClient::new(config.timeout())?;
        Self::with_http_client(config, Arc::new(http))
    }

    pub fn with_http_client(config: ClientConfig, http: Arc<dyn HttpClient>) -> Result<Self> {
        config.validate()?;
        let auth = match &config.credentials {
            Some(Credentials::Password { email, password }) => {
                Some(authenticate(&config, http.as_ref(), email, password)?)
            }
            Some(credentials) => credentials.static_header(),
            None => None,
        };

        info!(url = %config.url, tenant = ?config.tenant, "client ready");
        Ok(Self { config, auth, http })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The `Authorization` header value sent with requests, if any.
    pub fn auth(&self) -> Option<&str> {
        self.auth.as_deref()
    }

    pub fn fabric(&self, name: &str) -> Result<Fabric<DefaultExecutor>> {
        let conn = Connection::new(
            &self.config.url,
            self.config.tenant.as_deref(),
            name,
            self.auth.clone(),
            Arc::clone(&self.http),
        )?;
        Ok(Fabric::new(DefaultExecutor::new(Arc::new(conn))))
    }

    pub fn system_fabric(&self) -> Result<Fabric<DefaultExecutor>> {
        self.fabric(DEFAULT_FABRIC)
    }

    /// The fabric named in the configuration.
    pub fn default_fabric(&self) -> Result<Fabric<DefaultExecutor>> {
        self.fabric(&self.config.fabric)
    }
}

impl std::fmt::Debug for C8Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("C8Client")
            .field("config", &self.config)
            .field("authenticated", &self.auth.is_some())
            .finish_non_exhaustive()
    }
}

/// Trade an email and password for a bearer token.
fn authenticate(
    config: &ClientConfig,
    http: &dyn HttpClient,
    email: &str,
    password: &str,
) -> Result<String> {
    let mut body = json!({"email": email, "password": password});
    if let Some(tenant) = &config.tenant {
        body["tenant"] = json!(tenant);
    }
    let url = format!("{}/_open/auth", config.url.trim_end_matches('/'));
    debug!(url = %url, email = %email, "authenticating");

    let response = http.send(&url, &Request::post("/_open/auth").with_json_body(body))?;
    if !response.is_success() {
        return Err(Error::server(ErrorKind::Authentication, &response));
    }
    let jwt = response.body().get("jwt").and_then(|jwt| jwt.as_str()).ok_or_else(|| {
        Error::Server(
            ServerError::from_response(ErrorKind::Authentication, &response)
                .with_message("login reply carries no jwt"),
        )
    })?;
    Ok(format!("bearer {}", jwt))
}
