use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::http::HttpClient;
use crate::request::Request;
use crate::response::Response;

/// A fabric-scoped route to the server.
///
/// Endpoints are resolved against `{url}/_fabric/{fabric}`, or
/// `{url}/_tenant/{tenant}/_fabric/{fabric}` when a tenant is set.
pub struct Connection {
    base_url: String,
    url_prefix: String,
    fabric: String,
    tenant: Option<String>,
    auth: Option<String>,
    http: Arc<dyn HttpClient>,
}

impl Connection {
    pub fn new(
        base_url: &str,
        tenant: Option<&str>,
        fabric: &str,
        auth: Option<String>,
        http: Arc<dyn HttpClient>,
    ) -> Result<Self> {
        let base_url = url::Url::parse(base_url)?
            .as_str()
            .trim_end_matches('/')
            .to_string();

        let url_prefix = match tenant {
            Some(tenant) => format!("{}/_tenant/{}/_fabric/{}", base_url, tenant, fabric),
            None => format!("{}/_fabric/{}", base_url, fabric),
        };

        Ok(Self {
            base_url,
            url_prefix,
            fabric: fabric.to_string(),
            tenant: tenant.map(str::to_string),
            auth,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url_prefix(&self) -> &str {
        &self.url_prefix
    }

    pub fn fabric(&self) -> &str {
        &self.fabric
    }

    pub fn tenant(&self) -> Option<&str> {
        self.tenant.as_deref()
    }

    /// The `Authorization` header value sent with every request.
    pub fn auth(&self) -> Option<&str> {
        self.auth.as_deref()
    }

    pub fn http(&self) -> &Arc<dyn HttpClient> {
        &self.http
    }

    /// A connection to another fabric sharing this one's credentials.
    pub fn for_fabric(&self, fabric: &str) -> Result<Self> {
        Self::new(
            &self.base_url,
            self.tenant.as_deref(),
            fabric,
            self.auth.clone(),
            Arc::clone(&self.http),
        )
    }

    /// Resolve, authorize and send a request.
    pub fn send_request(&self, request: &Request) -> Result<Response> {
        let url = format!("{}{}", self.url_prefix, request.endpoint());

        debug!(
            method = %request.method(),
            url = %url,
            fabric = %self.fabric,
            "sending request"
        );

        let response = match &self.auth {
            Some(auth) if !request.has_header("authorization") => {
                let authorized = request.clone().with_header("Authorization", auth.as_str());
                self.http.send(&url, &authorized)?
            }
            _ => self.http.send(&url, request)?,
        };

        debug!(status = response.status(), url = %url, "received response");
        Ok(response)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("url_prefix", &self.url_prefix)
            .field("fabric", &self.fabric)
            .field("tenant", &self.tenant)
            .finish_non_exhaustive()
    }
}
