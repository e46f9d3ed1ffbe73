//! Client configuration.
//!
//! ```json
//! {
//!   "url": "https://gdn.example.com",
//!   "tenant": "acme",
//!   "fabric": "sales",
//!   "credentials": {"email": "ops@acme.io", "password": "..."},
//!   "timeout_ms": 10000
//! }
//! ```

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind, Result};

pub const DEFAULT_FABRIC: &str = "_system";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

fn default_fabric() -> String {
    DEFAULT_FABRIC.to_string()
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_MS
}

/// How the client authenticates. The form is picked by which fields are
/// present.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Credentials {
    /// Exchanged for a JWT when the client is built.
    Password { email: String, password: String },
    ApiKey {
        #[serde(rename = "api_key")]
        key: String,
    },
    /// A JWT issued elsewhere.
    Token { token: String },
}

impl Credentials {
    /// The `Authorization` header value, for forms that need no login call.
    pub(crate) fn static_header(&self) -> Option<String> {
        match self {
            Credentials::Password { .. } => None,
            Credentials::ApiKey { key } => Some(format!("apikey {}", key)),
            Credentials::Token { token } => Some(format!("bearer {}", token)),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Password { email, .. } => f
                .debug_struct("Password")
                .field("email", email)
                .finish_non_exhaustive(),
            Credentials::ApiKey { .. } => f.write_str("ApiKey(..)"),
            Credentials::Token { .. } => f.write_str("Token(..)"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientConfig {
    /// Server root, e.g. `https://gdn.example.com`.
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    #[serde(default = "default_fabric")]
    pub fabric: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            tenant: None,
            fabric: default_fabric(),
            credentials: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    pub fn with_fabric(mut self, fabric: impl Into<String>) -> Self {
        self.fabric = fabric.into();
        self
    }

    pub fn with_password(mut self, email: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::Password {
            email: email.into(),
            password: password.into(),
        });
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::ApiKey { key: key.into() });
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::Token {
            token: token.into(),
        });
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Check the fields the server cannot be reached without.
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::client(
                ErrorKind::Config,
                format!("unsupported URL scheme \"{}\"", url.scheme()),
            ));
        }
        if self.fabric.is_empty() {
            return Err(Error::client(ErrorKind::Config, "fabric name is empty"));
        }
        if self.timeout_ms == 0 {
            return Err(Error::client(ErrorKind::Config, "timeout must be positive"));
        }
        Ok(())
    }
}
