//! Xen Orchestra session
//!
//! A [`Session`] is the explicit handle every operation goes through. It holds
//! the endpoint, the authentication token, the TLS policy and the default result
//! limit. Several sessions may exist side by side; none of them is global.

use super::decode;
use super::href::API_PREFIX;
use super::http::{XoHttpClient, REQUEST_TIMEOUT};
use crate::error::{Result, XoError};
use crate::resource::query::ResourceQuery;
use std::fmt;
use std::time::Duration;
use url::Url;

/// Library-wide default for the number of records a query returns
pub const DEFAULT_LIMIT: u32 = 25;

/// Authentication token sent with every request.
///
/// The token is never printed: `Debug` and `Display` are redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub(crate) fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// External storage for tokens, cleared on request at disconnect
pub trait CredentialStore: Send + Sync {
    fn clear(&self, endpoint: &str) -> std::io::Result<()>;
}

/// Connection settings
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub endpoint: String,
    pub credential: Credential,
    pub verify_tls: bool,
    pub default_limit: u32,
    pub timeout: Duration,
}

impl SessionConfig {
    pub fn new(endpoint: &str, credential: Credential) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            credential,
            verify_tls: true,
            default_limit: DEFAULT_LIMIT,
            timeout: REQUEST_TIMEOUT,
        }
    }

    pub fn verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    pub fn default_limit(mut self, limit: u32) -> Self {
        self.default_limit = limit;
        self
    }
}

/// Live connection state, only present once the probe succeeded
#[derive(Clone)]
pub struct Connection {
    endpoint: String,
    credential: Credential,
    http: XoHttpClient,
}

impl Connection {
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub(crate) fn credential(&self) -> &Credential {
        &self.credential
    }

    pub(crate) fn http(&self) -> &XoHttpClient {
        &self.http
    }

    /// Build an absolute URL for a REST path below `/rest/v0`
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}/{}", self.endpoint, API_PREFIX, path.trim_start_matches('/'))
    }
}

/// Operator session against one Xen Orchestra endpoint
pub struct Session {
    connection: Option<Connection>,
    default_limit: u32,
    store: Option<Box<dyn CredentialStore>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Create a disconnected session
    pub fn new() -> Self {
        Self {
            connection: None,
            default_limit: DEFAULT_LIMIT,
            store: None,
        }
    }

    /// Attach the store cleared by `disconnect(true)`
    pub fn with_credential_store(mut self, store: Box<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Create a session and connect it in one step
    pub async fn open(config: SessionConfig) -> Result<Self> {
        let mut session = Self::new();
        session.connect_with(config).await?;
        Ok(session)
    }

    /// Connect to `endpoint`, probing it before the session is considered live
    pub async fn connect(
        &mut self,
        endpoint: &str,
        credential: Credential,
        verify_tls: bool,
    ) -> Result<()> {
        let config = SessionConfig::new(endpoint, credential)
            .verify_tls(verify_tls)
            .default_limit(self.default_limit);
        self.connect_with(config).await
    }

    /// Connect with full settings
    pub async fn connect_with(&mut self, config: SessionConfig) -> Result<()> {
        // A failed (re)connect never leaves a half-usable session behind
        self.connection = None;

        let endpoint = normalize_endpoint(&config.endpoint)?;
        let http = XoHttpClient::new(config.verify_tls, config.timeout).map_err(|e| {
            XoError::Connection {
                endpoint: endpoint.clone(),
                reason: e.to_string(),
            }
        })?;

        let connection = Connection {
            endpoint,
            credential: config.credential,
            http,
        };

        probe(&connection).await.map_err(|e| {
            tracing::warn!("Connectivity probe to {} failed: {}", connection.endpoint, e);
            XoError::Connection {
                endpoint: connection.endpoint.clone(),
                reason: e.to_string(),
            }
        })?;

        tracing::info!("Connected to {}", connection.endpoint);
        self.default_limit = config.default_limit;
        self.connection = Some(connection);
        Ok(())
    }

    /// Drop the connection and reset the default limit. Safe to call repeatedly.
    pub fn disconnect(&mut self, clear_stored_credential: bool) {
        if let Some(connection) = self.connection.take() {
            tracing::info!("Disconnected from {}", connection.endpoint);
            if clear_stored_credential {
                if let Some(store) = &self.store {
                    if let Err(e) = store.clear(&connection.endpoint) {
                        tracing::warn!("Failed to clear stored credential: {}", e);
                    }
                }
            }
        }
        self.default_limit = DEFAULT_LIMIT;
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Normalized endpoint of the live connection
    pub fn endpoint(&self) -> Option<&str> {
        self.connection.as_ref().map(|c| c.endpoint.as_str())
    }

    pub fn default_limit(&self) -> u32 {
        self.default_limit
    }

    /// Set the limit used by queries that do not pass one (0 = unlimited)
    pub fn set_default_limit(&mut self, limit: u32) {
        tracing::debug!("Default limit set to {}", limit);
        self.default_limit = limit;
    }

    /// The live connection, or `NotConnected`
    pub fn connection(&self) -> Result<&Connection> {
        self.connection.as_ref().ok_or(XoError::NotConnected)
    }
}

/// Strip trailing separators and validate the endpoint URL
pub fn normalize_endpoint(endpoint: &str) -> Result<String> {
    let trimmed = endpoint.trim().trim_end_matches('/');

    let invalid = |reason: String| XoError::Connection {
        endpoint: endpoint.to_string(),
        reason,
    };

    let url = Url::parse(trimmed).map_err(|e| invalid(format!("invalid endpoint: {}", e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {:?}", url.scheme())));
    }
    if url.host_str().is_none() {
        return Err(invalid("endpoint has no host".to_string()));
    }

    Ok(trimmed.to_string())
}

/// Lightweight request proving the endpoint and token work: one task, one field
async fn probe(connection: &Connection) -> Result<()> {
    let query = ResourceQuery::new(vec!["id".to_string()], None, 1);
    let url = format!("{}{}", connection.api_url("tasks"), query.query_string());
    let body = connection.http.get(&url, &connection.credential).await?;
    decode::decode(&body)?;
    Ok(())
}
