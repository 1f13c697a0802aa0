//! HTTP utilities for Xen Orchestra REST API calls

use crate::error::{Result, XoError};
use crate::xo::session::Credential;
use reqwest::header::{CONTENT_TYPE, COOKIE};
use reqwest::{Client, Method, RequestBuilder};
use serde_json::Value;
use std::time::Duration;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Fixed timeout applied to every ordinary request
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for long-poll task waits, which the server holds open until the task ends
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Name of the cookie carrying the authentication token
const AUTH_COOKIE: &str = "authenticationToken";

/// Sanitize response body for logging
/// Truncates long responses and drops control characters
fn sanitize_for_log(body: &str) -> String {
    let char_count = body.chars().count();
    let truncated = if char_count > MAX_LOG_BODY_LENGTH {
        let head: String = body.chars().take(MAX_LOG_BODY_LENGTH).collect();
        format!("{}... [truncated, {} bytes total]", head, body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// HTTP client wrapper for Xen Orchestra API calls
#[derive(Clone)]
pub struct XoHttpClient {
    client: Client,
}

impl XoHttpClient {
    /// Create a new HTTP client
    pub fn new(verify_tls: bool, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("xoctl/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .danger_accept_invalid_certs(!verify_tls)
            .build()?;

        Ok(Self { client })
    }

    /// Make a GET request and return the raw response body
    pub async fn get(&self, url: &str, credential: &Credential) -> Result<String> {
        tracing::debug!("GET {}", url);
        let request = self.authorized(Method::GET, url, credential);
        Self::send(request).await
    }

    /// Make a GET request whose timeout replaces the client default
    pub async fn get_with_timeout(
        &self,
        url: &str,
        credential: &Credential,
        timeout: Duration,
    ) -> Result<String> {
        tracing::debug!("GET {} (timeout {:?})", url, timeout);
        let request = self.authorized(Method::GET, url, credential).timeout(timeout);
        Self::send(request).await
    }

    /// Make a POST request with an optional JSON body
    pub async fn post(
        &self,
        url: &str,
        credential: &Credential,
        body: Option<&Value>,
    ) -> Result<String> {
        tracing::debug!("POST {}", url);

        let mut request = self.authorized(Method::POST, url, credential);
        if let Some(body) = body {
            request = request.json(body);
        }

        Self::send(request).await
    }

    /// Make a PATCH request with a JSON body
    pub async fn patch(&self, url: &str, credential: &Credential, body: &Value) -> Result<String> {
        tracing::debug!("PATCH {}", url);

        let request = self
            .authorized(Method::PATCH, url, credential)
            .header(CONTENT_TYPE, "application/json")
            .json(body);

        Self::send(request).await
    }

    fn authorized(&self, method: Method, url: &str, credential: &Credential) -> RequestBuilder {
        self.client.request(method, url).header(
            COOKIE,
            format!("{}={}", AUTH_COOKIE, credential.expose()),
        )
    }

    async fn send(request: RequestBuilder) -> Result<String> {
        let response = request.send().await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            // Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));
            return Err(XoError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }
}

/// Format an API error for display
pub fn format_xo_error(error: &XoError) -> String {
    match error.status() {
        Some(401) => "Authentication failed. Check your token.".to_string(),
        Some(403) => "Permission denied for this operation.".to_string(),
        Some(404) => "Resource not found.".to_string(),
        Some(409) => "Resource conflict. The resource may be busy or in use.".to_string(),
        Some(s) if s >= 500 => "Xen Orchestra server error. Please try again.".to_string(),
        _ => {
            let text = error.to_string();
            let sanitized: String = text
                .chars()
                .filter(|c| c.is_ascii_graphic() || *c == ' ')
                .take(120)
                .collect();
            if sanitized.len() < text.len() {
                format!("{}...", sanitized)
            } else {
                sanitized
            }
        }
    }
}
