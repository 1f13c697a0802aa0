//! Error types for the Xen Orchestra client

use thiserror::Error;

/// Errors raised by the client library
#[derive(Error, Debug)]
pub enum XoError {
    #[error("not connected: call Session::connect first")]
    NotConnected,

    #[error("failed to connect to {endpoint}: {reason}")]
    Connection { endpoint: String, reason: String },

    #[error("malformed resource reference: {0:?}")]
    HrefFormat(String),

    #[error("{collection}/{id} not found")]
    NotFound { collection: String, id: String },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("API request failed [{status}]: {body}")]
    Api { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("waiting on task {id} failed: {source}")]
    TaskWait {
        id: String,
        #[source]
        source: Box<XoError>,
    },
}

impl XoError {
    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            Self::TaskWait { source, .. } => source.status(),
            _ => None,
        }
    }
}

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, XoError>;

/// A failure on one element of a collection fetch.
///
/// The rest of the collection is still delivered.
#[derive(Error, Debug)]
#[error("{reference}: {source}")]
pub struct ItemError {
    pub reference: String,
    #[source]
    pub source: XoError,
}
