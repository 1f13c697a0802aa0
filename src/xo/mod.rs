//! Xen Orchestra API plumbing
//!
//! This module provides the connection-level pieces shared by every resource
//! type: the session handle, the HTTP wrapper, href resolution and response
//! decoding.
//!
//! # Module Structure
//!
//! - [`session`] - Session handle: endpoint, token, TLS policy, default limit
//! - [`http`] - HTTP utilities for REST API calls
//! - [`href`] - Resource reference parsing
//! - [`decode`] - Duplicate-key tolerant JSON decoding
//!
//! # Example
//!
//! ```no_run
//! use xoctl::xo::session::{Credential, Session};
//!
//! # async fn example() -> xoctl::Result<()> {
//! let mut session = Session::new();
//! session
//!     .connect("https://xo.example/", Credential::new("token"), true)
//!     .await?;
//! assert_eq!(session.endpoint(), Some("https://xo.example"));
//! # Ok(())
//! # }
//! ```

pub mod decode;
pub mod href;
pub mod http;
pub mod session;
