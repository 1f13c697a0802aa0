//! Xen Orchestra REST client
//!
//! Typed access to a Xen Orchestra REST API: resource queries with filters,
//! field selection and limits, single-resource lookups, mutating actions, and
//! tracking of the server-side tasks those actions start.
//!
//! ```no_run
//! use xoctl::task::TaskTracker;
//! use xoctl::xo::session::{Credential, Session, SessionConfig};
//!
//! # async fn example() -> xoctl::Result<()> {
//! let session = Session::open(SessionConfig::new(
//!     "https://xo.example",
//!     Credential::new("token"),
//! ))
//! .await?;
//!
//! let handle = xoctl::resource::invoke_action(&session, "vms", "0b7a3c1e", "start", None).await?;
//! let report = TaskTracker::new(&session).wait(&[handle], true).await?;
//! for failure in &report.failures {
//!     eprintln!("{}", failure);
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod resource;
pub mod task;
pub mod xo;

pub use error::{ItemError, Result, XoError};
pub use task::{Task, TaskHandle, TaskStatus, TaskTracker, WaitReport};
pub use xo::session::{Credential, CredentialStore, Session, SessionConfig, DEFAULT_LIMIT};
