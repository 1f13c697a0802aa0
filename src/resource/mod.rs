//! Resource query engine
//!
//! Every collection (VMs, hosts, SRs, disks, networks, pools, tasks) is queried
//! through the same pattern: build a filter, assemble parameters, fetch and
//! normalize the response into raw records.
//!
//! # Architecture
//!
//! - [`filter`] - Filter expression builder
//! - [`query`] - Query parameter assembly (fields, filter, limit)
//! - [`fetcher`] - Single and collection fetches, dual response shapes
//! - [`actions`] - Mutating actions and partial updates
//! - `registry` - Collection definitions embedded from JSON
//!
//! # Example
//!
//! ```no_run
//! use futures::StreamExt;
//! use xoctl::resource::{fetcher, FilterClause, Separator};
//! use xoctl::xo::session::Session;
//!
//! # async fn example(session: &Session) -> xoctl::Result<()> {
//! let clauses = [FilterClause::any_of("tags", &["prod", "db"], Separator::Pipe)];
//! let mut vms = fetcher::query(session, "vms", &["uuid", "name_label"], &clauses, None).await?;
//! while let Some(vm) = vms.next().await {
//!     match vm {
//!         Ok(record) => println!("{}", record["name_label"]),
//!         Err(failure) => eprintln!("skipped: {}", failure),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod actions;
pub mod fetcher;
pub mod filter;
pub mod query;
mod registry;

pub use actions::{invoke_action, update};
pub use fetcher::{
    extract_json_value, fetch_many, fetch_one, fetch_report, query, CollectionShape, Entry,
    FetchReport, RawResourceRecord, RecordStream,
};
pub use filter::{build as build_filter, FilterClause, Predicate, Separator};
pub use query::{assemble, ResourceQuery};
pub use registry::*;
