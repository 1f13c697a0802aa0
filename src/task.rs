//! Task tracking
//!
//! Mutating actions return a reference to a server-side task. Tasks move from
//! `Pending` to `Success` or `Failure` and never back. Waiting uses the server's
//! long-poll contract: one request per task, held open until the task ends.

use crate::error::{Result, XoError};
use crate::resource::fetcher::{fetch_one, RawResourceRecord};
use crate::resource::query::encode_params;
use crate::xo::decode;
use crate::xo::href;
use crate::xo::http::WAIT_TIMEOUT;
use crate::xo::session::Session;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

/// Collection holding tasks
pub const TASKS: &str = "tasks";

/// Fields requested for every task snapshot
pub const TASK_FIELDS: &[&str] = &["id", "status", "start", "end", "properties", "result", "progress"];

/// Status of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Success,
    Failure,
}

impl TaskStatus {
    /// Map the server's status string; `interrupted` counts as a failure
    pub fn from_wire(s: &str) -> Self {
        match s {
            "success" => Self::Success,
            "failure" | "interrupted" => Self::Failure,
            "pending" => Self::Pending,
            other => {
                tracing::warn!("Unknown task status: {}", other);
                Self::Pending
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failure)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

/// Snapshot of a server-side task
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: String,
    pub status: TaskStatus,
    /// Completion ratio in `[0, 1]`
    pub progress: f64,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub result_message: Option<String>,
    pub name: Option<String>,
    pub method: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TaskRecord {
    id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    start: Option<f64>,
    #[serde(default)]
    end: Option<f64>,
    #[serde(default)]
    progress: Option<f64>,
    #[serde(default)]
    properties: Option<TaskProperties>,
    #[serde(default)]
    result: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct TaskProperties {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    progress: Option<f64>,
}

fn timestamp(ms: Option<f64>) -> Option<DateTime<Utc>> {
    ms.and_then(|ms| DateTime::from_timestamp_millis(ms as i64))
}

/// Accepts ratios and percentages; terminal tasks are always complete
fn normalize_progress(raw: Option<f64>, status: TaskStatus) -> f64 {
    if status.is_terminal() {
        return 1.0;
    }
    match raw {
        Some(p) if p.is_finite() => {
            let p = if p > 1.0 { p / 100.0 } else { p };
            p.clamp(0.0, 1.0)
        }
        _ => 0.0,
    }
}

fn result_message(result: Option<Value>) -> Option<String> {
    match result? {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Object(map) => match map.get("message").and_then(|v| v.as_str()) {
            Some(message) => Some(message.to_string()),
            None => Some(Value::Object(map).to_string()),
        },
        other => Some(other.to_string()),
    }
}

impl TryFrom<RawResourceRecord> for Task {
    type Error = XoError;

    fn try_from(record: RawResourceRecord) -> Result<Self> {
        let record: TaskRecord = serde_json::from_value(Value::Object(record))
            .map_err(|e| XoError::Decode(format!("invalid task: {}", e)))?;

        let properties = record.properties.unwrap_or_default();
        let status = record
            .status
            .as_deref()
            .map(TaskStatus::from_wire)
            .unwrap_or(TaskStatus::Pending);

        Ok(Self {
            id: record.id,
            status,
            progress: normalize_progress(record.progress.or(properties.progress), status),
            started_at: timestamp(record.start),
            ended_at: timestamp(record.end),
            result_message: result_message(record.result),
            name: properties.name,
            method: properties.method,
        })
    }
}

impl Task {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Wall time between start and end, once both are known
    pub fn duration(&self) -> Option<chrono::Duration> {
        Some(self.ended_at? - self.started_at?)
    }

    /// Replace this snapshot with a newer one.
    ///
    /// A terminal task stays terminal: a later snapshot claiming `Pending` is
    /// ignored and `false` is returned.
    pub fn advance(&mut self, next: Task) -> bool {
        if self.is_terminal() && !next.is_terminal() {
            tracing::warn!(
                "Ignoring pending snapshot for already {} task {}",
                self.status.as_str(),
                self.id
            );
            return false;
        }
        if !self.is_terminal() && next.is_terminal() {
            tracing::info!("Task {} finished: {}", next.id, next.status.as_str());
        }
        *self = next;
        true
    }
}

/// Handle returned by a mutating action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskHandle {
    pub href: String,
    pub id: String,
}

impl TaskHandle {
    pub fn from_href(href: &str) -> Result<Self> {
        Ok(Self {
            href: href.to_string(),
            id: href::resolve(href)?,
        })
    }
}

impl AsRef<str> for TaskHandle {
    fn as_ref(&self) -> &str {
        &self.id
    }
}

/// Observes and waits on tasks through a session
pub struct TaskTracker<'a> {
    session: &'a Session,
}

impl<'a> TaskTracker<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    /// Resolve a task href and fetch its first snapshot
    pub async fn start_from_reference(&self, reference: &str) -> Result<Task> {
        let id = href::resolve(reference)?;
        self.poll(&id).await
    }

    /// Fetch the current state of a task without waiting
    pub async fn poll(&self, id: &str) -> Result<Task> {
        let record = fetch_one(self.session, TASKS, id, TASK_FIELDS).await?;
        Task::try_from(record)
    }

    /// Block on one task until the server reports it finished
    pub async fn wait_one(&self, id: &str) -> Result<Task> {
        let connection = self.session.connection()?;

        let mut params = vec![("fields", TASK_FIELDS.join(","))];
        params.push(("wait", "result".to_string()));
        let url = format!(
            "{}{}",
            connection.api_url(&format!("{}/{}", TASKS, urlencoding::encode(id))),
            encode_params(&params)
        );

        tracing::debug!("Waiting on task {}", id);
        let body = connection
            .http()
            .get_with_timeout(&url, connection.credential(), WAIT_TIMEOUT)
            .await?;

        let not_found = || XoError::NotFound {
            collection: TASKS.to_string(),
            id: id.to_string(),
        };
        if body.trim().is_empty() {
            return Err(not_found());
        }

        let task = match decode::decode(&body)? {
            Value::Object(record) => Task::try_from(record)?,
            Value::Null => return Err(not_found()),
            _ => return Err(XoError::Decode(format!("expected a task object for {}", id))),
        };

        if task.is_terminal() {
            tracing::info!("Task {} finished: {}", task.id, task.status.as_str());
        } else {
            tracing::warn!("Wait on task {} returned while still pending", task.id);
        }
        Ok(task)
    }

    /// Wait on each task in order, one long-poll at a time.
    ///
    /// A failed wait is recorded for its id and the remaining ids are still
    /// waited on; snapshots of completed waits are kept. Snapshots are only
    /// collected when `return_snapshots` is set.
    pub async fn wait<S: AsRef<str>>(&self, ids: &[S], return_snapshots: bool) -> Result<WaitReport> {
        self.session.connection()?;

        let mut report = WaitReport {
            snapshots: return_snapshots.then(Vec::new),
            failures: Vec::new(),
        };
        for id in ids {
            let id = id.as_ref();
            match self.wait_one(id).await {
                Ok(task) => {
                    if let Some(snapshots) = report.snapshots.as_mut() {
                        snapshots.push(task);
                    }
                }
                Err(e) => {
                    tracing::warn!("Wait on task {} failed: {}", id, e);
                    report.failures.push(XoError::TaskWait {
                        id: id.to_string(),
                        source: Box::new(e),
                    });
                }
            }
        }

        Ok(report)
    }
}

/// Outcome of waiting on several tasks
#[derive(Debug, Default)]
pub struct WaitReport {
    /// Terminal snapshots in the order the ids were given, `None` in wait-only mode
    pub snapshots: Option<Vec<Task>>,
    /// One `XoError::TaskWait` per id whose wait failed
    pub failures: Vec<XoError>,
}

impl WaitReport {
    /// True when every wait completed
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Ids whose wait failed, in order
    pub fn failed_ids(&self) -> Vec<&str> {
        self.failures
            .iter()
            .filter_map(|e| match e {
                XoError::TaskWait { id, .. } => Some(id.as_str()),
                _ => None,
            })
            .collect()
    }
}
