mod config;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use config::Config;
use futures::StreamExt;
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use xoctl::resource::{self, FilterClause};
use xoctl::xo::http::format_xo_error;
use xoctl::{Credential, Session, SessionConfig, Task, TaskTracker};

/// Command-line client for the Xen Orchestra REST API
#[derive(Parser, Debug)]
#[command(name = "xoctl", version, about, long_about = None)]
struct Args {
    /// Xen Orchestra URL, e.g. https://xo.example
    #[arg(short, long, global = true)]
    endpoint: Option<String>,

    /// Authentication token
    #[arg(long, env = "XO_TOKEN", hide_env_values = true, global = true)]
    token: Option<String>,

    /// Accept self-signed or invalid TLS certificates
    #[arg(long, global = true)]
    insecure: bool,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the endpoint and token work
    Probe,
    /// List known collections and their actions
    Resources,
    /// Query a collection
    Query {
        collection: String,
        /// Comma-separated fields (defaults to the collection's field list)
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,
        /// Exact match, FIELD=VALUE
        #[arg(long = "where", value_name = "FIELD=VALUE")]
        equals: Vec<String>,
        /// Substring match, FIELD=VALUE
        #[arg(long, value_name = "FIELD=VALUE")]
        contains: Vec<String>,
        /// Any of the values, FIELD=V1,V2
        #[arg(long, value_name = "FIELD=V1,V2")]
        any: Vec<String>,
        /// All of the values, FIELD=V1,V2
        #[arg(long, value_name = "FIELD=V1,V2")]
        all: Vec<String>,
        /// Restrict to a parent, FIELD=UUID (e.g. pool=...)
        #[arg(long, value_name = "FIELD=UUID")]
        scope: Vec<String>,
        /// Maximum number of records, 0 for all
        #[arg(short, long)]
        limit: Option<u32>,
        /// Print only the id and name of each record
        #[arg(long, conflicts_with = "fields")]
        names: bool,
    },
    /// Fetch one resource
    Get {
        collection: String,
        id: String,
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,
    },
    /// Run an action on a resource
    Action {
        collection: String,
        id: String,
        verb: String,
        /// JSON body passed to the action
        #[arg(long)]
        body: Option<String>,
        /// Block until the task finishes
        #[arg(long)]
        wait: bool,
    },
    /// Update fields of a resource with a JSON object
    Update {
        collection: String,
        id: String,
        body: String,
    },
    /// Show the current state of a task
    Task { id: String },
    /// Wait for tasks to finish, one after another
    Wait {
        #[arg(required = true)]
        ids: Vec<String>,
        /// Do not print the final task states
        #[arg(long)]
        quiet: bool,
    },
    /// Manage saved settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the saved settings
    Show,
    /// Save the default query limit (0 = unlimited)
    SetLimit { limit: u32 },
    /// Save the endpoint
    SetEndpoint { endpoint: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {:?}", log_path))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("xoctl started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Ok(Some(guard))
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("xoctl").join("xoctl.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".xoctl").join("xoctl.log");
    }
    PathBuf::from("xoctl.log")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level)?;
    let mut config = Config::load();

    match &args.command {
        Command::Resources => {
            list_resources();
            return Ok(());
        }
        Command::Config { action } => {
            match action {
                ConfigAction::Show => println!("{}", serde_json::to_string_pretty(&config)?),
                ConfigAction::SetLimit { limit } => config.set_default_limit(*limit)?,
                ConfigAction::SetEndpoint { endpoint } => config.set_endpoint(endpoint)?,
            }
            return Ok(());
        }
        _ => {}
    }

    let session = connect(&args.endpoint, args.token.as_deref(), args.insecure, &config).await?;

    if let Err(err) = run(&session, args.command).await {
        match err.downcast_ref::<xoctl::XoError>() {
            Some(xo_err) => bail!("{} ({})", format_xo_error(xo_err), err),
            None => return Err(err),
        }
    }

    Ok(())
}

async fn connect(
    endpoint: &Option<String>,
    token: Option<&str>,
    insecure: bool,
    config: &Config,
) -> Result<Session> {
    let Some(endpoint) = config.effective_endpoint(endpoint.as_deref()) else {
        bail!("No endpoint configured. Use --endpoint or `xoctl config set-endpoint`");
    };
    let Some(token) = token else {
        bail!("No token given. Use --token or set XO_TOKEN");
    };

    let session_config = SessionConfig::new(&endpoint, Credential::new(token))
        .verify_tls(!(insecure || config.insecure))
        .default_limit(config.effective_limit());

    Session::open(session_config)
        .await
        .with_context(|| format!("Could not connect to {}", endpoint))
}

async fn run(session: &Session, command: Command) -> Result<()> {
    match command {
        Command::Probe => {
            println!(
                "{}",
                json!({
                    "endpoint": session.endpoint(),
                    "connected": session.is_connected(),
                    "default_limit": session.default_limit(),
                })
            );
        }
        Command::Query {
            collection,
            fields,
            equals,
            contains,
            any,
            all,
            scope,
            limit,
            names,
        } => {
            let summary = if names {
                let Some(def) = resource::get_resource(&collection) else {
                    bail!("--names needs a known collection, see `xoctl resources`");
                };
                Some(def)
            } else {
                None
            };

            let fields = if let Some(def) = summary {
                def.summary_fields()
            } else if fields.is_empty() {
                resource::get_resource(&collection)
                    .map(|r| r.default_fields.clone())
                    .unwrap_or_default()
            } else {
                fields
            };

            let mut clauses = Vec::new();
            for arg in &scope {
                let (field, uuid) = split_pair(arg)?;
                clauses.push(FilterClause::scoped(field, uuid));
            }
            for arg in &equals {
                let (field, value) = split_pair(arg)?;
                clauses.push(FilterClause::equals(field, value));
            }
            for arg in &contains {
                let (field, value) = split_pair(arg)?;
                clauses.push(FilterClause::contains(field, value));
            }
            for arg in &any {
                let (field, values) = split_pair(arg)?;
                let values: Vec<&str> = values.split(',').collect();
                let separator = resource::separator_for(&collection, field);
                clauses.push(FilterClause::any_of(field, &values, separator));
            }
            for arg in &all {
                let (field, values) = split_pair(arg)?;
                let values: Vec<&str> = values.split(',').collect();
                clauses.push(FilterClause::all_of(field, &values));
            }

            let mut records =
                resource::query(session, &collection, &fields, &clauses, limit).await?;
            let mut failures = 0usize;
            while let Some(item) = records.next().await {
                match item {
                    Ok(record) => match summary {
                        Some(def) => println!("{}", def.summarize(&record)),
                        None => println!("{}", Value::Object(record)),
                    },
                    Err(failure) => {
                        failures += 1;
                        eprintln!("warning: {}", failure);
                    }
                }
            }
            if failures > 0 {
                eprintln!("{} record(s) could not be fetched", failures);
            }
        }
        Command::Get {
            collection,
            id,
            fields,
        } => {
            let record = resource::fetch_one(session, &collection, &id, &fields).await?;
            println!("{}", Value::Object(record));
        }
        Command::Action {
            collection,
            id,
            verb,
            body,
            wait,
        } => {
            if let Some(def) = resource::get_resource(&collection).and_then(|r| r.action(&verb)) {
                if def.destructive {
                    eprintln!("note: {} is destructive", def.display_name);
                }
            }
            let body = body
                .map(|b| serde_json::from_str::<Value>(&b))
                .transpose()
                .context("--body is not valid JSON")?;
            let handle =
                resource::invoke_action(session, &collection, &id, &verb, body.as_ref()).await?;

            let tracker = TaskTracker::new(session);
            let mut task = tracker.start_from_reference(&handle.href).await?;
            if wait && !task.is_terminal() {
                let finished = tracker.wait_one(&task.id).await?;
                task.advance(finished);
            }
            println!("{}", task_json(&task));
        }
        Command::Update {
            collection,
            id,
            body,
        } => {
            let body: Value = serde_json::from_str(&body).context("body is not valid JSON")?;
            resource::update(session, &collection, &id, &body).await?;
        }
        Command::Task { id } => {
            let task = TaskTracker::new(session).poll(&id).await?;
            println!("{}", task_json(&task));
        }
        Command::Wait { ids, quiet } => {
            let report = TaskTracker::new(session).wait(&ids, !quiet).await?;
            for task in report.snapshots.iter().flatten() {
                println!("{}", task_json(task));
            }
            for failure in &report.failures {
                eprintln!("warning: {}", failure);
            }
            if !report.is_complete() {
                bail!("could not wait on task(s): {}", report.failed_ids().join(", "));
            }
        }
        Command::Resources | Command::Config { .. } => {}
    }

    Ok(())
}

fn split_pair(arg: &str) -> Result<(&str, &str)> {
    arg.split_once('=')
        .with_context(|| format!("expected FIELD=VALUE, got {:?}", arg))
}

fn task_json(task: &Task) -> Value {
    json!({
        "id": task.id,
        "status": task.status.as_str(),
        "progress": task.progress,
        "name": task.name,
        "method": task.method,
        "started_at": task.started_at.map(|t| t.to_rfc3339()),
        "ended_at": task.ended_at.map(|t| t.to_rfc3339()),
        "result": task.result_message,
    })
}

fn list_resources() {
    for key in resource::get_all_resource_keys() {
        let Some(def) = resource::get_resource(key) else {
            continue;
        };
        let verbs: Vec<&str> = def.actions.iter().map(|a| a.verb.as_str()).collect();
        println!(
            "{}",
            json!({
                "collection": key,
                "name": def.display_name,
                "fields": def.default_fields,
                "scopes": def.scopes,
                "actions": verbs,
            })
        );
    }
}
