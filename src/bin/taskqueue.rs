//! Dispatches tasks and runs cleanup sweeps against the `PostgreSQL` store.
//!
//! Usage:
//!
//! ```text
//! taskqueue dispatch title=<title> method=<method> [key=value…]
//! taskqueue clean [key=value…]
//! ```
//!
//! `dispatch` accepts `tn` (template name), `title`, `qn`, `method`,
//! `service`, `priority`, `mid`, `timeout` (seconds) and `args` (a JSON
//! object). `clean` accepts the scheduler parameters `qn`, `bs`, `po`, `qs`,
//! `oc`, `gp`, `tid`, `mid` and `rd`.
//!
//! The store is reached through `DATABASE_URL`; queue settings are read from
//! the JSON file named by `TASKQUEUE_CONFIG` when it is set.
//!
//! There is no `run` command. Operations are registered in code, so scheduler
//! passes are triggered by the embedding application through
//! `QueueRunner::run_pass` with its own operation registry.

use diesel::PgConnection;
use diesel::r2d2::{ConnectionManager, PoolError};
use mockable::DefaultClock;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use taskqueue::logging::init_logging;
use taskqueue::queue::{
    adapters::postgres::{PostgresTaskRepository, QueuePgPool},
    config::{ConfigError, QueueSettings},
    domain::{ModelRef, QueueDomainError, TaskArguments},
    services::{DispatchRequest, HandlerParams, ParamsError, QueueServiceError, split_assignment},
};
use thiserror::Error;
use tokio::runtime::{Builder, Runtime};
use tracing::info;

const DATABASE_URL_ENV: &str = "DATABASE_URL";
const USAGE: &str = concat!(
    "usage: taskqueue <dispatch|clean> [key=value…]\n",
    "scheduler passes run inside the application that registers the operations",
);

/// Boxed error type for the main result.
type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
enum CommandError {
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),
    #[error("{DATABASE_URL_ENV} is not set")]
    MissingDatabaseUrl,
    #[error("failed to build connection pool: {0}")]
    Pool(#[source] PoolError),
    #[error("runtime init failed: {0}")]
    RuntimeInit(#[source] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Params(#[from] ParamsError),
    #[error(transparent)]
    Domain(#[from] QueueDomainError),
    #[error(transparent)]
    Service(#[from] QueueServiceError),
}

#[derive(Debug)]
enum Command {
    Dispatch,
    Clean,
}

impl Command {
    fn parse(arg: &str) -> Result<Self, CommandError> {
        match arg {
            "dispatch" => Ok(Self::Dispatch),
            "clean" => Ok(Self::Clean),
            other => Err(CommandError::InvalidArgs(format!(
                "unknown command '{other}'; {USAGE}"
            ))),
        }
    }
}

fn main() -> Result<(), BoxError> {
    init_logging();
    run(env::args().skip(1)).map_err(Into::into)
}

fn run(mut args: impl Iterator<Item = String>) -> Result<(), CommandError> {
    let command_arg = args
        .next()
        .ok_or_else(|| CommandError::InvalidArgs(USAGE.to_owned()))?;
    let command = Command::parse(&command_arg)?;
    let pairs = args
        .map(|arg| split_assignment(&arg))
        .collect::<Result<Vec<_>, _>>()?;

    let settings = QueueSettings::from_env()?;
    let repository = Arc::new(connect()?);
    let clock = Arc::new(DefaultClock);
    let runtime = build_runtime()?;

    match command {
        Command::Dispatch => {
            let (template, request) = dispatch_request(&pairs)?;
            let dispatcher = settings.dispatcher(repository, clock);
            let task = runtime.block_on(async {
                match template {
                    Some(name) => dispatcher.dispatch_template(&name, request).await,
                    None => dispatcher.dispatch(request).await,
                }
            })?;
            info!(task_id = %task.id(), state = %task.state(), "dispatch finished");
        }
        Command::Clean => {
            let params = HandlerParams::from_pairs(pairs)?;
            let summary =
                runtime.block_on(settings.archiver(repository, clock).sweep(&params))?;
            info!(
                archived = summary.archived,
                matched = summary.matched,
                "clean finished"
            );
        }
    }
    Ok(())
}

fn connect() -> Result<PostgresTaskRepository, CommandError> {
    let url = env::var(DATABASE_URL_ENV).map_err(|_| CommandError::MissingDatabaseUrl)?;
    let pool = QueuePgPool::builder()
        .build(ConnectionManager::<PgConnection>::new(url))
        .map_err(CommandError::Pool)?;
    Ok(PostgresTaskRepository::new(pool))
}

fn build_runtime() -> Result<Runtime, CommandError> {
    Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CommandError::RuntimeInit)
}

fn invalid_value(key: &str, value: &str, reason: impl std::fmt::Display) -> CommandError {
    CommandError::InvalidArgs(format!("invalid value '{value}' for '{key}': {reason}"))
}

/// Builds a dispatch request and optional template name from `key=value`
/// pairs.
fn dispatch_request(
    pairs: &[(String, String)],
) -> Result<(Option<String>, DispatchRequest), CommandError> {
    let mut template = None;
    let mut request = DispatchRequest::default().with_queued_by("taskqueue");
    for (key, value) in pairs {
        request = match key.as_str() {
            "tn" => {
                template = Some(value.clone());
                request
            }
            "title" => request.with_title(value),
            "qn" => request.with_queue_name(value),
            "method" => request.with_method_name(value),
            "service" => request.with_service_name(value),
            "priority" => request.with_priority(
                value
                    .parse()
                    .map_err(|err| invalid_value(key, value, err))?,
            ),
            "mid" => request.with_model_ref(ModelRef::new(
                value
                    .parse()
                    .map_err(|err| invalid_value(key, value, err))?,
            )),
            "timeout" => request.with_timeout(Duration::from_secs(
                value
                    .parse()
                    .map_err(|err| invalid_value(key, value, err))?,
            )),
            "args" => {
                let json = serde_json::from_str(value)
                    .map_err(|err| invalid_value(key, value, err))?;
                request.with_arguments(TaskArguments::from_value(json)?)
            }
            other => {
                return Err(CommandError::InvalidArgs(format!(
                    "unknown dispatch parameter '{other}'"
                )));
            }
        };
    }
    Ok((template, request))
}
