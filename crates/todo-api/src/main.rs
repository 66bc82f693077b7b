//! To-do API entry point.
//!
//! `todo-api <function>` reads gateway events from stdin, one JSON document
//! per line, runs the named handler on each and writes one JSON response
//! line per event to stdout. State built at startup, including the JWKS
//! cache, lives for the whole process. Logs go to stderr.
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment
//! 2. Initialize tracing
//! 3. Create the database pool (connects on first use)
//! 4. Create the JWKS client, verifier and authorizer
//! 5. Create the S3 attachment storage and services
//! 6. Serve events until stdin closes

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use todo_api::auth::{Authorizer, JwksClient, JwtVerifier};
use todo_api::config::{Config, LogFormat};
use todo_api::handlers::{self, AppState, Function};
use todo_api::repositories::PgTodoRepository;
use todo_api::services::{AttachmentService, S3AttachmentStorage, TodoService};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "todo=info,todo_api=info,common=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let function: Function = std::env::args()
        .nth(1)
        .context("Usage: todo-api <function>")?
        .parse()?;

    let config = Config::from_env().context("Failed to load configuration")?;
    init_tracing(config.log_format);

    info!(function = %function, "Starting to-do API");

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(5))
        .connect_lazy(&config.database_url)
        .context("Invalid database URL")?;

    let jwks_client = Arc::new(JwksClient::new(
        config.jwks_url.clone(),
        config.jwks_refresh_interval,
        config.jwks_fetch_timeout,
    ));
    let authorizer = Authorizer::new(JwtVerifier::from_config(&config, jwks_client));

    let storage = S3AttachmentStorage::new(config.s3_bucket.clone(), config.aws_region.clone()).await;
    let attachments = Arc::new(AttachmentService::from_config(&config, Arc::new(storage)));
    let todos = TodoService::new(Arc::new(PgTodoRepository::new(pool)), Arc::clone(&attachments));
    let state = AppState::new(todos, attachments);

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let handled = handlers::serve(function, &authorizer, &state, stdin, tokio::io::stdout())
        .await
        .context("Failed to serve events")?;

    info!(function = %function, handled, "Input closed, shutting down");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}
