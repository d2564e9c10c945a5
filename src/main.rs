//! Berth CLI entrypoint: activates a pull-request review workspace for the
//! current git checkout.

use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use berth::activation::{self, ActivationCoordinator, ActivationError, ReviewWorkspace};
use berth::config::BerthConfig;
use berth::git::{Git2Extension, GitHostError, GitStatusReader};
use berth::host::{LoggingUiRegistry, StaticSettings};
use berth::workspace::{JsonWorkspaceState, WorkspaceStateError};
use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
enum AppError {
    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error(transparent)]
    Git(#[from] GitHostError),

    #[error(transparent)]
    WorkspaceState(#[from] WorkspaceStateError),

    #[error(transparent)]
    Activation(#[from] ActivationError),

    #[error("I/O error: {message}")]
    Io { message: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            if writeln!(io::stderr().lock(), "{error}").is_err() {
                return ExitCode::FAILURE;
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), AppError> {
    let config = load_config()?;
    init_tracing();

    let start_path = resolve_start_path(&config)?;
    let git = Arc::new(Git2Extension::discover(&start_path)?);
    let settings_source = Arc::new(StaticSettings::new(config.auth_settings()));
    let ui = Arc::new(LoggingUiRegistry::new());

    let state_path = config
        .state_file
        .clone()
        .map_or_else(|| start_path.join(".berth-state.json"), Utf8PathBuf::from);
    let workspace_state = Arc::new(JsonWorkspaceState::load(state_path)?);

    let mut coordinator =
        ActivationCoordinator::new(git, settings_source, ui, workspace_state);
    if let Some(timeout) = config.discovery_timeout() {
        coordinator = coordinator.with_discovery_timeout(timeout);
    }

    let (_cancel, signal) = activation::cancellation();
    let running = coordinator.activate(signal).await?;

    // An editor host's git extension would drive this; standalone we run the
    // first status recompute ourselves to trip the initialization chain.
    let reader = GitStatusReader::open(running.repository_handle().workdir())?;
    reader.refresh(running.repository())?;

    let workspace = running.settled().await?;
    write_summary(&workspace)
}

/// Loads configuration from CLI, environment, and files.
fn load_config() -> Result<BerthConfig, AppError> {
    BerthConfig::load().map_err(|error| AppError::Configuration {
        message: error.to_string(),
    })
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();
}

fn resolve_start_path(config: &BerthConfig) -> Result<Utf8PathBuf, AppError> {
    if let Some(path) = &config.repo_path {
        return Ok(Utf8PathBuf::from(path));
    }
    let current = std::env::current_dir().map_err(|error| AppError::Io {
        message: error.to_string(),
    })?;
    Utf8PathBuf::from_path_buf(current).map_err(|path| AppError::Configuration {
        message: format!("current directory is not valid UTF-8: {}", path.display()),
    })
}

fn write_summary(workspace: &ReviewWorkspace) -> Result<(), AppError> {
    let context = workspace.review_mode.context();
    let branch = context.branch.as_deref().unwrap_or("(detached)");
    let remembered = context
        .remembered_pull_request
        .map_or_else(|| "none".to_owned(), |number| format!("#{number}"));
    let session = workspace
        .review_mode
        .repository()
        .github_session()
        .map(|session| {
            format!(
                "{} ({})",
                session.api_base(),
                if session.is_authenticated() {
                    "authenticated"
                } else {
                    "anonymous"
                }
            )
        })
        .unwrap_or_else(|| "not connected".to_owned());

    let mut stdout = io::stdout().lock();
    writeln!(
        stdout,
        "Review workspace ready\nBranch: {branch}\nGitHub: {session}\nRemembered pull request: {remembered}"
    )
    .map_err(|error| AppError::Io {
        message: error.to_string(),
    })
}
