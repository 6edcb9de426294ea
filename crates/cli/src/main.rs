//! `docflow` CLI entry-point.
//!
//! Available sub-commands:
//! - `validate`       : validate a workflow JSON file.
//! - `run`            : execute a workflow file against a question.
//! - `save`           : validate and store a workflow file.
//! - `validate-stored`: re-validate a stored workflow and update its status.
//! - `execute`        : run a stored, active workflow and record the run.
//! - `migrate`        : run pending database migrations.

mod commands;
mod config;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;
use uuid::Uuid;

use crate::config::AppConfig;

#[derive(Parser)]
#[command(
    name = "docflow",
    about = "Document question-answering workflow engine",
    version
)]
struct Cli {
    /// Overrides `database.url` from configuration.
    #[arg(long, global = true, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a workflow definition JSON file.
    Validate {
        /// Path to the workflow JSON file.
        path: PathBuf,
    },
    /// Execute a workflow definition JSON file.
    Run {
        /// Path to the workflow JSON file.
        path: PathBuf,
        /// The question to answer.
        #[arg(long)]
        query: String,
        /// Extra instructions for the generation step.
        #[arg(long)]
        prompt: Option<String>,
        /// Whose documents retrieval may read.
        #[arg(long, default_value_t = Uuid::nil())]
        owner: Uuid,
        /// JSON array of chunks to retrieve from instead of the database.
        #[arg(long)]
        chunks: Option<PathBuf>,
    },
    /// Validate and store a workflow definition JSON file.
    Save {
        path: PathBuf,
        #[arg(long)]
        owner: Uuid,
    },
    /// Re-validate a stored workflow and update its status.
    ValidateStored { id: Uuid },
    /// Execute a stored workflow and record the execution.
    Execute {
        id: Uuid,
        #[arg(long)]
        query: String,
        #[arg(long)]
        prompt: Option<String>,
    },
    /// Run pending database migrations.
    Migrate,
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    logging::init_logging(&config.logging);

    if let Some(url) = cli.database_url {
        config.database.url = Some(url);
    }

    match dispatch(&config, cli.command).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Run one command. `Ok(false)` means the command completed but found the
/// workflow invalid.
async fn dispatch(config: &AppConfig, command: Command) -> Result<bool> {
    match command {
        Command::Validate { path } => commands::validate(&path),
        Command::Run {
            path,
            query,
            prompt,
            owner,
            chunks,
        } => commands::run(config, &path, &query, prompt.as_deref(), owner, chunks.as_deref())
            .await
            .map(|()| true),
        Command::Save { path, owner } => commands::save(config, &path, owner).await,
        Command::ValidateStored { id } => commands::validate_stored(config, id).await,
        Command::Execute { id, query, prompt } => {
            commands::execute(config, id, &query, prompt.as_deref())
                .await
                .map(|()| true)
        }
        Command::Migrate => commands::migrate(config).await.map(|()| true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_defaults_owner_to_nil() {
        let cli = Cli::try_parse_from(["docflow", "run", "wf.json", "--query", "hi"]).unwrap();
        match cli.command {
            Command::Run { owner, chunks, .. } => {
                assert_eq!(owner, Uuid::nil());
                assert!(chunks.is_none());
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn stored_commands_take_ids() {
        let id = Uuid::from_u128(42);
        let arg = id.to_string();
        let cli = Cli::try_parse_from(["docflow", "validate-stored", arg.as_str()]).unwrap();
        assert!(matches!(cli.command, Command::ValidateStored { id: parsed } if parsed == id));
    }
}
