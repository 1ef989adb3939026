//! Stockroom CLI - manage the remote product catalogue from a terminal
//!
//! Every command signs in with the profile's stored session, talks to the
//! products API through the collection store, and prints the result.

mod auth;
mod cli;
mod commands;
mod config_profiles;
mod error;
mod player;


use clap::{CommandFactory, Parser};
use stockroom_core::RecordDraft;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::add::run_add;
use crate::commands::auth_cmd::run_auth;
use crate::commands::common::CliContext;
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::delete::run_delete;
use crate::commands::edit::{run_edit, EditChanges};
use crate::commands::list::run_list;
use crate::commands::play::run_play;
use crate::commands::search::run_search;
use crate::commands::shell::run_shell;
use crate::error::CliError;

const DEFAULT_LOG_FILTER: &str = "stockroom=info";

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let profile = cli.profile.as_deref();

    match cli.command {
        Some(Commands::List { json }) => run_list(json, &CliContext::load(profile)?).await?,
        Some(Commands::Search { term, json }) => {
            run_search(&term, json, &CliContext::load(profile)?).await?;
        }
        Some(Commands::Add {
            name,
            quantity,
            price,
            json,
        }) => {
            let draft = RecordDraft::new(name, quantity, price);
            run_add(draft, json, &CliContext::load(profile)?).await?;
        }
        Some(Commands::Edit {
            id,
            name,
            quantity,
            price,
        }) => {
            let changes = EditChanges {
                name,
                quantity,
                price,
            };
            run_edit(&id, changes, &CliContext::load(profile)?).await?;
        }
        Some(Commands::Delete { id }) => run_delete(&id, &CliContext::load(profile)?).await?,
        Some(Commands::Play { id, print_url }) => {
            run_play(&id, print_url, &CliContext::load(profile)?).await?;
        }
        Some(Commands::Shell) => run_shell(&CliContext::load(profile)?).await?,
        Some(Commands::Completions { shell, output }) => {
            run_completions(shell, output.as_deref())?;
        }
        Some(Commands::Config { command }) => run_config(command, profile)?,
        Some(Commands::Auth { command }) => run_auth(command, profile).await?,
        None => {
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
