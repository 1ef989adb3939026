//! Line-oriented interactive session over a single collection store.
//!
//! The store is initialized once when the shell opens; afterwards every
//! command works against the live collection, the way a long-lived front end
//! would.

use std::fmt::Display;
use std::io::{self, Write};

use stockroom_core::auth::SessionHandle;
use stockroom_core::store::MessageKind;
use stockroom_core::{RecordDraft, RecordId};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::auth::AuthService;
use crate::commands::common::{
    format_record, print_records, print_transient, CliContext, ProductStore,
};
use crate::commands::play::{playback_for, reconnect_signer, CliPlayback};
use crate::error::CliError;

const HELP: &str = "\
Commands:
  list                          show every product
  search [TERM]                 filter by name on the server (no term clears)
  add QUANTITY PRICE NAME...    create a product
  edit ID                       start editing a product
  set name|quantity|price VALUE change the draft being edited
  show                          print the draft being edited
  save                          send the draft
  cancel                        discard the draft
  delete ID                     delete a product
  play ID                       play a product's audio preview
  status                        show busy and error state
  help                          show this help
  quit                          leave the shell";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftField {
    Name,
    Quantity,
    Price,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Empty,
    List,
    Search(String),
    Add(RecordDraft),
    Edit(String),
    Set(DraftField, String),
    Show,
    Save,
    Cancel,
    Delete(String),
    Play(String),
    Status,
    Help,
    Quit,
}

pub fn parse_shell_line(line: &str) -> Result<ShellCommand, String> {
    let line = line.trim();
    let (verb, rest) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(verb, rest)| (verb, rest.trim()));

    let command = match verb.to_ascii_lowercase().as_str() {
        "" => ShellCommand::Empty,
        "list" | "ls" => ShellCommand::List,
        "search" | "find" => ShellCommand::Search(rest.to_string()),
        "add" => {
            let mut parts = rest.splitn(3, char::is_whitespace);
            match (parts.next(), parts.next(), parts.next()) {
                (Some(quantity), Some(price), Some(name)) if !quantity.is_empty() => {
                    ShellCommand::Add(RecordDraft::new(name.trim(), quantity, price))
                }
                _ => return Err("usage: add QUANTITY PRICE NAME...".to_string()),
            }
        }
        "edit" => ShellCommand::Edit(required(rest, "usage: edit ID")?),
        "set" => {
            let (field, value) = rest
                .split_once(char::is_whitespace)
                .map(|(field, value)| (field, value.trim()))
                .ok_or_else(|| "usage: set name|quantity|price VALUE".to_string())?;
            let field = match field.to_ascii_lowercase().as_str() {
                "name" => DraftField::Name,
                "quantity" | "qty" => DraftField::Quantity,
                "price" => DraftField::Price,
                other => return Err(format!("unknown field '{other}'")),
            };
            ShellCommand::Set(field, value.to_string())
        }
        "show" => ShellCommand::Show,
        "save" => ShellCommand::Save,
        "cancel" => ShellCommand::Cancel,
        "delete" | "rm" => ShellCommand::Delete(required(rest, "usage: delete ID")?),
        "play" => ShellCommand::Play(required(rest, "usage: play ID")?),
        "status" => ShellCommand::Status,
        "help" | "?" => ShellCommand::Help,
        "quit" | "exit" | "q" => ShellCommand::Quit,
        other => return Err(format!("unknown command '{other}'; type `help`")),
    };
    Ok(command)
}

fn required(value: &str, usage: &str) -> Result<String, String> {
    if value.is_empty() {
        Err(usage.to_string())
    } else {
        Ok(value.to_string())
    }
}

pub async fn run_shell(context: &CliContext) -> Result<(), CliError> {
    let auth = AuthService::for_config(&context.profile_name, &context.config)?;
    let identity = context.identity().await?;
    let store = context.store_for(identity.clone())?;
    let mut playback = match playback_for(context, &identity).await {
        Ok(playback) => Some(playback),
        Err(CliError::AudioNotConfigured) => None,
        Err(error) => {
            eprintln!("Audio previews unavailable: {error}");
            None
        }
    };

    match store.initialize().await {
        Ok(_) => print_records(&store.records(), false)?,
        Err(error) => report_failure(&store, &error),
    }
    println!("Type `help` for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{}", prompt(&store));
        io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        match parse_shell_line(&line) {
            Ok(ShellCommand::Quit) => break,
            Ok(ShellCommand::Empty) => {}
            Ok(command) => {
                keep_session_fresh(&auth, &identity, context, &mut playback).await;
                execute(&store, playback.as_ref(), command).await?;
            }
            Err(message) => eprintln!("{message}"),
        }
    }
    Ok(())
}

/// Refresh an expired session before the next command and re-sign audio for
/// the new identity. Failures are reported and the command still runs, so it
/// surfaces the usual "Not signed in" error.
async fn keep_session_fresh(
    auth: &AuthService,
    identity: &SessionHandle,
    context: &CliContext,
    playback: &mut Option<CliPlayback>,
) {
    match auth.refresh_if_expired(identity).await {
        Ok(false) => {}
        Ok(true) => {
            if let Some(playback) = playback.as_mut() {
                if let Err(error) = reconnect_signer(playback, context, identity).await {
                    eprintln!("Audio previews unavailable: {error}");
                }
            }
        }
        Err(error) => {
            tracing::warn!("Session refresh failed: {}", error);
            eprintln!("Session expired and could not be refreshed: {error}");
            eprintln!("Run `stockroom auth login` to sign in again.");
        }
    }
}

pub fn prompt(store: &ProductStore) -> String {
    let session = store.edit_session();
    match session.target() {
        Some(id) => format!("stockroom [editing {id}]> "),
        None => "stockroom> ".to_string(),
    }
}

async fn execute(
    store: &ProductStore,
    playback: Option<&CliPlayback>,
    command: ShellCommand,
) -> Result<(), CliError> {
    match command {
        ShellCommand::Empty | ShellCommand::Quit => {}
        ShellCommand::Help => println!("{HELP}"),
        ShellCommand::List => match store.refresh().await {
            Ok(_) => print_records(&store.records(), false)?,
            Err(error) => report_failure(store, &error),
        },
        ShellCommand::Search(term) => match store.search(term).await {
            Ok(_) => print_records(&store.records(), false)?,
            Err(error) => report_failure(store, &error),
        },
        ShellCommand::Add(draft) => match store.add_record(&draft).await {
            Ok(record) => {
                print_transient(&store.status());
                println!("{}", format_record(&record));
            }
            Err(error) => report_failure(store, &error),
        },
        ShellCommand::Edit(raw_id) => match parse_id(&raw_id) {
            Some(id) => match store.begin_edit(&id) {
                Ok(draft) => print_draft(&draft),
                Err(error) => report_failure(store, &error),
            },
            None => eprintln!("Product ID cannot be empty"),
        },
        ShellCommand::Set(field, value) => {
            let mut draft = store.edit_session().draft().clone();
            match field {
                DraftField::Name => draft.name = value,
                DraftField::Quantity => draft.quantity = value,
                DraftField::Price => draft.price = value,
            }
            if let Err(error) = store.update_draft(draft) {
                report_failure(store, &error);
            }
        }
        ShellCommand::Show => {
            let session = store.edit_session();
            if session.is_active() {
                print_draft(session.draft());
            } else {
                println!("No edit in progress.");
            }
        }
        ShellCommand::Save => {
            let Some(id) = store.edit_session().target().cloned() else {
                println!("No edit in progress.");
                return Ok(());
            };
            match store.commit_edit(&id).await {
                Ok(()) => print_transient(&store.status()),
                Err(error) => report_failure(store, &error),
            }
        }
        ShellCommand::Cancel => store.cancel_edit(),
        ShellCommand::Delete(raw_id) => match parse_id(&raw_id) {
            Some(id) => match store.remove_record(&id).await {
                Ok(()) => print_transient(&store.status()),
                Err(error) => report_failure(store, &error),
            },
            None => eprintln!("Product ID cannot be empty"),
        },
        ShellCommand::Play(raw_id) => {
            let Some(playback) = playback else {
                eprintln!("{}", CliError::AudioNotConfigured);
                return Ok(());
            };
            if let Some(id) = parse_id(&raw_id) {
                if let Err(error) = store.play_audio_for(&id, playback).await {
                    report_failure(store, &error);
                }
            }
        }
        ShellCommand::Status => {
            let status = store.status();
            println!("busy: {}", status.busy);
            println!(
                "error: {}",
                status.error_message.as_deref().unwrap_or("(none)")
            );
            println!("search: {:?}", store.search_state());
        }
    }
    Ok(())
}

fn parse_id(raw: &str) -> Option<RecordId> {
    raw.trim().parse().ok()
}

fn print_draft(draft: &RecordDraft) {
    println!(
        "name: {}\nquantity: {}\nprice: {}",
        draft.name, draft.quantity, draft.price
    );
}

/// Every failure posts a transient error on the store; prefer its wording.
fn report_failure(store: &ProductStore, error: &dyn Display) {
    match store.status().transient {
        Some(message) if message.kind == MessageKind::Error => eprintln!("{}", message.text),
        _ => eprintln!("{error}"),
    }
}
