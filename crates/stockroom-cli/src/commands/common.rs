use std::env;

use stockroom_core::auth::SessionHandle;
use stockroom_core::client::HttpProductsClient;
use stockroom_core::config::{AppConfig, AudioStorageConfig};
use stockroom_core::store::{MessageKind, StatusSnapshot};
use stockroom_core::{CollectionStore, Record, RecordId};

use crate::auth::AuthService;
use crate::config_profiles::{resolve_app_config, CliProfilesConfig};
use crate::error::CliError;

pub type ProductStore = CollectionStore<HttpProductsClient<SessionHandle>>;

const NAME_COLUMN_MAX: usize = 40;

/// Resolved profile plus the core configuration it produces.
pub struct CliContext {
    pub profile_name: String,
    pub config: AppConfig,
}

impl CliContext {
    pub fn load(profile: Option<&str>) -> Result<Self, CliError> {
        let profiles = CliProfilesConfig::load().map_err(CliError::Config)?;
        let profile_name = profiles.resolve_profile_name(profile);
        let config = resolve_app_config(profiles.profile(&profile_name), |key| env::var(key).ok())?;
        tracing::debug!(profile = %profile_name, "Resolved CLI configuration");
        Ok(Self {
            profile_name,
            config,
        })
    }

    /// Identity restored from the keychain, refreshed when expired.
    pub async fn identity(&self) -> Result<SessionHandle, CliError> {
        let service = AuthService::for_config(&self.profile_name, &self.config)?;
        let session = service
            .restore_session()
            .await?
            .ok_or_else(|| CliError::NotSignedIn(self.profile_name.clone()))?;
        Ok(SessionHandle::signed_in(session))
    }

    pub async fn open_store(&self) -> Result<ProductStore, CliError> {
        self.store_for(self.identity().await?)
    }

    /// Store whose requests read their bearer token from `identity`.
    pub fn store_for(&self, identity: SessionHandle) -> Result<ProductStore, CliError> {
        let client =
            HttpProductsClient::new(&self.config.api_base_url, self.config.http_timeout, identity)?;
        Ok(CollectionStore::new(client))
    }

    pub fn audio(&self) -> Result<&AudioStorageConfig, CliError> {
        self.config
            .audio
            .as_ref()
            .ok_or(CliError::AudioNotConfigured)
    }
}

pub fn parse_record_id(raw: &str) -> Result<RecordId, CliError> {
    Ok(raw.trim().parse::<RecordId>()?)
}

pub fn normalize_search_term(term: &str) -> Result<String, CliError> {
    let term = term.trim();
    if term.is_empty() {
        return Err(CliError::EmptySearchTerm);
    }
    Ok(term.to_string())
}

pub fn format_record_lines(records: &[Record]) -> Vec<String> {
    let id_width = records
        .iter()
        .map(|record| record.id.as_str().chars().count())
        .max()
        .unwrap_or(0);
    let name_width = records
        .iter()
        .map(|record| record.name.chars().count())
        .max()
        .unwrap_or(0)
        .min(NAME_COLUMN_MAX);

    records
        .iter()
        .map(|record| {
            let id = record.id.as_str();
            let name = truncate(&record.name, name_width);
            format!(
                "{id:<id_width$}  {name:<name_width$}  {:>6}  {:>10.2}",
                record.quantity, record.price
            )
        })
        .collect()
}

pub fn format_record(record: &Record) -> String {
    format!(
        "{}  {}  qty {}  price {:.2}",
        record.id, record.name, record.quantity, record.price
    )
}

fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let mut truncated = value
        .chars()
        .take(max_chars.saturating_sub(3))
        .collect::<String>();
    truncated.push_str("...");
    truncated
}

pub fn print_records(records: &[Record], as_json: bool) -> Result<(), CliError> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(records)?);
    } else if records.is_empty() {
        println!("No products found.");
    } else {
        for line in format_record_lines(records) {
            println!("{line}");
        }
    }
    Ok(())
}

/// Print the store's current transient message, if it is a success.
pub fn print_success(status: &StatusSnapshot) {
    if let Some(message) = &status.transient {
        if message.kind == MessageKind::Success {
            println!("{}", message.text);
        }
    }
}

/// Print the store's current transient message to the matching stream.
pub fn print_transient(status: &StatusSnapshot) {
    if let Some(message) = &status.transient {
        match message.kind {
            MessageKind::Success => println!("{}", message.text),
            MessageKind::Error => eprintln!("{}", message.text),
        }
    }
}
