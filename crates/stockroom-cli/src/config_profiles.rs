//! Persistent CLI profile configuration.
//!
//! Profile values take precedence over the matching environment variables
//! when the core configuration is resolved.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use stockroom_core::config::{
    AppConfig, ENV_API_BASE_URL, ENV_AUDIO_BUCKET, ENV_AUDIO_ENDPOINT,
    ENV_AUDIO_IDENTITY_POOL_ID, ENV_AUDIO_REGION, ENV_AUTH_DOMAIN, ENV_AUTH_SCOPE, ENV_CLIENT_ID, ENV_LOGOUT_URI, ENV_REDIRECT_URI,
};
use stockroom_core::util::normalize_text_option;

const CONFIG_FILE_NAME: &str = "cli-config.json";
pub const ENV_PROFILE: &str = "STOCKROOM_PROFILE";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfilesConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub active_profile: Option<String>,
    #[serde(default)]
    pub profiles: BTreeMap<String, CliProfile>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfile {
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub auth_domain: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub redirect_uri: Option<String>,
    #[serde(default)]
    pub logout_uri: Option<String>,
    #[serde(default)]
    pub auth_scope: Option<String>,
    #[serde(default)]
    pub audio_region: Option<String>,
    #[serde(default)]
    pub audio_bucket: Option<String>,
    #[serde(default)]
    pub audio_endpoint: Option<String>,
    #[serde(default)]
    pub audio_identity_pool_id: Option<String>,
}

const fn default_config_version() -> u32 {
    1
}

pub fn default_config_path() -> Result<PathBuf, String> {
    dirs::config_dir()
        .map(|dir| dir.join("stockroom").join(CONFIG_FILE_NAME))
        .ok_or_else(|| "Failed to resolve CLI config directory".to_string())
}

pub fn normalize_profile_name(value: Option<&str>) -> Option<String> {
    let value = value?.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl CliProfilesConfig {
    pub fn load() -> Result<Self, String> {
        Self::load_from_path(&default_config_path()?)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|error| format!("Failed to read config at {}: {}", path.display(), error))?;
        let mut config = serde_json::from_str::<Self>(&raw)
            .map_err(|error| format!("Failed to parse config at {}: {}", path.display(), error))?;
        config.normalize();
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf, String> {
        let path = default_config_path()?;
        self.save_to_path(&path)?;
        Ok(path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    error
                )
            })?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)
            .map_err(|error| format!("Failed to serialize config: {error}"))?;
        std::fs::write(path, serialized)
            .map_err(|error| format!("Failed to write config at {}: {}", path.display(), error))
    }

    pub fn resolve_profile_name(&self, explicit: Option<&str>) -> String {
        self.resolve_profile_name_with(explicit, std::env::var(ENV_PROFILE).ok().as_deref())
    }

    fn resolve_profile_name_with(&self, explicit: Option<&str>, from_env: Option<&str>) -> String {
        normalize_profile_name(explicit)
            .or_else(|| normalize_profile_name(from_env))
            .or_else(|| normalize_profile_name(self.active_profile.as_deref()))
            .unwrap_or_else(|| "default".to_string())
    }

    pub fn profile(&self, name: &str) -> Option<&CliProfile> {
        self.profiles.get(name)
    }

    pub fn profile_mut_or_default(&mut self, name: &str) -> &mut CliProfile {
        self.profiles.entry(name.to_string()).or_default()
    }

    fn normalize(&mut self) {
        self.active_profile = normalize_profile_name(self.active_profile.as_deref());
        for profile in self.profiles.values_mut() {
            profile.normalize();
        }
    }
}

impl CliProfile {
    /// Profile value for a core configuration key, if the profile sets it.
    pub fn value_for(&self, key: &str) -> Option<String> {
        let value = match key {
            ENV_API_BASE_URL => &self.api_base_url,
            ENV_AUTH_DOMAIN => &self.auth_domain,
            ENV_CLIENT_ID => &self.client_id,
            ENV_REDIRECT_URI => &self.redirect_uri,
            ENV_LOGOUT_URI => &self.logout_uri,
            ENV_AUTH_SCOPE => &self.auth_scope,
            ENV_AUDIO_REGION => &self.audio_region,
            ENV_AUDIO_BUCKET => &self.audio_bucket,
            ENV_AUDIO_ENDPOINT => &self.audio_endpoint,
            ENV_AUDIO_IDENTITY_POOL_ID => &self.audio_identity_pool_id,
            _ => return None,
        };
        normalize_text_option(value.clone())
    }

    fn normalize(&mut self) {
        for field in [
            &mut self.api_base_url,
            &mut self.auth_domain,
            &mut self.client_id,
            &mut self.redirect_uri,
            &mut self.logout_uri,
            &mut self.auth_scope,
            &mut self.audio_region,
            &mut self.audio_bucket,
            &mut self.audio_endpoint,
            &mut self.audio_identity_pool_id,
        ] {
            *field = normalize_text_option(field.take());
        }
    }
}

/// Resolve core configuration: profile first, then `lookup` (the environment
/// in production).
pub fn resolve_app_config(
    profile: Option<&CliProfile>,
    lookup: impl Fn(&str) -> Option<String>,
) -> stockroom_core::Result<AppConfig> {
    AppConfig::from_lookup(|key| {
        profile
            .and_then(|profile| profile.value_for(key))
            .or_else(|| lookup(key))
    })
}
