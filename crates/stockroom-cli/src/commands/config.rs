use std::env;

use stockroom_core::util::{is_http_url, normalize_text_option};

use crate::cli::ConfigCommands;
use crate::config_profiles::{resolve_app_config, CliProfile, CliProfilesConfig};
use crate::error::CliError;

/// Values passed to `stockroom config init`; `None` keeps the stored value.
#[derive(Debug, Default)]
pub struct ProfileUpdates {
    pub api_base_url: Option<String>,
    pub auth_domain: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub logout_uri: Option<String>,
    pub scope: Option<String>,
    pub audio_region: Option<String>,
    pub audio_bucket: Option<String>,
    pub audio_endpoint: Option<String>,
    pub audio_identity_pool_id: Option<String>,
}

pub fn run_config(command: ConfigCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            profile,
            api_base_url,
            auth_domain,
            client_id,
            redirect_uri,
            logout_uri,
            scope,
            audio_region,
            audio_bucket,
            audio_endpoint,
            audio_identity_pool_id,
            no_activate,
        } => run_config_init(
            profile.as_deref().or(global_profile),
            ProfileUpdates {
                api_base_url,
                auth_domain,
                client_id,
                redirect_uri,
                logout_uri,
                scope,
                audio_region,
                audio_bucket,
                audio_endpoint,
                audio_identity_pool_id,
            },
            no_activate,
        ),
    }
}

pub fn run_config_init(
    profile_name: Option<&str>,
    updates: ProfileUpdates,
    no_activate: bool,
) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);
    apply_profile_updates(&mut config, &profile_name, updates, no_activate)?;

    let path = config.save().map_err(CliError::Config)?;
    println!("Saved profile '{profile_name}' to {}", path.display());

    if let Err(error) = resolve_app_config(config.profile(&profile_name), |key| env::var(key).ok()) {
        println!("Warning: profile is not usable yet: {error}");
    }
    Ok(())
}

/// Merge `updates` into the named profile and optionally activate it.
pub fn apply_profile_updates(
    config: &mut CliProfilesConfig,
    profile_name: &str,
    updates: ProfileUpdates,
    no_activate: bool,
) -> Result<(), CliError> {
    let updates = validate_updates(updates)?;
    let profile = config.profile_mut_or_default(profile_name);
    merge(profile, updates);

    if !no_activate || config.active_profile.is_none() {
        config.active_profile = Some(profile_name.to_string());
    }
    Ok(())
}

fn validate_updates(updates: ProfileUpdates) -> Result<ProfileUpdates, CliError> {
    let updates = ProfileUpdates {
        api_base_url: normalize_text_option(updates.api_base_url),
        auth_domain: normalize_text_option(updates.auth_domain),
        client_id: normalize_text_option(updates.client_id),
        redirect_uri: normalize_text_option(updates.redirect_uri),
        logout_uri: normalize_text_option(updates.logout_uri),
        scope: normalize_text_option(updates.scope),
        audio_region: normalize_text_option(updates.audio_region),
        audio_bucket: normalize_text_option(updates.audio_bucket),
        audio_endpoint: normalize_text_option(updates.audio_endpoint),
        audio_identity_pool_id: normalize_text_option(updates.audio_identity_pool_id),
    };

    for (flag, value) in [
        ("--api-base-url", &updates.api_base_url),
        ("--auth-domain", &updates.auth_domain),
        ("--redirect-uri", &updates.redirect_uri),
        ("--logout-uri", &updates.logout_uri),
        ("--audio-endpoint", &updates.audio_endpoint),
    ] {
        if let Some(value) = value {
            if !is_http_url(value) {
                return Err(CliError::Config(format!(
                    "{flag} must start with http:// or https://"
                )));
            }
        }
    }
    Ok(updates)
}

fn merge(profile: &mut CliProfile, updates: ProfileUpdates) {
    let pairs = [
        (&mut profile.api_base_url, updates.api_base_url),
        (&mut profile.auth_domain, updates.auth_domain),
        (&mut profile.client_id, updates.client_id),
        (&mut profile.redirect_uri, updates.redirect_uri),
        (&mut profile.logout_uri, updates.logout_uri),
        (&mut profile.auth_scope, updates.scope),
        (&mut profile.audio_region, updates.audio_region),
        (&mut profile.audio_bucket, updates.audio_bucket),
        (&mut profile.audio_endpoint, updates.audio_endpoint),
        (
            &mut profile.audio_identity_pool_id,
            updates.audio_identity_pool_id,
        ),
    ];
    for (field, update) in pairs {
        if update.is_some() {
            *field = update;
        }
    }
}
