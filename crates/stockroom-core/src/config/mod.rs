//! Runtime configuration for Stockroom clients.
//!
//! Values are resolved through a key lookup so callers can layer sources: the
//! CLI consults its profile file first and falls back to the process
//! environment. Identity and audio settings are optional groups; providing only
//! part of a group is an error that names the missing keys.

use std::fmt;
use std::time::Duration;

use crate::util::{normalize_http_base, normalize_text_option};
use crate::{Error, Result};

pub const ENV_API_BASE_URL: &str = "STOCKROOM_API_BASE_URL";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "STOCKROOM_HTTP_TIMEOUT_SECS";
pub const ENV_AUTH_DOMAIN: &str = "STOCKROOM_AUTH_DOMAIN";
pub const ENV_CLIENT_ID: &str = "STOCKROOM_CLIENT_ID";
pub const ENV_REDIRECT_URI: &str = "STOCKROOM_REDIRECT_URI";
pub const ENV_LOGOUT_URI: &str = "STOCKROOM_LOGOUT_URI";
pub const ENV_AUTH_SCOPE: &str = "STOCKROOM_AUTH_SCOPE";
pub const ENV_AUDIO_REGION: &str = "STOCKROOM_AUDIO_REGION";
pub const ENV_AUDIO_BUCKET: &str = "STOCKROOM_AUDIO_BUCKET";
pub const ENV_AUDIO_ENDPOINT: &str = "STOCKROOM_AUDIO_ENDPOINT";
pub const ENV_AUDIO_IDENTITY_POOL_ID: &str = "STOCKROOM_AUDIO_IDENTITY_POOL_ID";
pub const ENV_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const ENV_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const ENV_SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";

pub const DEFAULT_AUTH_SCOPE: &str = "email openid phone";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Fully resolved client configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    /// Backend base URL; the products resource lives at `{base}/products`.
    pub api_base_url: String,
    /// Transport timeout applied to every backend request.
    pub http_timeout: Duration,
    pub identity: Option<IdentityConfig>,
    pub audio: Option<AudioStorageConfig>,
}

/// Hosted-UI identity provider settings (OAuth2 authorization-code flow).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentityConfig {
    /// Hosted UI domain, e.g. `https://example.auth.us-east-1.amazoncognito.com`.
    pub domain: String,
    pub client_id: String,
    pub redirect_uri: String,
    /// Where the provider sends the browser after logout.
    pub logout_uri: Option<String>,
    pub scope: String,
}

/// Object storage holding `{id}.mp3` audio previews.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioStorageConfig {
    pub region: String,
    pub bucket: String,
    /// Custom S3-compatible endpoint; AWS default when absent.
    pub endpoint_url: Option<String>,
    pub credentials: AudioCredentials,
}

/// Where the signer gets its AWS keys.
#[derive(Clone, PartialEq, Eq)]
pub enum AudioCredentials {
    /// Temporary keys from an identity pool, issued for the signed-in user's
    /// ID token. Rebuilt whenever the session changes.
    IdentityPool { pool_id: String },
    /// Long-lived keys from the environment.
    Static {
        access_key_id: String,
        secret_access_key: String,
        session_token: Option<String>,
    },
}

impl AudioCredentials {
    /// Whether signing needs a signed-in identity.
    pub const fn uses_identity(&self) -> bool {
        matches!(self, Self::IdentityPool { .. })
    }
}

impl fmt::Debug for AudioCredentials {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IdentityPool { pool_id } => formatter
                .debug_struct("IdentityPool")
                .field("pool_id", pool_id)
                .finish(),
            Self::Static {
                access_key_id,
                session_token,
                ..
            } => formatter
                .debug_struct("Static")
                .field("access_key_id", access_key_id)
                .field("secret_access_key", &"[REDACTED]")
                .field("session_token", &session_token.as_ref().map(|_| "[REDACTED]"))
                .finish(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let read = |key: &str| normalize_text_option(lookup(key));

        let api_base_url = read(ENV_API_BASE_URL).ok_or_else(|| {
            Error::Config(format!("{ENV_API_BASE_URL} is required"))
        })?;
        let api_base_url =
            normalize_http_base(&api_base_url, ENV_API_BASE_URL).map_err(Error::Config)?;

        let http_timeout = match read(ENV_HTTP_TIMEOUT_SECS) {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .ok_or_else(|| {
                    Error::Config(format!(
                        "{ENV_HTTP_TIMEOUT_SECS} must be a positive number of seconds"
                    ))
                })?,
            None => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        };

        Ok(Self {
            api_base_url,
            http_timeout,
            identity: parse_identity(&read)?,
            audio: parse_audio(&read)?,
        })
    }
}

fn parse_identity(read: &impl Fn(&str) -> Option<String>) -> Result<Option<IdentityConfig>> {
    let domain = read(ENV_AUTH_DOMAIN);
    let client_id = read(ENV_CLIENT_ID);
    let redirect_uri = read(ENV_REDIRECT_URI);
    let logout_uri = read(ENV_LOGOUT_URI);

    if domain.is_none() && client_id.is_none() && redirect_uri.is_none() && logout_uri.is_none()
    {
        return Ok(None);
    }

    let missing = missing_keys(&[
        (ENV_AUTH_DOMAIN, &domain),
        (ENV_CLIENT_ID, &client_id),
        (ENV_REDIRECT_URI, &redirect_uri),
    ]);
    let (Some(domain), Some(client_id), Some(redirect_uri)) = (domain, client_id, redirect_uri)
    else {
        return Err(incomplete("Identity", &missing));
    };

    Ok(Some(IdentityConfig {
        domain: normalize_http_base(&domain, ENV_AUTH_DOMAIN).map_err(Error::Config)?,
        client_id,
        redirect_uri,
        logout_uri,
        scope: read(ENV_AUTH_SCOPE).unwrap_or_else(|| DEFAULT_AUTH_SCOPE.to_string()),
    }))
}

fn parse_audio(read: &impl Fn(&str) -> Option<String>) -> Result<Option<AudioStorageConfig>> {
    let region = read(ENV_AUDIO_REGION);
    let bucket = read(ENV_AUDIO_BUCKET);
    let endpoint_url = read(ENV_AUDIO_ENDPOINT);
    let pool_id = read(ENV_AUDIO_IDENTITY_POOL_ID);

    if region.is_none() && bucket.is_none() && endpoint_url.is_none() && pool_id.is_none() {
        return Ok(None);
    }

    let missing = missing_keys(&[(ENV_AUDIO_REGION, &region), (ENV_AUDIO_BUCKET, &bucket)]);
    let (Some(region), Some(bucket)) = (region, bucket) else {
        return Err(incomplete("Audio storage", &missing));
    };

    let credentials = match pool_id {
        Some(pool_id) => AudioCredentials::IdentityPool { pool_id },
        None => parse_static_credentials(read)?,
    };

    let endpoint_url = endpoint_url
        .map(|url| normalize_http_base(&url, ENV_AUDIO_ENDPOINT))
        .transpose()
        .map_err(Error::Config)?;

    Ok(Some(AudioStorageConfig {
        region,
        bucket,
        endpoint_url,
        credentials,
    }))
}

fn parse_static_credentials(read: &impl Fn(&str) -> Option<String>) -> Result<AudioCredentials> {
    let access_key_id = read(ENV_ACCESS_KEY_ID);
    let secret_access_key = read(ENV_SECRET_ACCESS_KEY);
    let missing = missing_keys(&[
        (ENV_ACCESS_KEY_ID, &access_key_id),
        (ENV_SECRET_ACCESS_KEY, &secret_access_key),
    ]);
    let (Some(access_key_id), Some(secret_access_key)) = (access_key_id, secret_access_key) else {
        return Err(Error::Config(format!(
            "Audio storage needs {ENV_AUDIO_IDENTITY_POOL_ID} or static keys. Missing: {}",
            missing.join(", ")
        )));
    };
    Ok(AudioCredentials::Static {
        access_key_id,
        secret_access_key,
        session_token: read(ENV_SESSION_TOKEN),
    })
}

fn missing_keys(values: &[(&'static str, &Option<String>)]) -> Vec<&'static str> {
    values
        .iter()
        .filter(|(_, value)| value.is_none())
        .map(|(key, _)| *key)
        .collect()
}

fn incomplete(group: &str, missing: &[&str]) -> Error {
    Error::Config(format!(
        "{group} configuration is incomplete. Missing: {}",
        missing.join(", ")
    ))
}
