use std::io;

use stockroom_core::audio::AudioError;
use stockroom_core::auth::AuthError;
use stockroom_core::{StoreError, ValidationError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] stockroom_core::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Audio(#[from] AudioError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Search term cannot be empty")]
    EmptySearchTerm,
    #[error("Nothing to change; pass at least one of --name, --quantity or --price")]
    NothingToEdit,
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Authentication error: {0}")]
    Auth(String),
    #[error("Profile '{0}' is not signed in. Run `stockroom auth login` first.")]
    NotSignedIn(String),
    #[error(
        "Sign-in is not configured. Run `stockroom config init` with --auth-domain, --client-id and --redirect-uri, or set STOCKROOM_AUTH_DOMAIN, STOCKROOM_CLIENT_ID and STOCKROOM_REDIRECT_URI."
    )]
    AuthNotConfigured,
    #[error(
        "Audio previews are not configured. Set the audio region and bucket plus an identity pool (--audio-identity-pool-id) or AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY."
    )]
    AudioNotConfigured,
}

impl From<AuthError> for CliError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::NotConfigured => Self::AuthNotConfigured,
            other => Self::Auth(other.to_string()),
        }
    }
}
