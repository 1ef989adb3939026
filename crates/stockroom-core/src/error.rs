//! Error types for stockroom-core

use thiserror::Error;

/// Result type alias using stockroom-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while configuring or wiring up the core.
///
/// Operation-level failures have their own types: [`crate::client::RemoteError`],
/// [`crate::models::ValidationError`], [`crate::store::StoreError`] and
/// [`crate::audio::AudioError`].
#[derive(Error, Debug)]
pub enum Error {
    /// Incomplete or malformed configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP client construction error
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}
