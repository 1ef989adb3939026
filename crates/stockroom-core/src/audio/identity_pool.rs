//! Temporary AWS keys from an identity pool, issued for a signed-in user.

use std::time::SystemTime;

use aws_credential_types::Credentials;
use aws_sdk_cognitoidentity::error::DisplayErrorContext;
use aws_sdk_cognitoidentity::Client;
use aws_types::region::Region;

use super::AudioError;
use crate::auth::id_token_login_provider;
use crate::util::compact_text;

const PROVIDER_NAME: &str = "stockroom-identity-pool";

/// Exchange an ID token for identity-pool credentials.
///
/// Two unauthenticated calls: `GetId` resolves the pool identity for the
/// token's issuer, `GetCredentialsForIdentity` issues the keys.
pub async fn identity_pool_credentials(
    region: &str,
    pool_id: &str,
    id_token: &str,
) -> Result<Credentials, AudioError> {
    let provider = id_token_login_provider(id_token)
        .map_err(|error| AudioError::Signing(error.to_string()))?;

    let config = aws_sdk_cognitoidentity::config::Builder::new()
        .region(Region::new(region.to_string()))
        .build();
    let client = Client::from_conf(config);

    let identity = client
        .get_id()
        .identity_pool_id(pool_id)
        .logins(&provider, id_token)
        .send()
        .await
        .map_err(|error| pool_error("GetId", &DisplayErrorContext(&error)))?;
    let identity_id = identity
        .identity_id()
        .ok_or_else(|| AudioError::Signing("identity pool returned no identity".to_string()))?;

    let issued = client
        .get_credentials_for_identity()
        .identity_id(identity_id)
        .logins(&provider, id_token)
        .send()
        .await
        .map_err(|error| pool_error("GetCredentialsForIdentity", &DisplayErrorContext(&error)))?;
    let keys = issued
        .credentials()
        .ok_or_else(|| AudioError::Signing("identity pool returned no credentials".to_string()))?;

    let (Some(access_key_id), Some(secret_key)) = (keys.access_key_id(), keys.secret_key()) else {
        return Err(AudioError::Signing(
            "identity pool credentials are incomplete".to_string(),
        ));
    };
    let expires_after = keys
        .expiration()
        .and_then(|expiration| SystemTime::try_from(*expiration).ok());

    tracing::debug!(identity_id, "Issued identity-pool credentials");
    Ok(Credentials::new(
        access_key_id,
        secret_key,
        keys.session_token().map(ToString::to_string),
        expires_after,
        PROVIDER_NAME,
    ))
}

fn pool_error(operation: &str, error: &impl std::fmt::Display) -> AudioError {
    AudioError::Signing(format!(
        "identity pool {operation} failed: {}",
        compact_text(&error.to_string())
    ))
}
