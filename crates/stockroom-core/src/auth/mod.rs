//! Hosted-UI OAuth2 client for the identity provider.
//!
//! Implements the authorization-code flow against a Cognito-style hosted
//! domain: build the sign-in redirect URL, exchange the returned code for
//! tokens, refresh, and sign out. The user identity is read from the ID
//! token's claims.

mod session;

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::IdentityConfig;
use crate::util::unix_timestamp_now;

pub use session::{AuthStatus, AuthView, Credential, IdentitySession, SessionHandle};

const EXPIRY_SKEW_SECONDS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    /// The `sub` claim.
    pub id: String,
    pub email: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub id_token: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub user: AuthUser,
}

impl AuthSession {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at <= unix_timestamp_now() + EXPIRY_SKEW_SECONDS
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AuthSession")
            .field("id_token", &"[REDACTED]")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Identity provider is not configured.")]
    NotConfigured,
    #[error("Invalid auth configuration: {0}")]
    InvalidConfiguration(&'static str),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to parse JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Auth API error: {0}")]
    Api(String),
    #[error("Invalid ID token: {0}")]
    InvalidToken(String),
    #[error("Secure storage error: {0}")]
    SecureStorage(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Where a signed-in session survives between runs.
pub trait SessionPersistence: Clone + Send + Sync + 'static {
    fn load_session(&self) -> AuthResult<Option<AuthSession>>;
    fn save_session(&self, session: &AuthSession) -> AuthResult<()>;
    fn clear_session(&self) -> AuthResult<()>;
}

#[derive(Clone)]
pub struct OidcAuthClient<S: SessionPersistence> {
    config: IdentityConfig,
    client: Client,
    store: S,
}

impl<S: SessionPersistence> OidcAuthClient<S> {
    pub fn new(config: IdentityConfig, store: S) -> AuthResult<Self> {
        if config.client_id.trim().is_empty() {
            return Err(AuthError::InvalidConfiguration("client_id must not be empty"));
        }
        if config.redirect_uri.trim().is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "redirect_uri must not be empty",
            ));
        }

        Ok(Self {
            config,
            client: Client::builder().build()?,
            store,
        })
    }

    /// URL the user opens to sign in; the provider redirects back with `?code=`.
    #[must_use]
    pub fn authorize_url(&self, state: Option<&str>) -> String {
        let mut url = format!(
            "{}/oauth2/authorize?response_type=code&client_id={}&redirect_uri={}&scope={}",
            self.config.domain,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode(&self.config.scope),
        );
        if let Some(state) = state {
            url.push_str("&state=");
            url.push_str(&urlencoding::encode(state));
        }
        url
    }

    /// Provider logout URL; opening it ends the hosted-UI session.
    #[must_use]
    pub fn logout_url(&self) -> String {
        let logout_uri = self
            .config
            .logout_uri
            .as_deref()
            .unwrap_or(&self.config.redirect_uri);
        format!(
            "{}/logout?client_id={}&logout_uri={}",
            self.config.domain,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(logout_uri),
        )
    }

    pub async fn restore_session(&self) -> AuthResult<Option<AuthSession>> {
        let Some(stored_session) = self.store.load_session()? else {
            return Ok(None);
        };

        if !stored_session.is_expired() {
            return Ok(Some(stored_session));
        }

        match self.refresh_session(&stored_session.refresh_token).await {
            Ok(refreshed) => Ok(Some(refreshed)),
            Err(error) => {
                tracing::warn!("Failed to refresh persisted session: {}", error);
                self.store.clear_session()?;
                Ok(None)
            }
        }
    }

    /// Exchange the authorization code from the sign-in redirect.
    pub async fn exchange_code(&self, code: &str) -> AuthResult<AuthSession> {
        let code = code.trim();
        if code.is_empty() {
            return Err(AuthError::Api("Authorization code is required".to_string()));
        }

        let request = self.token_request(&[
            ("grant_type", "authorization_code"),
            ("client_id", self.config.client_id.as_str()),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ]);
        let response = send_token_request(request).await?;
        let session = response.into_session(None)?;

        self.store.save_session(&session)?;
        Ok(session)
    }

    pub async fn refresh_session(&self, refresh_token: &str) -> AuthResult<AuthSession> {
        if refresh_token.trim().is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "Refresh token must not be empty",
            ));
        }

        let request = self.token_request(&[
            ("grant_type", "refresh_token"),
            ("client_id", self.config.client_id.as_str()),
            ("refresh_token", refresh_token),
        ]);
        let response = send_token_request(request).await?;
        // The provider does not rotate refresh tokens on this grant.
        let session = response.into_session(Some(refresh_token))?;

        self.store.save_session(&session)?;
        Ok(session)
    }

    /// Refresh the session held by `handle` once it has expired, persist the
    /// result and publish it to every clone of the handle.
    ///
    /// Returns whether a new session was installed. A failed refresh leaves
    /// the handle as it was, so requests keep reporting "Not signed in".
    pub async fn refresh_if_expired(&self, handle: &SessionHandle) -> AuthResult<bool> {
        let Some(current) = handle.session() else {
            return Ok(false);
        };
        if !current.is_expired() {
            return Ok(false);
        }

        tracing::debug!("Session expired; refreshing");
        let refreshed = self.refresh_session(&current.refresh_token).await?;
        handle.set_session(Some(refreshed));
        tracing::info!("Session refreshed");
        Ok(true)
    }

    /// Forget the local session and return the provider logout URL.
    pub fn sign_out(&self) -> AuthResult<String> {
        self.store.clear_session()?;
        Ok(self.logout_url())
    }

    fn token_request(&self, form: &[(&str, &str)]) -> RequestBuilder {
        self.client
            .post(format!("{}/oauth2/token", self.config.domain))
            .header("Accept", "application/json")
            .form(form)
    }
}

async fn send_token_request(request: RequestBuilder) -> AuthResult<TokenResponse> {
    let response = request.send().await?;
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(AuthError::Api(parse_api_error(status, &body)));
    }
    Ok(response.json::<TokenResponse>().await?)
}

/// Read `sub` and `email` from an ID token without verifying its signature.
///
/// The backend verifies tokens; the client only needs the claims for display
/// and for the submitter identity on create.
pub fn decode_id_token_user(id_token: &str) -> AuthResult<AuthUser> {
    let claims = decode_id_token_claims(id_token)?;
    let id = claims
        .sub
        .map(|sub| sub.trim().to_string())
        .filter(|sub| !sub.is_empty())
        .ok_or_else(|| AuthError::InvalidToken("missing 'sub' claim".to_string()))?;
    Ok(AuthUser {
        id,
        email: claims.email,
    })
}

/// Identity-pool login provider for an ID token: its `iss` claim without the
/// scheme, e.g. `cognito-idp.us-east-1.amazonaws.com/us-east-1_AbC`.
pub fn id_token_login_provider(id_token: &str) -> AuthResult<String> {
    let issuer = decode_id_token_claims(id_token)?
        .iss
        .map(|iss| iss.trim().trim_end_matches('/').to_string())
        .filter(|iss| !iss.is_empty())
        .ok_or_else(|| AuthError::InvalidToken("missing 'iss' claim".to_string()))?;
    Ok(issuer
        .strip_prefix("https://")
        .unwrap_or(&issuer)
        .to_string())
}

fn decode_id_token_claims(id_token: &str) -> AuthResult<IdTokenClaims> {
    let mut segments = id_token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_)) => payload,
        _ => return Err(AuthError::InvalidToken("expected three segments".to_string())),
    };
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|error| AuthError::InvalidToken(error.to_string()))?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: Option<String>,
    email: Option<String>,
    iss: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    id_token: Option<String>,
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

impl TokenResponse {
    fn into_session(self, previous_refresh_token: Option<&str>) -> AuthResult<AuthSession> {
        let refresh_token = self
            .refresh_token
            .or_else(|| previous_refresh_token.map(ToString::to_string));

        match (self.id_token, self.access_token, refresh_token, self.expires_in) {
            (Some(id_token), Some(access_token), Some(refresh_token), Some(expires_in)) => {
                let user = decode_id_token_user(&id_token)?;
                Ok(AuthSession {
                    id_token,
                    access_token,
                    refresh_token,
                    expires_at: unix_timestamp_now().saturating_add(expires_in),
                    user,
                })
            }
            _ => Err(AuthError::Api(
                "Token response did not include enough session fields".to_string(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OAuthErrorResponse {
    error: Option<String>,
    error_description: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<OAuthErrorResponse>(body) {
        if let Some(message) = payload
            .error_description
            .or(payload.message)
            .or(payload.error)
        {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}
