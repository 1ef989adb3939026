//! CLI identity-provider session helpers with secure keychain persistence.

#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use std::sync::{Mutex, OnceLock};

#[cfg(not(test))]
use keyring::Entry;

use stockroom_core::auth::{AuthResult, OidcAuthClient, SessionHandle, SessionPersistence};
pub use stockroom_core::auth::{AuthError, AuthSession};
use stockroom_core::config::AppConfig;

#[cfg(not(test))]
const KEYRING_SERVICE_NAME: &str = "stockroom-cli";

#[derive(Clone)]
struct SessionStore {
    username: String,
}

impl SessionStore {
    fn new(profile_name: &str) -> Self {
        Self {
            username: format!("oidc_session:{profile_name}"),
        }
    }

    #[cfg(test)]
    fn test_store() -> &'static Mutex<HashMap<String, String>> {
        static STORE: OnceLock<Mutex<HashMap<String, String>>> = OnceLock::new();
        STORE.get_or_init(|| Mutex::new(HashMap::new()))
    }

    #[cfg(not(test))]
    fn entry(&self) -> AuthResult<Entry> {
        Entry::new(KEYRING_SERVICE_NAME, &self.username)
            .map_err(|error| AuthError::SecureStorage(error.to_string()))
    }
}

impl SessionPersistence for SessionStore {
    #[cfg(not(test))]
    fn load_session(&self) -> AuthResult<Option<AuthSession>> {
        let entry = self.entry()?;
        match entry.get_password() {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(AuthError::SecureStorage(error.to_string())),
        }
    }

    #[cfg(test)]
    fn load_session(&self) -> AuthResult<Option<AuthSession>> {
        let guard = Self::test_store()
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        guard
            .get(&self.username)
            .map(|raw| serde_json::from_str(raw))
            .transpose()
            .map_err(AuthError::from)
    }

    #[cfg(not(test))]
    fn save_session(&self, session: &AuthSession) -> AuthResult<()> {
        let raw = serde_json::to_string(session)?;
        self.entry()?
            .set_password(&raw)
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        Ok(())
    }

    #[cfg(test)]
    fn save_session(&self, session: &AuthSession) -> AuthResult<()> {
        let raw = serde_json::to_string(session)?;
        let mut guard = Self::test_store()
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        guard.insert(self.username.clone(), raw);
        Ok(())
    }

    #[cfg(not(test))]
    fn clear_session(&self) -> AuthResult<()> {
        let entry = self.entry()?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(AuthError::SecureStorage(error.to_string())),
        }
    }

    #[cfg(test)]
    fn clear_session(&self) -> AuthResult<()> {
        let mut guard = Self::test_store()
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        guard.remove(&self.username);
        Ok(())
    }
}

/// Hosted-UI sign-in bound to one CLI profile's keychain entry.
#[derive(Clone)]
pub struct AuthService {
    inner: OidcAuthClient<SessionStore>,
}

impl AuthService {
    pub fn for_config(profile_name: &str, config: &AppConfig) -> AuthResult<Self> {
        let identity = config.identity.clone().ok_or(AuthError::NotConfigured)?;
        Ok(Self {
            inner: OidcAuthClient::new(identity, SessionStore::new(profile_name))?,
        })
    }

    pub fn authorize_url(&self, state: Option<&str>) -> String {
        self.inner.authorize_url(state)
    }

    pub async fn exchange_code(&self, code: &str) -> AuthResult<AuthSession> {
        self.inner.exchange_code(code).await
    }

    /// Stored session, refreshed first when it has expired.
    pub async fn restore_session(&self) -> AuthResult<Option<AuthSession>> {
        self.inner.restore_session().await
    }

    /// Refresh `handle`'s session when it has expired; the keychain entry is
    /// updated too. Returns whether the session changed.
    pub async fn refresh_if_expired(&self, handle: &SessionHandle) -> AuthResult<bool> {
        self.inner.refresh_if_expired(handle).await
    }

    /// Clear the stored session; returns the provider logout URL.
    pub fn sign_out(&self) -> AuthResult<String> {
        self.inner.sign_out()
    }
}

pub fn load_stored_session(profile_name: &str) -> AuthResult<Option<AuthSession>> {
    SessionStore::new(profile_name).load_session()
}

pub fn clear_stored_session(profile_name: &str) -> AuthResult<()> {
    SessionStore::new(profile_name).clear_session()
}

#[cfg(test)]
pub(crate) fn store_session_for_tests(profile_name: &str, session: &AuthSession) {
    SessionStore::new(profile_name)
        .save_session(session)
        .unwrap();
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use stockroom_core::auth::AuthUser;
    use stockroom_core::config::IdentityConfig;

    use super::*;

    fn config(identity: Option<IdentityConfig>) -> AppConfig {
        AppConfig {
            api_base_url: "https://api.example.com".to_string(),
            http_timeout: Duration::from_secs(5),
            identity,
            audio: None,
        }
    }

    fn identity() -> IdentityConfig {
        IdentityConfig {
            domain: "https://login.example.com".to_string(),
            client_id: "client-1".to_string(),
            redirect_uri: "http://localhost:3000/".to_string(),
            logout_uri: None,
            scope: "openid".to_string(),
        }
    }

    fn session() -> AuthSession {
        AuthSession {
            id_token: "secret-id-token".to_string(),
            access_token: "secret-access-token".to_string(),
            refresh_token: "secret-refresh-token".to_string(),
            expires_at: i64::MAX,
            user: AuthUser {
                id: "user".to_string(),
                email: None,
            },
        }
    }

    #[test]
    fn auth_service_requires_identity_config() {
        let error = AuthService::for_config("default", &config(None))
            .err()
            .unwrap();
        assert!(matches!(error, AuthError::NotConfigured));
    }

    #[test]
    fn authorize_url_targets_hosted_ui() {
        let service = AuthService::for_config("default", &config(Some(identity()))).unwrap();
        let url = service.authorize_url(None);
        assert!(url.starts_with("https://login.example.com/oauth2/authorize?"));
        assert!(url.contains("client_id=client-1"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn sign_out_clears_stored_session() {
        let profile = "auth-test-sign-out";
        store_session_for_tests(profile, &session());
        let service = AuthService::for_config(profile, &config(Some(identity()))).unwrap();
        assert!(service.restore_session().await.unwrap().is_some());

        let logout_url = service.sign_out().unwrap();

        assert!(logout_url.starts_with("https://login.example.com/logout?"));
        assert!(load_stored_session(profile).unwrap().is_none());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn refresh_if_expired_keeps_live_session() {
        let service = AuthService::for_config("auth-test-live", &config(Some(identity()))).unwrap();
        let handle = SessionHandle::signed_in(session());

        assert!(!service.refresh_if_expired(&handle).await.unwrap());
        assert_eq!(handle.session(), Some(session()));
    }

    #[test]
    fn session_debug_redacts_tokens() {
        let rendered = format!("{:?}", session());
        assert!(!rendered.contains("secret-id-token"));
        assert!(!rendered.contains("secret-refresh-token"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
