//! Live identity state read by the remote client on every request.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use super::AuthSession;

/// Identity provider state as seen by the front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStatus {
    Loading,
    SignedOut,
    SignedIn,
    Failed(String),
}

/// The mutually exclusive screens a front end renders for an [`AuthStatus`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthView {
    Loading,
    Error(String),
    SignInPrompt,
    Authenticated,
}

impl From<&AuthStatus> for AuthView {
    fn from(status: &AuthStatus) -> Self {
        match status {
            AuthStatus::Loading => Self::Loading,
            AuthStatus::Failed(message) => Self::Error(message.clone()),
            AuthStatus::SignedOut => Self::SignInPrompt,
            AuthStatus::SignedIn => Self::Authenticated,
        }
    }
}

/// Bearer token plus the identity it belongs to.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    pub subject: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Credential")
            .field("token", &"[REDACTED]")
            .field("subject", &self.subject)
            .finish()
    }
}

/// Source of the current credential. Queried per request, never cached.
pub trait IdentitySession {
    fn status(&self) -> AuthStatus;

    /// The ID token to send as a bearer, or `None` when not signed in.
    fn credential(&self) -> Option<Credential>;
}

#[derive(Debug)]
struct SessionSlot {
    status: AuthStatus,
    session: Option<AuthSession>,
}

/// Shared, cloneable identity state.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    slot: Arc<RwLock<SessionSlot>>,
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self {
            slot: Arc::new(RwLock::new(SessionSlot {
                status: AuthStatus::Loading,
                session: None,
            })),
        }
    }
}

impl SessionHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle already populated from a restored or freshly exchanged session.
    #[must_use]
    pub fn signed_in(session: AuthSession) -> Self {
        let handle = Self::default();
        handle.set_session(Some(session));
        handle
    }

    pub fn set_session(&self, session: Option<AuthSession>) {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        slot.status = if session.is_some() {
            AuthStatus::SignedIn
        } else {
            AuthStatus::SignedOut
        };
        slot.session = session;
    }

    /// Drop the session; later requests see no credential.
    pub fn sign_out(&self) {
        self.set_session(None);
    }

    pub fn fail(&self, message: impl Into<String>) {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        slot.status = AuthStatus::Failed(message.into());
        slot.session = None;
    }

    pub fn view(&self) -> AuthView {
        AuthView::from(&self.status())
    }

    pub fn session(&self) -> Option<AuthSession> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .session
            .clone()
    }
}

impl IdentitySession for SessionHandle {
    fn status(&self) -> AuthStatus {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .status
            .clone()
    }

    fn credential(&self) -> Option<Credential> {
        let slot = self.slot.read().unwrap_or_else(PoisonError::into_inner);
        if slot.status != AuthStatus::SignedIn {
            return None;
        }
        let session = slot.session.as_ref()?;
        if session.is_expired() {
            tracing::debug!("Stored session expired; treating as signed out");
            return None;
        }
        Some(Credential {
            token: session.id_token.clone(),
            subject: session.user.id.clone(),
        })
    }
}
