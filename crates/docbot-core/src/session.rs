//! Session lifecycle: who is signed in, and with which role.
//!
//! [`SessionStore`] is the only owner of the current [`Session`]. Everything else
//! reads a clone through [`SessionStore::current`] or watches changes through
//! [`SessionStore::subscribe`].

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::auth::Authenticator;
use crate::error::AuthError;

const DEFAULT_LOGIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }

    pub fn all() -> &'static [Role] {
        &[Role::Admin, Role::User]
    }
}

/// Username/password pair typed into the login form.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { username: username.into(), password: password.into() }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// An authenticated identity. A value of this type always has a non-empty token.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    token: String,
    role: Role,
    expires_at: Option<Instant>,
}

impl Session {
    pub fn new(token: impl Into<String>, role: Role) -> Result<Self, AuthError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(AuthError::Rejected("empty token".to_string()));
        }
        Ok(Self { token, role, expires_at: None })
    }

    pub fn with_expiry(mut self, expires_at: Instant) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"***")
            .field("role", &self.role)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Process-wide holder of the current session.
///
/// Changes are broadcast over a `watch` channel: subscribers see the latest value
/// and can await [`watch::Receiver::changed`] to react to login, logout or expiry.
pub struct SessionStore {
    authenticator: Arc<dyn Authenticator>,
    session_ttl: Option<Duration>,
    login_timeout: Duration,
    tx: watch::Sender<Option<Session>>,
}

impl SessionStore {
    pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            authenticator,
            session_ttl: None,
            login_timeout: DEFAULT_LOGIN_TIMEOUT,
            tx,
        }
    }

    /// Lifetime applied to sessions whose grant does not carry one.
    pub fn with_session_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.session_ttl = ttl;
        self
    }

    pub fn with_login_timeout(mut self, timeout: Duration) -> Self {
        self.login_timeout = timeout;
        self
    }

    /// Exchange credentials for a session.
    ///
    /// On success the previous session (if any) is replaced in one step. On
    /// failure the current session is left exactly as it was.
    pub async fn login(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        let grant = tokio::time::timeout(
            self.login_timeout,
            self.authenticator.authenticate(credentials),
        )
        .await
        .map_err(|_| AuthError::Unavailable("login timed out".to_string()))?
        .inspect_err(|e| warn!("login failed for {}: {}", credentials.username, e))?;

        let mut session = Session::new(grant.token, grant.role)?;
        if let Some(ttl) = grant.ttl.or(self.session_ttl) {
            session = session.with_expiry(Instant::now() + ttl);
        }

        info!("signed in as {} ({})", credentials.username, session.role().as_str());
        self.tx.send_replace(Some(session.clone()));
        Ok(session)
    }

    /// Drop the current session. Calling this while signed out does nothing.
    pub fn logout(&self) {
        if self.tx.send_if_modified(|current| current.take().is_some()) {
            info!("signed out");
        }
    }

    /// The live session, if any. An expired session is cleared here and reported
    /// as absent.
    pub fn current(&self) -> Option<Session> {
        let session = self.tx.borrow().clone()?;
        if session.is_expired() {
            debug!("session expired, clearing");
            self.tx.send_if_modified(|current| match current {
                Some(s) if s.is_expired() => {
                    *current = None;
                    true
                }
                _ => false,
            });
            return None;
        }
        Some(session)
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::DemoAuthenticator;

    fn store() -> SessionStore {
        SessionStore::new(Arc::new(DemoAuthenticator::default().with_delay(Duration::ZERO)))
    }

    #[test]
    fn test_session_rejects_empty_token() {
        assert!(matches!(Session::new("  ", Role::User), Err(AuthError::Rejected(_))));
        assert!(Session::new("t", Role::User).is_ok());
    }

    #[test]
    fn test_session_debug_hides_token() {
        let session = Session::new("secret-token", Role::Admin).unwrap();
        assert!(!format!("{:?}", session).contains("secret-token"));
    }

    #[tokio::test]
    async fn test_admin_login_sets_admin_session() {
        let store = store();
        let session = store.login(&Credentials::new("admin", "adminpass")).await.unwrap();
        assert_eq!(session.role(), Role::Admin);
        assert_eq!(store.current(), Some(session));
    }

    #[tokio::test]
    async fn test_user_login_sets_user_session() {
        let store = store();
        let session = store.login(&Credentials::new("user", "userpass")).await.unwrap();
        assert_eq!(session.role(), Role::User);
        assert_eq!(session.token(), "user-token");
    }

    #[tokio::test]
    async fn test_failed_login_keeps_previous_session() {
        let store = store();
        let before = store.login(&Credentials::new("user", "userpass")).await.unwrap();

        let err = store.login(&Credentials::new("admin", "wrong")).await.unwrap_err();
        assert_eq!(err, AuthError::InvalidCredentials);
        assert_eq!(store.current(), Some(before));
    }

    #[tokio::test]
    async fn test_failed_login_from_signed_out_stays_signed_out() {
        let store = store();
        assert!(store.login(&Credentials::new("nobody", "x")).await.is_err());
        assert_eq!(store.current(), None);
    }

    #[tokio::test]
    async fn test_logout_is_idempotent_and_notifies_once() {
        let store = store();
        let mut rx = store.subscribe();
        store.login(&Credentials::new("admin", "adminpass")).await.unwrap();
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();

        store.logout();
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();
        assert_eq!(store.current(), None);

        store.logout();
        assert!(!rx.has_changed().unwrap());
        assert_eq!(store.current(), None);
    }

    #[tokio::test]
    async fn test_expired_session_reads_as_absent() {
        let store = store().with_session_ttl(Some(Duration::ZERO));
        let mut rx = store.subscribe();
        store.login(&Credentials::new("user", "userpass")).await.unwrap();
        rx.borrow_and_update();

        assert_eq!(store.current(), None);
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_none());
    }

    #[tokio::test]
    async fn test_slow_authenticator_times_out() {
        let store = SessionStore::new(Arc::new(
            DemoAuthenticator::default().with_delay(Duration::from_secs(5)),
        ))
        .with_login_timeout(Duration::from_millis(20));

        let err = store.login(&Credentials::new("admin", "adminpass")).await.unwrap_err();
        assert!(matches!(err, AuthError::Unavailable(_)));
        assert_eq!(store.current(), None);
    }
}
