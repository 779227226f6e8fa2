use std::time::Duration;

use async_trait::async_trait;

use crate::error::AuthError;
use crate::session::{Credentials, Role};

/// What an authenticator hands back for valid credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    pub token: String,
    pub role: Role,
    /// Token lifetime, when the issuer states one.
    pub ttl: Option<Duration>,
}

/// The external credential-verification collaborator.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Grant, AuthError>;
}

struct DemoAccount {
    username: String,
    password: String,
    token: String,
    role: Role,
}

/// Demo login with a fixed set of accounts and simulated latency.
///
/// It verifies nothing beyond string equality and exists so the client can be
/// exercised without an identity service. Swap it for a real [`Authenticator`].
pub struct DemoAuthenticator {
    accounts: Vec<DemoAccount>,
    delay: Duration,
}

impl Default for DemoAuthenticator {
    fn default() -> Self {
        Self {
            accounts: vec![
                DemoAccount {
                    username: "admin".to_string(),
                    password: "adminpass".to_string(),
                    token: "admin-token".to_string(),
                    role: Role::Admin,
                },
                DemoAccount {
                    username: "user".to_string(),
                    password: "userpass".to_string(),
                    token: "user-token".to_string(),
                    role: Role::User,
                },
            ],
            delay: Duration::from_millis(500),
        }
    }
}

impl DemoAuthenticator {
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl Authenticator for DemoAuthenticator {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Grant, AuthError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.accounts
            .iter()
            .find(|a| a.username == credentials.username && a.password == credentials.password)
            .map(|a| Grant { token: a.token.clone(), role: a.role, ttl: None })
            .ok_or(AuthError::InvalidCredentials)
    }
}
