pub mod api;
pub mod auth;
pub mod chat;
pub mod config;
pub mod documents;
pub mod error;
pub mod gate;
pub mod session;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

// Re-export main types for convenience
pub use api::{Backend, HttpBackend};
pub use auth::{Authenticator, DemoAuthenticator, Grant};
pub use chat::{ChatOutcome, ChatTicket, ChatWorkflow};
pub use config::Config;
pub use documents::{DocumentStatus, DocumentWorkflow, FileUpload};
pub use error::{ApiError, AuthError, DocumentError};
pub use gate::{Access, View};
pub use session::{Credentials, Role, Session, SessionStore};
pub use state::{ChatMessage, Sender};
