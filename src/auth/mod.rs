use crate::state::AppState;
use axum::Router;

mod claims;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod services;

pub use claims::SessionClaims;
pub use error::{AuthError, TokenError};
pub use jwt::{issue_token, verify_token, AuthUser, TokenKeys};
pub use repo::{CredentialStore, MemoryCredentialStore, PgCredentialStore};
pub use repo_types::{InsertOutcome, UserRecord};

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::auth_routes())
        .merge(handlers::me_routes())
}
