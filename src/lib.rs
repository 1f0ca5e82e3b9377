//! Account registration and login backend for the winter clothing donation site.
//!
//! Users register with a name, email and password (stored as an Argon2id hash) and
//! log in to receive an HS256 session token.

pub mod app;
pub mod auth;
pub mod config;
pub mod state;

pub use app::build_app;
pub use state::AppState;
