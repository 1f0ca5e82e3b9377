use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// User record held by the credential store.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRecord {
    pub name: String,
    pub email: String, // unique key, stored lower-cased
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 PHC string, not exposed in JSON
}

/// Result of a conditional insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A record with the same email already existed; nothing was written.
    Duplicate,
}
