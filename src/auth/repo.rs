use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::repo_types::{InsertOutcome, UserRecord};

/// Persistent collection of user records keyed by email.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Find a user by (normalized) email.
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<UserRecord>>;

    /// Insert a user unless the email is already taken. Check and write are atomic.
    async fn insert(&self, record: UserRecord) -> anyhow::Result<InsertOutcome>;

    /// Release connections. Called once on shutdown.
    async fn close(&self) {}
}

/// PostgreSQL-backed store; the `users.email` unique index enforces uniqueness.
#[derive(Clone)]
pub struct PgCredentialStore {
    db: PgPool,
}

impl PgCredentialStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("connect to database")?;
        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .context("run migrations")?;
        Ok(Self { db })
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<UserRecord>> {
        let user = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT name, email, password_hash
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    async fn insert(&self, record: UserRecord) -> anyhow::Result<InsertOutcome> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO users (id, name, email, password_hash)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&record.name)
        .bind(&record.email)
        .bind(&record.password_hash)
        .fetch_optional(&self.db)
        .await
        .context("insert user")?;

        Ok(match id {
            Some(id) => {
                tracing::debug!(user_id = %id, "user row inserted");
                InsertOutcome::Inserted
            }
            None => InsertOutcome::Duplicate,
        })
    }

    async fn close(&self) {
        self.db.close().await;
    }
}

/// Process-local store used when no database is configured, and in tests.
#[derive(Default)]
pub struct MemoryCredentialStore {
    users: RwLock<HashMap<String, UserRecord>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn user_count(&self) -> usize {
        self.users.read().await.len()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<UserRecord>> {
        Ok(self.users.read().await.get(email).cloned())
    }

    async fn insert(&self, record: UserRecord) -> anyhow::Result<InsertOutcome> {
        let mut users = self.users.write().await;
        if users.contains_key(&record.email) {
            return Ok(InsertOutcome::Duplicate);
        }
        users.insert(record.email.clone(), record);
        Ok(InsertOutcome::Inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn record(email: &str) -> UserRecord {
        UserRecord {
            name: "A".into(),
            email: email.into(),
            password_hash: "$argon2id$stub".into(),
        }
    }

    #[tokio::test]
    async fn memory_store_finds_inserted_user() {
        let store = MemoryCredentialStore::new();
        assert!(store.find_by_email("a@x.com").await.unwrap().is_none());

        let outcome = store.insert(record("a@x.com")).await.unwrap();
        assert_eq!(outcome, InsertOutcome::Inserted);

        let found = store.find_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(found.name, "A");
    }

    #[tokio::test]
    async fn memory_store_rejects_duplicate_email() {
        let store = MemoryCredentialStore::new();
        store.insert(record("a@x.com")).await.unwrap();
        let outcome = store.insert(record("a@x.com")).await.unwrap();
        assert_eq!(outcome, InsertOutcome::Duplicate);
        assert_eq!(store.user_count().await, 1);
    }

    #[tokio::test]
    async fn concurrent_inserts_admit_exactly_one() {
        let store = Arc::new(MemoryCredentialStore::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.insert(record("race@x.com")).await.unwrap()
            }));
        }

        let mut inserted = 0;
        for h in handles {
            if h.await.unwrap() == InsertOutcome::Inserted {
                inserted += 1;
            }
        }
        assert_eq!(inserted, 1);
        assert_eq!(store.user_count().await, 1);
    }
}
