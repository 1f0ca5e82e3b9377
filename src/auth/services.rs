use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, info, warn};

use crate::auth::{
    dto::{LoginRequest, RegisterRequest},
    error::AuthError,
    jwt::TokenKeys,
    password::{hash_password, verify_password_or_dummy},
    repo::CredentialStore,
    repo_types::{InsertOutcome, UserRecord},
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn store_unavailable(e: anyhow::Error) -> AuthError {
    error!(error = %e, "credential store failed");
    AuthError::StoreUnavailable(e)
}

/// Start -> Checked -> Done. Fails with `DuplicateUser` if the email is taken.
pub async fn register(store: &dyn CredentialStore, req: RegisterRequest) -> Result<(), AuthError> {
    let name = req.name.trim().to_string();
    let email = normalize_email(&req.email);

    if name.is_empty() {
        return Err(AuthError::InvalidInput("name is required".into()));
    }
    if email.is_empty() {
        return Err(AuthError::InvalidInput("email is required".into()));
    }
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AuthError::InvalidInput("invalid email".into()));
    }
    if req.password.is_empty() {
        return Err(AuthError::InvalidInput("password is required".into()));
    }

    if store
        .find_by_email(&email)
        .await
        .map_err(store_unavailable)?
        .is_some()
    {
        warn!(email = %email, "email already registered");
        return Err(AuthError::DuplicateUser);
    }

    let password = req.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AuthError::Internal(e.into()))??;

    let record = UserRecord {
        name,
        email: email.clone(),
        password_hash,
    };
    match store.insert(record).await.map_err(store_unavailable)? {
        InsertOutcome::Inserted => {
            info!(email = %email, "user registered");
            Ok(())
        }
        InsertOutcome::Duplicate => {
            // Lost a race with a concurrent registration.
            warn!(email = %email, "email registered concurrently");
            Err(AuthError::DuplicateUser)
        }
    }
}

/// Start -> Verified -> Issued. Returns a signed session token.
pub async fn login(
    store: &dyn CredentialStore,
    keys: &TokenKeys,
    req: LoginRequest,
) -> Result<String, AuthError> {
    let email = normalize_email(&req.email);
    if email.is_empty() {
        return Err(AuthError::InvalidInput("email is required".into()));
    }
    if req.password.is_empty() {
        return Err(AuthError::InvalidInput("password is required".into()));
    }

    let user = store.find_by_email(&email).await.map_err(store_unavailable)?;

    // Unknown emails are verified against a dummy hash so both failures cost the same.
    let password = req.password;
    let stored_hash = user.as_ref().map(|u| u.password_hash.clone());
    let ok = tokio::task::spawn_blocking(move || {
        verify_password_or_dummy(&password, stored_hash.as_deref())
    })
    .await
    .map_err(|e| AuthError::Internal(e.into()))?
    .map_err(|e| {
        error!(error = %e, email = %email, "stored password hash unreadable");
        AuthError::from(e)
    })?;

    let user = match user {
        Some(u) if ok => u,
        Some(_) => {
            warn!(email = %email, "login invalid password");
            return Err(AuthError::InvalidCredentials);
        }
        None => {
            warn!(email = %email, "login unknown email");
            return Err(AuthError::InvalidCredentials);
        }
    };

    let token = keys
        .issue(&user.email, &user.name)
        .map_err(|e| {
            error!(error = %e, "jwt sign failed");
            AuthError::Internal(e.into())
        })?;

    info!(email = %user.email, "user logged in");
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{
        error::TokenError,
        password::{verify_password, warm_up},
        repo::MemoryCredentialStore,
    };
    use async_trait::async_trait;
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::{Duration, Instant},
    };

    /// Wraps the memory store and counts insert calls.
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryCredentialStore,
        inserts: AtomicUsize,
    }

    #[async_trait]
    impl CredentialStore for CountingStore {
        async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<UserRecord>> {
            self.inner.find_by_email(email).await
        }

        async fn insert(&self, record: UserRecord) -> anyhow::Result<InsertOutcome> {
            self.inserts.fetch_add(1, Ordering::SeqCst);
            self.inner.insert(record).await
        }
    }

    struct DownStore;

    #[async_trait]
    impl CredentialStore for DownStore {
        async fn find_by_email(&self, _email: &str) -> anyhow::Result<Option<UserRecord>> {
            anyhow::bail!("connection refused")
        }

        async fn insert(&self, _record: UserRecord) -> anyhow::Result<InsertOutcome> {
            anyhow::bail!("connection refused")
        }
    }

    fn register_req(name: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            name: name.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    fn login_req(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.into(),
            password: password.into(),
        }
    }

    fn keys() -> TokenKeys {
        TokenKeys::new("test-secret", Duration::from_secs(300))
    }

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("a@x.com"));
        assert!(!is_valid_email("a@x"));
        assert!(!is_valid_email("a x@x.com"));
        assert!(!is_valid_email("@x.com"));
    }

    #[tokio::test]
    async fn register_stores_hashed_password() {
        let store = MemoryCredentialStore::new();
        register(&store, register_req("A", " A@X.com ", "pw")).await.unwrap();

        let user = store.find_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(user.name, "A");
        assert_ne!(user.password_hash, "pw");
        assert!(verify_password("pw", &user.password_hash).unwrap());
    }

    #[tokio::test]
    async fn duplicate_registration_performs_no_insert() {
        let store = CountingStore::default();
        register(&store, register_req("A", "a@x.com", "pw")).await.unwrap();
        assert_eq!(store.inserts.load(Ordering::SeqCst), 1);

        let err = register(&store, register_req("B", "a@x.com", "other"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::DuplicateUser));
        assert_eq!(store.inserts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn register_rejects_missing_fields() {
        let store = CountingStore::default();
        for req in [
            register_req("", "a@x.com", "pw"),
            register_req("A", "", "pw"),
            register_req("A", "not-an-email", "pw"),
            register_req("A", "a@x.com", ""),
        ] {
            let err = register(&store, req).await.unwrap_err();
            assert!(matches!(err, AuthError::InvalidInput(_)), "{err:?}");
        }
        assert_eq!(store.inserts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn login_issues_verifiable_token() {
        let store = MemoryCredentialStore::new();
        register(&store, register_req("A", "a@x.com", "pw")).await.unwrap();

        let keys = keys();
        let token = login(&store, &keys, login_req("A@x.com", "pw")).await.unwrap();
        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.email, "a@x.com");
        assert_eq!(claims.name, "A");
    }

    #[tokio::test]
    async fn unknown_user_and_wrong_password_are_indistinguishable() {
        let store = MemoryCredentialStore::new();
        register(&store, register_req("A", "a@x.com", "pw")).await.unwrap();
        let keys = keys();

        let unknown = login(&store, &keys, login_req("b@x.com", "pw")).await.unwrap_err();
        let wrong = login(&store, &keys, login_req("a@x.com", "wrong")).await.unwrap_err();

        assert!(matches!(unknown, AuthError::InvalidCredentials));
        assert!(matches!(wrong, AuthError::InvalidCredentials));
        assert_eq!(unknown.to_string(), wrong.to_string());
        assert_eq!(unknown.status_code(), wrong.status_code());
    }

    #[tokio::test]
    async fn login_with_zero_ttl_yields_expired_token() {
        let store = MemoryCredentialStore::new();
        register(&store, register_req("A", "a@x.com", "pw")).await.unwrap();
        let keys = TokenKeys::new("test-secret", Duration::ZERO);

        let token = login(&store, &keys, login_req("a@x.com", "pw")).await.unwrap();
        assert!(matches!(keys.verify(&token), Err(TokenError::Expired)));
    }

    #[tokio::test]
    async fn corrupt_stored_hash_is_internal_error() {
        let store = MemoryCredentialStore::new();
        store
            .insert(UserRecord {
                name: "A".into(),
                email: "a@x.com".into(),
                password_hash: "garbage".into(),
            })
            .await
            .unwrap();

        let err = login(&store, &keys(), login_req("a@x.com", "pw")).await.unwrap_err();
        assert!(matches!(err, AuthError::Internal(_)));
    }

    #[tokio::test]
    async fn unknown_email_costs_as_much_as_wrong_password() {
        let store = MemoryCredentialStore::new();
        register(&store, register_req("A", "a@x.com", "pw")).await.unwrap();
        let keys = keys();
        warm_up();

        const ROUNDS: u32 = 3;
        let mut unknown = Duration::ZERO;
        let mut wrong = Duration::ZERO;
        for _ in 0..ROUNDS {
            let started = Instant::now();
            let err = login(&store, &keys, login_req("nobody@x.com", "pw")).await.unwrap_err();
            unknown += started.elapsed();
            assert!(matches!(err, AuthError::InvalidCredentials));

            let started = Instant::now();
            let err = login(&store, &keys, login_req("a@x.com", "wrong")).await.unwrap_err();
            wrong += started.elapsed();
            assert!(matches!(err, AuthError::InvalidCredentials));
        }

        // Both paths run one Argon2 verification; without it the gap is thousands-fold.
        assert!(unknown * 4 >= wrong, "unknown={unknown:?} wrong={wrong:?}");
        assert!(wrong * 4 >= unknown, "unknown={unknown:?} wrong={wrong:?}");
    }

    #[tokio::test]
    async fn store_failure_surfaces_as_unavailable() {
        let err = register(&DownStore, register_req("A", "a@x.com", "pw"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::StoreUnavailable(_)));

        let err = login(&DownStore, &keys(), login_req("a@x.com", "pw"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::StoreUnavailable(_)));
    }
}
