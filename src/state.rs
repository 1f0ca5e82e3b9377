use std::sync::Arc;

use crate::auth::{CredentialStore, MemoryCredentialStore, PgCredentialStore, TokenKeys};
use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn CredentialStore>,
    pub keys: TokenKeys,
}

impl AppState {
    /// Reads the environment and opens the credential store.
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;
        tokio::task::spawn_blocking(crate::auth::password::warm_up).await?;

        let store = match config.database_url.as_deref() {
            Some(url) => {
                let pg = PgCredentialStore::connect(url).await?;
                tracing::info!("credential store: postgres");
                Arc::new(pg) as Arc<dyn CredentialStore>
            }
            None => {
                tracing::warn!("DATABASE_URL not set; users are kept in memory only");
                Arc::new(MemoryCredentialStore::new()) as Arc<dyn CredentialStore>
            }
        };

        Ok(Self::from_parts(config, store))
    }

    pub fn from_parts(config: AppConfig, store: Arc<dyn CredentialStore>) -> Self {
        let keys = TokenKeys::new(&config.jwt.secret, config.jwt.ttl);
        Self {
            config: Arc::new(config),
            store,
            keys,
        }
    }

    /// Closes the credential store. Call after the server has drained.
    pub async fn shutdown(&self) {
        self.store.close().await;
        tracing::info!("credential store closed");
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::config::JwtConfig;
        use std::time::Duration;

        let config = AppConfig {
            database_url: None,
            jwt: JwtConfig {
                secret: "test".into(),
                ttl: Duration::from_secs(300),
            },
            host: "127.0.0.1".into(),
            port: 0,
        };
        Self::from_parts(config, Arc::new(MemoryCredentialStore::new()))
    }
}
