use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use crate::config::{AppConfig, StorageConfig};
use crate::storage::{MemoryStorage, Storage, StorageClient};
use crate::users::repo::{InMemoryUserRepository, PgUserRepository, UserRepository};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepository>,
    pub storage: Arc<dyn StorageClient>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let users = match &config.database_url {
            Some(url) => {
                let db = PgPoolOptions::new()
                    .max_connections(config.database_max_connections)
                    .connect(url)
                    .await
                    .context("connect to database")?;

                if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
                    warn!(error = %e, "migration failed; continuing");
                }
                Arc::new(PgUserRepository::new(db)) as Arc<dyn UserRepository>
            }
            None => {
                warn!("DATABASE_URL not set; users are kept in memory and lost on restart");
                Arc::new(InMemoryUserRepository::new()) as Arc<dyn UserRepository>
            }
        };

        let storage = match &config.storage {
            StorageConfig::S3(s3) => {
                info!(endpoint = %s3.endpoint, bucket = %s3.bucket, "using s3 storage");
                Arc::new(Storage::new(s3).await?) as Arc<dyn StorageClient>
            }
            StorageConfig::Memory { public_url } => {
                warn!("using in-memory attachment storage");
                Arc::new(MemoryStorage::new(public_url.clone())) as Arc<dyn StorageClient>
            }
        };

        Ok(Self {
            config,
            users,
            storage,
        })
    }
}

#[cfg(test)]
impl AppState {
    pub fn fake() -> Self {
        Self::fake_with_storage().0
    }

    /// In-memory state, also handing back the storage for inspection.
    pub fn fake_with_storage() -> (Self, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new("https://fake.local"));
        let config = Arc::new(AppConfig {
            database_url: None,
            database_max_connections: 1,
            storage: StorageConfig::Memory {
                public_url: "https://fake.local".into(),
            },
            avatar_url_ttl_secs: 60,
        });
        let state = Self {
            config,
            users: Arc::new(InMemoryUserRepository::new()),
            storage: storage.clone(),
        };
        (state, storage)
    }
}
