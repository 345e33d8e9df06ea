use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageConfig {
    S3(S3Config),
    Memory { public_url: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// `None` runs the service on the in-memory user repository.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub storage: StorageConfig,
    pub avatar_url_ttl_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());
        let database_max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(10);

        let backend = std::env::var("STORAGE_BACKEND").unwrap_or_else(|_| "memory".into());
        let storage = match backend.as_str() {
            "s3" => StorageConfig::S3(S3Config {
                endpoint: std::env::var("S3_ENDPOINT").context("S3_ENDPOINT")?,
                bucket: std::env::var("S3_BUCKET").context("S3_BUCKET")?,
                access_key: std::env::var("S3_ACCESS_KEY").context("S3_ACCESS_KEY")?,
                secret_key: std::env::var("S3_SECRET_KEY").context("S3_SECRET_KEY")?,
                region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".into()),
            }),
            "memory" => StorageConfig::Memory {
                public_url: std::env::var("STORAGE_PUBLIC_URL")
                    .unwrap_or_else(|_| "/uploads".into()),
            },
            other => anyhow::bail!("unknown STORAGE_BACKEND {other:?} (expected s3 or memory)"),
        };

        let avatar_url_ttl_secs = std::env::var("AVATAR_URL_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(30 * 60);

        Ok(Self {
            database_url,
            database_max_connections,
            storage,
            avatar_url_ttl_secs,
        })
    }
}
