use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub app: AppSettings,
    pub database: DatabaseSettings,
    pub redis: RedisSettings,
    pub jwt: JwtSettings,
    pub conferencing: ConferencingSettings,
    pub admission: AdmissionSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSettings {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub name: String,
    pub max_pool_size: Option<u32>,
    pub min_pool_size: Option<u32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisSettings {
    pub url: String,
    pub key_prefix: String,
}

/// Verification of access tokens minted by the account platform.
#[derive(Debug, Deserialize, Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub access_token_ttl_secs: u64,
    pub issuer: String,
}

/// Grant signing for the external conferencing engine.
#[derive(Debug, Deserialize, Clone)]
pub struct ConferencingSettings {
    pub domain: String,
    pub app_id: String,
    pub app_secret: String,
    /// Added on top of the scheduled duration so a grant outlives admission latency and clock skew.
    pub grant_buffer_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AdmissionSettings {
    pub counter_backend: CounterBackend,
    pub storage_backend: StorageBackend,
    pub counter_ttl_secs: u64,
    pub default_max_participants: u32,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CounterBackend {
    Redis,
    Memory,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Mongo,
    Memory,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::default()
                    .separator("__")
                    .prefix("ROOMGATE"),
            )
            .set_default("app.host", "0.0.0.0")?
            .set_default("app.port", 3000)?
            .set_default("app.cors_origins", Vec::<String>::new())?
            .set_default("database.url", "mongodb://localhost:27017")?
            .set_default("database.name", "roomgate")?
            .set_default("redis.url", "redis://127.0.0.1:6379")?
            .set_default("redis.key_prefix", "roomgate")?
            .set_default("jwt.secret", "change-me-in-production")?
            .set_default("jwt.access_token_ttl_secs", 3600)?
            .set_default("jwt.issuer", "roomgate")?
            .set_default("conferencing.domain", "meet.example.com")?
            .set_default("conferencing.app_id", "roomgate")?
            .set_default("conferencing.app_secret", "change-me-in-production")?
            .set_default("conferencing.grant_buffer_secs", 30 * 60)?
            .set_default("admission.counter_backend", "redis")?
            .set_default("admission.storage_backend", "mongo")?
            .set_default("admission.counter_ttl_secs", 4 * 60 * 60)?
            .set_default("admission.default_max_participants", 20)?
            .build()?;

        config.try_deserialize()
    }
}
