use bson::oid::ObjectId;
use mongodb::Database;
use redis::AsyncCommands;
use roomgate_api::{build_router, state::AppState};
use roomgate_config::{
    AdmissionSettings, AppSettings, ConferencingSettings, CounterBackend, DatabaseSettings,
    JwtSettings, RedisSettings, Settings, StorageBackend,
};
use roomgate_db::connect;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// A running test application.
pub struct TestApp {
    pub addr: SocketAddr,
    pub base_url: String,
    pub state: AppState,
    pub client: reqwest::Client,
    /// The app's own MongoDB database, dropped with the app. `None` for in-process stores.
    pub db: Option<Database>,
}

impl TestApp {
    /// Spawn a test server on an ephemeral port over in-process stores and counter.
    /// Needs no external services.
    pub async fn spawn() -> Self {
        Self::spawn_with_settings(|_| {}).await
    }

    /// Spawn a test server with customized settings.
    ///
    /// The `mutator` closure receives a `&mut Settings` after defaults are applied,
    /// allowing tests to tweak specific fields (e.g., the default room ceiling).
    pub async fn spawn_with_settings(mutator: impl FnOnce(&mut Settings)) -> Self {
        let mut settings = test_settings();
        mutator(&mut settings);
        Self::serve(settings, None).await
    }

    /// Spawn a test server over MongoDB and the Redis counter.
    ///
    /// Requires a running MongoDB at localhost:27019 and Redis at localhost:6379.
    /// Set ROOMGATE__DATABASE__URL or ROOMGATE__REDIS__URL to override them.
    /// Each app gets a unique database name and counter key prefix for isolation.
    pub async fn spawn_backed() -> Self {
        let scope = format!("roomgate_test_{}", ObjectId::new().to_hex());

        let mut settings = test_settings();
        if let Ok(url) = std::env::var("ROOMGATE__DATABASE__URL") {
            settings.database.url = url;
        }
        if let Ok(url) = std::env::var("ROOMGATE__REDIS__URL") {
            settings.redis.url = url;
        }
        settings.database.name = scope.clone();
        settings.redis.key_prefix = scope;
        settings.admission.storage_backend = StorageBackend::Mongo;
        settings.admission.counter_backend = CounterBackend::Redis;

        let db = connect(&settings.database)
            .await
            .expect("Failed to connect to MongoDB");
        Self::serve(settings, Some(db)).await
    }

    async fn serve(settings: Settings, db: Option<Database>) -> Self {
        let state = AppState::new(settings)
            .await
            .expect("Failed to create AppState");
        let app = build_router(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let base_url = format!("http://{}", addr);
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            addr,
            base_url,
            state,
            client,
            db,
        }
    }

    /// Redis key holding a room's live count.
    pub fn count_key(&self, room_id: &str) -> String {
        format!(
            "{}:room:{{{}}}:participants",
            self.state.settings.redis.key_prefix, room_id
        )
    }

    pub async fn redis(&self) -> redis::aio::MultiplexedConnection {
        redis::Client::open(self.state.settings.redis.url.as_str())
            .expect("Invalid Redis URL")
            .get_multiplexed_async_connection()
            .await
            .expect("Failed to connect to Redis")
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let Some(db) = self.db.take() else {
            return;
        };
        let redis_url = self.state.settings.redis.url.clone();
        let pattern = format!("{}:*", self.state.settings.redis.key_prefix);
        // Best effort cleanup: drop the test database and the counter keys
        tokio::spawn(async move {
            let _ = db.drop().await;
            let Ok(client) = redis::Client::open(redis_url) else {
                return;
            };
            if let Ok(mut conn) = client.get_multiplexed_async_connection().await {
                let keys: Vec<String> = conn.keys(pattern).await.unwrap_or_default();
                if !keys.is_empty() {
                    let _: redis::RedisResult<()> = conn.del(keys).await;
                }
            }
        });
    }
}

fn test_settings() -> Settings {
    Settings {
        app: AppSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origins: vec![],
        },
        database: DatabaseSettings {
            url: "mongodb://localhost:27019".to_string(),
            name: "roomgate_test".to_string(),
            max_pool_size: Some(5),
            min_pool_size: Some(1),
        },
        redis: RedisSettings {
            url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: "roomgate_test".to_string(),
        },
        jwt: JwtSettings {
            secret: "test-secret-key-for-jwt-signing-minimum-32-chars".to_string(),
            access_token_ttl_secs: 3600,
            issuer: "roomgate".to_string(),
        },
        conferencing: ConferencingSettings {
            domain: "meet.test".to_string(),
            app_id: "roomgate-test".to_string(),
            app_secret: "test-conferencing-secret".to_string(),
            grant_buffer_secs: 1800,
        },
        admission: AdmissionSettings {
            counter_backend: CounterBackend::Memory,
            storage_backend: StorageBackend::Memory,
            counter_ttl_secs: 3600,
            default_max_participants: 20,
        },
    }
}
