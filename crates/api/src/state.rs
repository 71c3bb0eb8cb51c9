use std::sync::Arc;

use roomgate_config::{CounterBackend, Settings, StorageBackend};
use roomgate_db::{connect, indexes::ensure_indexes};
use roomgate_services::{
    AdmissionService, AuthService, GrantIssuer, OccupancyCounter, Stores,
    capacity::{MemoryOccupancyCounter, RedisOccupancyCounter},
};
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub auth: Arc<AuthService>,
    pub admission: Arc<AdmissionService>,
}

impl AppState {
    /// Connects the configured backends and wires the admission service over them.
    pub async fn new(settings: Settings) -> anyhow::Result<Self> {
        let stores = match settings.admission.storage_backend {
            StorageBackend::Mongo => {
                let db = connect(&settings.database).await?;
                ensure_indexes(&db).await?;
                Stores::mongo(&db)
            }
            StorageBackend::Memory => {
                info!("Using in-process room and participant stores");
                Stores::in_memory()
            }
        };

        let counter: Arc<dyn OccupancyCounter> = match settings.admission.counter_backend {
            CounterBackend::Redis => Arc::new(
                RedisOccupancyCounter::connect(&settings.redis.url, &settings.redis.key_prefix)
                    .await?,
            ),
            CounterBackend::Memory => {
                info!("Using in-process occupancy counter");
                Arc::new(MemoryOccupancyCounter::new())
            }
        };

        Ok(Self::with_backends(settings, stores, counter))
    }

    pub fn with_backends(
        settings: Settings,
        stores: Stores,
        counter: Arc<dyn OccupancyCounter>,
    ) -> Self {
        let auth = Arc::new(AuthService::new(settings.jwt.clone()));
        let admission = Arc::new(AdmissionService::new(
            stores,
            counter,
            GrantIssuer::new(settings.conferencing.clone()),
            settings.admission.clone(),
        ));

        Self {
            settings,
            auth,
            admission,
        }
    }
}
