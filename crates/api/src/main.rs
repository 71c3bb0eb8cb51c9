use roomgate_api::{build_router, state::AppState};
use roomgate_config::Settings;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file (silently ignore if missing)
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "roomgate_api=debug,roomgate_services=debug,roomgate_db=debug,tower_http=debug".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::load()?;
    info!("Starting Roomgate API on {}:{}", settings.app.host, settings.app.port);
    info!(
        storage = ?settings.admission.storage_backend,
        counter = ?settings.admission.counter_backend,
        conferencing_domain = %settings.conferencing.domain,
        "Admission backends"
    );

    let app_state = AppState::new(settings.clone()).await?;
    let app = build_router(app_state);

    let addr = format!("{}:{}", settings.app.host, settings.app.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
