use mongodb::{Client, Database, options::ClientOptions};
use roomgate_config::DatabaseSettings;
use tracing::info;

/// Opens the MongoDB pool for room, participant and attendance documents.
pub async fn connect(settings: &DatabaseSettings) -> Result<Database, mongodb::error::Error> {
    let mut client_options = ClientOptions::parse(&settings.url).await?;
    client_options.app_name = Some("roomgate".to_string());
    client_options.max_pool_size = settings.max_pool_size;
    client_options.min_pool_size = settings.min_pool_size;

    let client = Client::with_options(client_options)?;

    // Fail at startup rather than on the first admission
    client
        .database("admin")
        .run_command(bson::doc! { "ping": 1 })
        .await?;

    info!(db = %settings.name, "Connected to MongoDB");

    Ok(client.database(&settings.name))
}
