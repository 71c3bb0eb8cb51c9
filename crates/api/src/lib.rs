pub mod error;
pub mod extractors;
pub mod routes;
pub mod state;

use axum::{
    Router,
    http::HeaderValue,
    routing::{get, patch, post},
};
use state::AppState;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.settings.app.cors_origins);

    let room_routes = Router::new()
        .route("/", get(routes::room::list).post(routes::room::create))
        .route("/search", get(routes::room::search))
        .route("/timeline", get(routes::room::timeline))
        .route("/user/{user_id}", get(routes::room::by_user))
        .route(
            "/{room_id}",
            get(routes::room::get)
                .patch(routes::room::update)
                .delete(routes::room::delete),
        )
        .route("/{room_id}/join", post(routes::admission::join))
        .route("/{room_id}/leave", post(routes::admission::leave))
        .route("/{room_id}/go-live", post(routes::room::go_live))
        .route("/{room_id}/status", patch(routes::room::update_status))
        .route("/{room_id}/occupancy", get(routes::room::occupancy))
        .route("/{room_id}/attendance", get(routes::attendance::for_room));

    let participant_routes = Router::new()
        .route(
            "/",
            get(routes::participant::list).post(routes::participant::add),
        )
        .route(
            "/{participant_id}",
            patch(routes::participant::update).delete(routes::participant::remove),
        );

    let attendance_routes = Router::new()
        .route("/me", get(routes::attendance::mine))
        .route(
            "/{attendance_id}",
            get(routes::attendance::get).patch(routes::attendance::amend),
        );

    let api = Router::new()
        .nest("/room", room_routes)
        .nest("/room/{room_id}/participant", participant_routes)
        .nest("/attendance", attendance_routes);

    let health = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api)
        .merge(health)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
