//! Route organization and app assembly.

use crate::{
    AppState, auth,
    fabric::websocket_handler,
    handlers::{alerts, analytics, participants, source},
    ingest,
};
use axum::{
    Json, Router,
    extract::State,
    http::HeaderValue,
    routing::{get, post},
};
use serde_json::{Value, json};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

pub fn create_app(state: AppState) -> Router {
    // Dashboard-facing routes, all bearer-authenticated.
    let dashboard = Router::new()
        .route("/participants", get(participants::list_participants))
        .route("/participant/{id}", get(participants::participant_detail))
        .route("/analytics/suspicious", get(analytics::suspicious_participants))
        .route("/analytics/overview", get(analytics::overview))
        .route("/source/register", post(source::register_repository))
        .route("/source/sync/{participant_id}", post(source::sync_repository))
        .route(
            "/source/participant/{id}/analysis",
            get(source::participant_analysis),
        )
        .route(
            "/source/participant/{id}/commits",
            get(source::participant_commits),
        )
        .route("/source/compare", post(source::compare_repositories))
        .route("/source/overview", get(source::source_overview))
        .route("/alerts", post(alerts::post_alert))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ));

    let api = Router::new()
        .route("/events", post(ingest::ingest_handler))
        .route("/auth/login", post(auth::login_handler))
        .merge(dashboard);

    Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(websocket_handler))
        .nest("/api", api)
        .layer(cors_layer(&state))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(state: &AppState) -> CorsLayer {
    match &state.config.cors_origins {
        Some(origins) => {
            let parsed: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| match origin.parse::<HeaderValue>() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        warn!("ignoring malformed CORS origin: {origin}");
                        None
                    }
                })
                .collect();
            CorsLayer::new()
                .allow_origin(parsed)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any)
        }
        None => CorsLayer::permissive(),
    }
}

async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "uptimeSec": state.started_at.elapsed().as_secs(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
