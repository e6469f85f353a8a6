use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use govcast_core::GovcastConfig;
use govcast_hub::{ConnectionManager, EventEmitter, Hub};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Central shared state: passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub hub: Arc<Hub>,
    pub manager: ConnectionManager,
    pub emitter: EventEmitter,
}

impl AppState {
    pub fn new(config: GovcastConfig) -> Self {
        let hub = Hub::new(config);
        Self {
            manager: ConnectionManager::new(hub.clone()),
            emitter: EventEmitter::new(hub.clone()),
            hub,
        }
    }

    pub fn config(&self) -> &GovcastConfig {
        self.hub.config()
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(state.config());
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/metrics", get(crate::http::health::metrics_handler))
        .route("/channels", get(crate::http::health::channels_handler))
        .route("/ws", get(crate::ws::connection::ws_handler))
        .route(
            "/internal/events/{channel}",
            post(crate::http::ingest::ingest_handler),
        )
        .with_state(state)
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

fn cors_layer(config: &GovcastConfig) -> CorsLayer {
    let origins = &config.server.allowed_origins;
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            origins
                .iter()
                .filter_map(|o| HeaderValue::from_str(o.trim_end_matches('/')).ok()),
        )
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}
