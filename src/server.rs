use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::handlers;
use crate::middleware::{require_session, require_user};
use crate::store::StoreConnector;

/// Shared, read-only per-process state; everything per-request is built by the guards
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub connector: Arc<dyn StoreConnector>,
}

impl AppState {
    pub fn new(config: AppConfig, connector: impl StoreConnector + 'static) -> Self {
        Self {
            config: Arc::new(config),
            connector: Arc::new(connector),
        }
    }
}

pub fn app(state: AppState) -> Router {
    let mut router = Router::new()
        // Public
        .route("/health", get(handlers::health))
        // Protected
        .merge(message_routes(state.clone()))
        // Global middleware
        .layer(DefaultBodyLimit::max(state.config.api.max_request_size_bytes))
        .layer(cors_layer(&state.config));

    if state.config.api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }

    router
}

fn message_routes(state: AppState) -> Router {
    use handlers::messages;

    // Reads always resolve the caller's identity
    let reads = Router::new()
        .route("/messages", post(messages::query_post))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_user));

    let writes = Router::new()
        .route("/messages/delete", post(messages::delete_post))
        .route("/messages/mark-complete", post(messages::mark_complete_post))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session));

    reads.merge(writes).with_state(state)
}

/// Only configured origins, GET/POST, credentials allowed
fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}
