//! flavorsnap-api library interface
//!
//! Exposes the router and state for the binary and for integration tests.

pub mod api;
pub mod error;
pub mod storage;

pub use crate::error::{ApiError, ApiResult};

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method};
use axum::Router;
use chrono::{DateTime, Utc};
use flavorsnap_common::config::{FlavorSnapConfig, ServerConfig};
use flavorsnap_common::{Logger, ObservabilityLayer, UploadValidator};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

/// Body limit headroom above the upload maximum.
///
/// Uploads slightly over the maximum still reach the validator and get a
/// 400 with a readable reason instead of a bare 413.
pub const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Structured API telemetry
    pub logger: Logger,
    pub validator: UploadValidator,
    pub server: Arc<ServerConfig>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(logger: Logger, validator: UploadValidator, server: ServerConfig) -> Self {
        Self {
            logger,
            validator,
            server: Arc::new(server),
            startup_time: Utc::now(),
        }
    }

    pub fn from_config(config: &FlavorSnapConfig, logger: Logger) -> Self {
        Self::new(
            logger,
            UploadValidator::from_config(&config.upload),
            config.server.clone(),
        )
    }
}

/// Build application router
///
/// The observability layer is outermost so it sees every request,
/// including ones rejected by the body limit or CORS.
pub fn build_router(state: AppState) -> Router {
    let body_limit = usize::try_from(state.validator.max_bytes())
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD_BYTES);
    let cors = cors_layer(&state.server.allowed_origins);
    let observability = ObservabilityLayer::new(state.logger.clone());

    let mut router = Router::new()
        .merge(api::predict_routes())
        .merge(api::health_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state);

    if let Some(cors) = cors {
        router = router.layer(cors);
    }

    router.layer(observability)
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    if origins.is_empty() {
        return None;
    }

    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    Some(
        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(Any),
    )
}
