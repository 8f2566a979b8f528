//! HTTP API routes and handlers.
//!
//! Endpoints are grouped by domain:
//! - `health` - Service health checks
//! - `places` - Nearby lookups, region events and membership reads
//! - `settings` - Authorization, accuracy, privacy, configuration and reset
//! - `error` - API error types
//! - `openapi` - OpenAPI specification generation

use axum::routing::{get, post, put};
use axum::Router;

use crate::state::SharedState;

pub mod error;
pub mod health;
pub mod openapi;
pub mod places;
pub mod settings;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use openapi::get_openapi_json;

/// Creates the combined API router with all endpoints.
///
/// # Route Structure
///
/// ```text
/// /health                - Health check
/// /api
/// ├── /nearby            - Nearby POI lookup
/// ├── /region-events     - Geofence entry/exit
/// ├── /state             - Shared state projection
/// ├── /pois/within       - POIs the device is within
/// ├── /pois/current      - Highest-priority POI
/// ├── /location          - Last known location
/// ├── /authorization     - Location authorization status
/// ├── /accuracy          - Location accuracy
/// ├── /privacy           - Privacy status
/// ├── /config            - Places settings
/// ├── /reset             - Clear all data
/// └── /openapi.json      - OpenAPI specification
/// ```
pub fn create_router(state: SharedState) -> Router {
    let api = Router::new()
        .route("/nearby", post(places::get_nearby_places))
        .route("/region-events", post(places::process_region_event))
        .route("/state", get(places::get_shared_state))
        .route("/pois/within", get(places::get_user_within_places))
        .route("/pois/current", get(places::get_current_poi))
        .route("/location", get(places::get_last_known_location))
        .route("/authorization", put(settings::set_authorization_status))
        .route("/accuracy", put(settings::set_accuracy))
        .route("/privacy", put(settings::set_privacy_status))
        .route("/config", put(settings::update_configuration))
        .route("/reset", post(settings::reset))
        .route("/openapi.json", get(openapi::get_openapi_spec));

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api", api)
        .with_state(state)
}
