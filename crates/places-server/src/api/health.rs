//! Health check API endpoint.
//!
//! Provides a simple health check endpoint for monitoring and load balancers.

use axum::extract::State;
use axum::Json;
use places_core::PrivacyStatus;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::SharedState;

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "status": "ok",
    "version": "0.1.0",
    "places_configured": true,
    "privacy": "optedin",
    "started_at": "2026-10-14T08:00:00Z"
}))]
pub struct HealthResponse {
    /// Service status.
    #[schema(example = "ok")]
    pub status: String,

    /// Service version from Cargo.toml.
    #[schema(example = "0.1.0")]
    pub version: String,

    /// Whether the Places settings are usable for lookups.
    #[schema(example = true)]
    pub places_configured: bool,

    /// Current privacy status.
    pub privacy: PrivacyStatus,

    /// When the server started, RFC 3339.
    #[schema(example = "2026-10-14T08:00:00Z")]
    pub started_at: String,
}

/// Health check endpoint.
///
/// Returns basic service status information including version and
/// whether Places is configured.
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    operation_id = "healthCheck",
    summary = "Check service health",
    description = "Returns basic service status information. Use this endpoint \
        for load balancer health checks and monitoring.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<SharedState>) -> Json<HealthResponse> {
    let service = state.service().await;

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        places_configured: service.config().is_some_and(places_core::PlacesConfig::is_valid),
        privacy: service.privacy_status(),
        started_at: state.started_at().to_rfc3339(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{places_config, send, state_with};
    use axum::http::{Method, StatusCode};
    use places_core::QueryResult;

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: "ok".to_string(),
            version: "0.1.0".to_string(),
            places_configured: false,
            privacy: PrivacyStatus::Unknown,
            started_at: "2026-10-14T08:00:00Z".to_string(),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"status\":\"ok\""));
        assert!(json.contains("\"places_configured\":false"));
        assert!(json.contains("\"privacy\":\"unknown\""));
    }

    #[tokio::test]
    async fn test_health_reports_configuration() {
        let state = state_with(QueryResult::ok(Vec::new()), Some(places_config()));
        let (status, body) = send(&state, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["places_configured"], true);

        let state = state_with(QueryResult::ok(Vec::new()), None);
        let (_, body) = send(&state, Method::GET, "/health", None).await;
        assert_eq!(body["places_configured"], false);
    }
}
