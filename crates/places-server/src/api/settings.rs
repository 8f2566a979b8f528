//! Settings API endpoints.
//!
//! Location authorization and accuracy are advisory values published with the
//! shared state. Privacy opt-out stops all Places processing until the status
//! changes again.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use places_core::{
    AccuracyAuthorization, AuthorizationStatus, PlacesConfig, PlacesError, PrivacyStatus,
    SharedStateProjection,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::error::{ApiResult, ErrorResponse};
use crate::api::places::ensure_opted_in;
use crate::state::SharedState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for setting the location authorization status.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[schema(example = json!({ "status": "always" }))]
pub struct AuthorizationRequest {
    /// One of `always`, `wheninuse`, `denied`, `restricted` or `unknown`.
    /// Unrecognized values are stored as `unknown`.
    #[schema(example = "always")]
    pub status: String,
}

/// Request body for setting the location accuracy.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[schema(example = json!({ "accuracy": "full" }))]
pub struct AccuracyRequest {
    /// `full` or `reduced`. `null` or an unrecognized value clears it.
    #[schema(example = "full", nullable)]
    pub accuracy: Option<String>,
}

/// Request body for setting the privacy status.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[schema(example = json!({ "status": "optedin" }))]
pub struct PrivacyRequest {
    /// New privacy status.
    pub status: PrivacyStatus,
}

/// Privacy status after an update.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PrivacyResponse {
    /// Current privacy status.
    pub status: PrivacyStatus,
}

/// Places settings after an update.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConfigurationResponse {
    /// Whether the settings are usable for lookups.
    #[schema(example = true)]
    pub configured: bool,

    /// The parsed settings, absent if `places.libraries` was missing.
    #[schema(nullable)]
    pub config: Option<PlacesConfig>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Set the location authorization status.
#[utoipa::path(
    put,
    path = "/api/authorization",
    tag = "settings",
    operation_id = "setAuthorizationStatus",
    summary = "Set location authorization",
    request_body = AuthorizationRequest,
    responses(
        (status = 200, description = "Status stored; returns the shared state", body = SharedStateProjection),
        (status = 403, description = "Privacy status is opted-out", body = ErrorResponse)
    )
)]
pub async fn set_authorization_status(
    State(state): State<SharedState>,
    Json(request): Json<AuthorizationRequest>,
) -> ApiResult<Json<SharedStateProjection>> {
    let mut service = state.service().await;
    ensure_opted_in(&service)?;

    service.set_authorization_status(AuthorizationStatus::from_str_lossy(&request.status))?;
    service
        .shared_state()?
        .map(Json)
        .ok_or_else(|| PlacesError::PrivacyOptedOut.into())
}

/// Set the location accuracy.
#[utoipa::path(
    put,
    path = "/api/accuracy",
    tag = "settings",
    operation_id = "setAccuracy",
    summary = "Set location accuracy",
    request_body = AccuracyRequest,
    responses(
        (status = 200, description = "Accuracy stored; returns the shared state", body = SharedStateProjection),
        (status = 403, description = "Privacy status is opted-out", body = ErrorResponse)
    )
)]
pub async fn set_accuracy(
    State(state): State<SharedState>,
    Json(request): Json<AccuracyRequest>,
) -> ApiResult<Json<SharedStateProjection>> {
    let mut service = state.service().await;
    ensure_opted_in(&service)?;

    let accuracy = request
        .accuracy
        .as_deref()
        .and_then(AccuracyAuthorization::parse);
    service.set_accuracy(accuracy)?;
    service
        .shared_state()?
        .map(Json)
        .ok_or_else(|| PlacesError::PrivacyOptedOut.into())
}

/// Set the privacy status.
#[utoipa::path(
    put,
    path = "/api/privacy",
    tag = "settings",
    operation_id = "setPrivacyStatus",
    summary = "Set privacy status",
    description = "Opting out publishes an empty shared state and makes every \
        other request fail with 403 until the status changes.",
    request_body = PrivacyRequest,
    responses(
        (status = 200, description = "Status changed", body = PrivacyResponse)
    )
)]
pub async fn set_privacy_status(
    State(state): State<SharedState>,
    Json(request): Json<PrivacyRequest>,
) -> Json<PrivacyResponse> {
    let mut service = state.service().await;
    service.set_privacy_status(request.status);
    tracing::info!(status = ?request.status, "Privacy status changed");

    Json(PrivacyResponse {
        status: service.privacy_status(),
    })
}

/// Replace the Places settings.
#[utoipa::path(
    put,
    path = "/api/config",
    tag = "settings",
    operation_id = "updateConfiguration",
    summary = "Replace Places settings",
    description = "Accepts a flat configuration object with `places.libraries`, \
        `places.endpoint` and `places.membershipttl` keys. Without \
        `places.libraries` the settings are cleared.",
    request_body(content = Object, description = "Flat configuration object"),
    responses(
        (status = 200, description = "Settings replaced", body = ConfigurationResponse)
    )
)]
pub async fn update_configuration(
    State(state): State<SharedState>,
    Json(data): Json<serde_json::Value>,
) -> Json<ConfigurationResponse> {
    let mut service = state.service().await;
    let configured = service.update_configuration(&data);
    tracing::info!(configured, "Places settings replaced");

    Json(ConfigurationResponse {
        configured,
        config: service.config().cloned(),
    })
}

/// Clear all Places data.
#[utoipa::path(
    post,
    path = "/api/reset",
    tag = "settings",
    operation_id = "reset",
    summary = "Clear all Places data",
    description = "Clears membership, location, authorization and accuracy, and \
        removes them from storage. Allowed while opted-out.",
    responses(
        (status = 204, description = "Data cleared"),
        (status = 500, description = "Storage failure", body = ErrorResponse)
    )
)]
pub async fn reset(State(state): State<SharedState>) -> ApiResult<StatusCode> {
    state.service().await.reset()?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{places_config, poi, send, state_with};
    use axum::http::Method;
    use places_core::QueryResult;
    use serde_json::json;

    #[test]
    fn test_privacy_request_deserialization() {
        let request: PrivacyRequest = serde_json::from_str(r#"{"status": "optedout"}"#).unwrap();
        assert_eq!(request.status, PrivacyStatus::OptedOut);
    }

    #[tokio::test]
    async fn test_authorization_and_accuracy() {
        let state = state_with(QueryResult::ok(Vec::new()), Some(places_config()));

        let (status, body) = send(
            &state,
            Method::PUT,
            "/api/authorization",
            Some(json!({ "status": "wheninuse" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["authstatus"], "wheninuse");

        let (_, body) = send(
            &state,
            Method::PUT,
            "/api/authorization",
            Some(json!({ "status": "sometimes" })),
        )
        .await;
        assert_eq!(body["authstatus"], "unknown");

        let (status, body) = send(
            &state,
            Method::PUT,
            "/api/accuracy",
            Some(json!({ "accuracy": "reduced" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["accuracy"], "reduced");

        let (_, body) = send(
            &state,
            Method::PUT,
            "/api/accuracy",
            Some(json!({ "accuracy": null })),
        )
        .await;
        assert!(body.get("accuracy").is_none());
    }

    #[tokio::test]
    async fn test_privacy_opt_out_and_back() {
        let state = state_with(QueryResult::ok(Vec::new()), Some(places_config()));

        let (status, body) = send(
            &state,
            Method::PUT,
            "/api/privacy",
            Some(json!({ "status": "optedout" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "optedout");

        let (status, _) = send(
            &state,
            Method::PUT,
            "/api/authorization",
            Some(json!({ "status": "always" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        send(
            &state,
            Method::PUT,
            "/api/privacy",
            Some(json!({ "status": "optedin" })),
        )
        .await;
        let (status, _) = send(&state, Method::GET, "/api/state", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_update_configuration() {
        let state = state_with(QueryResult::ok(vec![poi("a", 1, true)]), None);

        let (status, body) = send(
            &state,
            Method::PUT,
            "/api/config",
            Some(json!({
                "places.libraries": [{ "id": "lib1" }],
                "places.endpoint": "places.example.com",
                "places.membershipttl": 120
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["configured"], true);
        assert_eq!(body["config"]["membership_ttl"], 120);

        let (status, _) = send(
            &state,
            Method::POST,
            "/api/nearby",
            Some(json!({ "latitude": 40.0, "longitude": -80.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(&state, Method::PUT, "/api/config", Some(json!({}))).await;
        assert_eq!(body["configured"], false);
        assert!(body["config"].is_null());
    }

    #[tokio::test]
    async fn test_reset_clears_state() {
        let state = state_with(QueryResult::ok(vec![poi("a", 1, true)]), Some(places_config()));
        send(
            &state,
            Method::POST,
            "/api/nearby",
            Some(json!({ "latitude": 40.0, "longitude": -80.0 })),
        )
        .await;

        let (_, body) = send(&state, Method::GET, "/api/state", None).await;
        assert_eq!(body["currentpoi"]["regionid"], "a");

        let (status, body) = send(&state, Method::POST, "/api/reset", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(body.is_null());

        let (_, body) = send(&state, Method::GET, "/api/state", None).await;
        assert!(body.get("currentpoi").is_none());
        assert!(body.get("nearbypois").is_none());
        assert_eq!(body["validuntil"], 0);
    }
}
