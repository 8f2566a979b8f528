//! OpenAPI specification generation for the places API.
//!
//! The document is served at `/api/openapi.json` and written to disk by the
//! `gen-openapi` binary for client generation.

use axum::Json;
use places_core::{
    AccuracyAuthorization, AuthorizationStatus, PlacesConfig, PlacesLibrary, PointOfInterest,
    PrivacyStatus, RegionEventType, SharedStateProjection,
};
use utoipa::OpenApi;

use super::error::ErrorResponse;
use super::health::HealthResponse;
use super::places::{
    LocationResponse, NearbyRequest, NearbyResponse, PoiListResponse, RegionEventRequest,
    RegionEventResponse,
};
use super::settings::{
    AccuracyRequest, AuthorizationRequest, ConfigurationResponse, PrivacyRequest,
    PrivacyResponse,
};

/// Serve the OpenAPI specification as JSON.
pub async fn get_openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Returns the OpenAPI specification as pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if the document cannot be serialized.
pub fn get_openapi_json() -> Result<String, serde_json::Error> {
    ApiDoc::openapi().to_pretty_json()
}

/// Main OpenAPI document structure for places.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "places API",
        version = "0.1.0",
        description = r#"
# places API

places tracks which geofenced points of interest (POIs) a device is inside.

## Overview

1. **Nearby lookup**: `POST /api/nearby` asks the Places query service for POIs
   around a coordinate. POIs the device is already within are marked
   `useriswithin`.
2. **Region events**: `POST /api/region-events` records a geofence entry or
   exit for one of the nearby POIs.
3. **Current POI**: among the POIs the device is within, the one with the
   lowest weight wins, then the smallest radius.

Membership is valid for the configured TTL after each update. Stale
membership is cleared the next time it is read.

## Privacy

While the privacy status is `optedout`, every request except
`PUT /api/privacy`, `PUT /api/config` and `POST /api/reset` fails with 403.
"#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "/", description = "Local places server")
    ),
    tags(
        (name = "system", description = "Health checks"),
        (name = "places", description = "Nearby lookups, region events and membership"),
        (name = "settings", description = "Authorization, accuracy, privacy and Places settings")
    ),
    paths(
        super::health::health_check,
        super::places::get_nearby_places,
        super::places::process_region_event,
        super::places::get_shared_state,
        super::places::get_user_within_places,
        super::places::get_current_poi,
        super::places::get_last_known_location,
        super::settings::set_authorization_status,
        super::settings::set_accuracy,
        super::settings::set_privacy_status,
        super::settings::update_configuration,
        super::settings::reset,
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            // Places types
            PointOfInterest,
            SharedStateProjection,
            RegionEventType,
            NearbyRequest,
            NearbyResponse,
            RegionEventRequest,
            RegionEventResponse,
            PoiListResponse,
            LocationResponse,
            // Settings types
            AuthorizationStatus,
            AccuracyAuthorization,
            PrivacyStatus,
            PlacesConfig,
            PlacesLibrary,
            AuthorizationRequest,
            AccuracyRequest,
            PrivacyRequest,
            PrivacyResponse,
            ConfigurationResponse,
        )
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_generation() {
        let spec = ApiDoc::openapi();
        assert_eq!(spec.info.title, "places API");
        assert!(spec.paths.paths.contains_key("/api/region-events"));
        assert!(spec.paths.paths.contains_key("/health"));
    }

    #[test]
    fn test_openapi_json_serialization() {
        let json = get_openapi_json().unwrap();
        assert!(json.contains("\"openapi\":"));
        assert!(json.contains("\"places API\""));
    }
}
