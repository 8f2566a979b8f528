//! Places API endpoints.
//!
//! A nearby lookup replaces the set of nearby POIs and the POIs the device is
//! within. Region events then move the device in and out of those POIs. The
//! read endpoints report the resulting membership, with stale membership
//! expired on read.

use axum::extract::State;
use axum::Json;
use places_core::{PlacesError, PointOfInterest, RegionEventType, SharedStateProjection};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::state::{Service, SharedState};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for a nearby POI lookup.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[schema(example = json!({
    "latitude": 40.4406,
    "longitude": -79.9959,
    "limit": 10
}))]
pub struct NearbyRequest {
    /// Latitude in degrees, within [-90, 90].
    #[schema(example = 40.4406, minimum = -90.0, maximum = 90.0)]
    pub latitude: f64,

    /// Longitude in degrees, within [-180, 180].
    #[schema(example = -79.9959, minimum = -180.0, maximum = 180.0)]
    pub longitude: f64,

    /// Maximum number of POIs to return. Defaults to 10.
    #[schema(example = 10, minimum = 1)]
    pub limit: Option<usize>,
}

/// Result of a nearby POI lookup.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NearbyResponse {
    /// Lookup status code; 0 on success.
    #[schema(example = 0)]
    pub status: u8,

    /// POIs returned by the query service. POIs the device is within come first.
    pub pois: Vec<PointOfInterest>,
}

/// Request body for a geofence transition.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[schema(example = json!({
    "region_id": "8a1c-coffee",
    "event_type": "entry"
}))]
pub struct RegionEventRequest {
    /// Identifier of a nearby POI.
    #[schema(example = "8a1c-coffee")]
    pub region_id: String,

    /// Either `entry` or `exit`.
    #[schema(example = "entry")]
    pub event_type: String,
}

/// Result of a processed geofence transition.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegionEventResponse {
    /// The transition that was applied.
    pub event_type: RegionEventType,

    /// The nearby POI the transition was applied to.
    pub poi: PointOfInterest,
}

/// A list of POIs.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PoiListResponse {
    /// The POIs.
    pub pois: Vec<PointOfInterest>,

    /// Number of POIs.
    #[schema(example = 1)]
    pub count: usize,
}

/// Coordinate of the most recent lookup.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "latitude": 40.4406,
    "longitude": -79.9959
}))]
pub struct LocationResponse {
    /// Latitude in degrees.
    pub latitude: f64,

    /// Longitude in degrees.
    pub longitude: f64,
}

// ============================================================================
// Handlers
// ============================================================================

pub(crate) fn ensure_opted_in(service: &Service) -> ApiResult<()> {
    if service.privacy_status().is_opted_out() {
        return Err(PlacesError::PrivacyOptedOut.into());
    }
    Ok(())
}

/// Look up POIs near a coordinate.
#[utoipa::path(
    post,
    path = "/api/nearby",
    tag = "places",
    operation_id = "getNearbyPlaces",
    summary = "Look up nearby POIs",
    description = "Queries the Places service for POIs around the coordinate and \
        replaces the nearby and user-within POIs with the result. A failed lookup \
        leaves membership untouched; the numeric lookup status is returned in \
        `details.status`.",
    request_body = NearbyRequest,
    responses(
        (status = 200, description = "Lookup succeeded", body = NearbyResponse),
        (status = 400, description = "Invalid coordinate", body = ErrorResponse),
        (status = 403, description = "Privacy status is opted-out", body = ErrorResponse),
        (status = 424, description = "Places is not configured", body = ErrorResponse),
        (status = 503, description = "The query service failed", body = ErrorResponse)
    )
)]
pub async fn get_nearby_places(
    State(state): State<SharedState>,
    Json(request): Json<NearbyRequest>,
) -> ApiResult<Json<NearbyResponse>> {
    let mut service = state.service().await;
    let result = service
        .get_nearby_places(request.latitude, request.longitude, request.limit)
        .await?;

    if !result.response.is_ok() {
        tracing::info!(status = %result.response, "Nearby places lookup did not succeed");
        return Err(ApiError::from_query_status(result.response));
    }

    Ok(Json(NearbyResponse {
        status: result.response.code(),
        pois: result.pois,
    }))
}

/// Apply a geofence entry or exit.
#[utoipa::path(
    post,
    path = "/api/region-events",
    tag = "places",
    operation_id = "processRegionEvent",
    summary = "Process a region event",
    description = "Records that the device entered or exited a nearby POI and \
        recomputes the current POI. The region must be among the POIs returned \
        by the last nearby lookup.",
    request_body = RegionEventRequest,
    responses(
        (status = 200, description = "Event applied", body = RegionEventResponse),
        (status = 400, description = "Invalid event type", body = ErrorResponse),
        (status = 403, description = "Privacy status is opted-out", body = ErrorResponse),
        (status = 404, description = "Region is not a nearby POI", body = ErrorResponse),
        (status = 424, description = "Places is not configured", body = ErrorResponse)
    )
)]
pub async fn process_region_event(
    State(state): State<SharedState>,
    Json(request): Json<RegionEventRequest>,
) -> ApiResult<Json<RegionEventResponse>> {
    let event_type: RegionEventType = request
        .event_type
        .parse()
        .map_err(|_| PlacesError::InvalidRegionEventType(request.event_type.clone()))?;

    let mut service = state.service().await;
    match service.process_region_event(&request.region_id, event_type)? {
        Some(poi) => Ok(Json(RegionEventResponse { event_type, poi })),
        None if service.privacy_status().is_opted_out() => {
            Err(PlacesError::PrivacyOptedOut.into())
        }
        None => Err(PlacesError::PlacesNotConfigured.into()),
    }
}

/// Get the shared state projection.
#[utoipa::path(
    get,
    path = "/api/state",
    tag = "places",
    operation_id = "getSharedState",
    summary = "Get the shared state",
    description = "Returns the membership snapshot as published to consumers. \
        Expired membership is cleared first.",
    responses(
        (status = 200, description = "Current shared state", body = SharedStateProjection),
        (status = 403, description = "Privacy status is opted-out", body = ErrorResponse)
    )
)]
pub async fn get_shared_state(
    State(state): State<SharedState>,
) -> ApiResult<Json<SharedStateProjection>> {
    let mut service = state.service().await;
    service
        .shared_state()?
        .map(Json)
        .ok_or_else(|| PlacesError::PrivacyOptedOut.into())
}

/// Get the POIs the device is within.
#[utoipa::path(
    get,
    path = "/api/pois/within",
    tag = "places",
    operation_id = "getUserWithinPlaces",
    summary = "List POIs the device is within",
    responses(
        (status = 200, description = "POIs the device is within", body = PoiListResponse),
        (status = 403, description = "Privacy status is opted-out", body = ErrorResponse)
    )
)]
pub async fn get_user_within_places(
    State(state): State<SharedState>,
) -> ApiResult<Json<PoiListResponse>> {
    let service = state.service().await;
    ensure_opted_in(&service)?;

    let pois = service.user_within_places();
    Ok(Json(PoiListResponse {
        count: pois.len(),
        pois,
    }))
}

/// Get the current POI.
#[utoipa::path(
    get,
    path = "/api/pois/current",
    tag = "places",
    operation_id = "getCurrentPoi",
    summary = "Get the current POI",
    description = "Returns the highest-priority POI the device is within. \
        Lower weight wins, then smaller radius.",
    responses(
        (status = 200, description = "Current POI", body = PointOfInterest),
        (status = 403, description = "Privacy status is opted-out", body = ErrorResponse),
        (status = 404, description = "Not within any POI", body = ErrorResponse)
    )
)]
pub async fn get_current_poi(
    State(state): State<SharedState>,
) -> ApiResult<Json<PointOfInterest>> {
    let mut service = state.service().await;
    ensure_opted_in(&service)?;

    service
        .current_poi()?
        .map(Json)
        .ok_or_else(|| PlacesError::NoCurrentPoi.into())
}

/// Get the last known location.
#[utoipa::path(
    get,
    path = "/api/location",
    tag = "places",
    operation_id = "getLastKnownLocation",
    summary = "Get the last known location",
    responses(
        (status = 200, description = "Coordinate of the last lookup", body = LocationResponse),
        (status = 403, description = "Privacy status is opted-out", body = ErrorResponse),
        (status = 404, description = "No lookup has been made", body = ErrorResponse)
    )
)]
pub async fn get_last_known_location(
    State(state): State<SharedState>,
) -> ApiResult<Json<LocationResponse>> {
    let service = state.service().await;
    ensure_opted_in(&service)?;

    let (latitude, longitude) = service
        .last_known_location()
        .ok_or(PlacesError::NoKnownLocation)?;
    Ok(Json(LocationResponse {
        latitude,
        longitude,
    }))
}
