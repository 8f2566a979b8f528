//! Externally-visible projection of the membership snapshot.
//!
//! This is what downstream consumers see as the Places shared state. Optional
//! fields are omitted when empty; `authstatus` and `validuntil` are always
//! present.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::authorization::{AccuracyAuthorization, AuthorizationStatus};
use crate::poi::PointOfInterest;

/// Published shared state for Places.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "nearbypois": {
        "8a1c-coffee": "{\"regionid\":\"8a1c-coffee\",\"regionname\":\"Corner Coffee\"}"
    },
    "authstatus": "always",
    "validuntil": 1760400000
}))]
pub struct SharedStateProjection {
    /// Nearby POIs keyed by identifier, each value a serialized POI.
    #[serde(rename = "nearbypois", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub nearby_pois: BTreeMap<String, String>,

    /// Highest-priority POI the device is within.
    #[serde(rename = "currentpoi", default, skip_serializing_if = "Option::is_none")]
    pub current_poi: Option<PointOfInterest>,

    /// Most recently entered POI.
    #[serde(rename = "lastenteredpoi", default, skip_serializing_if = "Option::is_none")]
    pub last_entered_poi: Option<PointOfInterest>,

    /// Most recently exited POI.
    #[serde(rename = "lastexitedpoi", default, skip_serializing_if = "Option::is_none")]
    pub last_exited_poi: Option<PointOfInterest>,

    /// Location accuracy, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<AccuracyAuthorization>,

    /// Location authorization status.
    #[serde(rename = "authstatus")]
    pub auth_status: AuthorizationStatus,

    /// Epoch seconds until which membership data is valid; 0 if unset.
    #[serde(rename = "validuntil")]
    pub valid_until: i64,
}

impl SharedStateProjection {
    /// Decode the serialized nearby POIs, skipping any that fail to parse.
    #[must_use]
    pub fn decoded_nearby_pois(&self) -> Vec<PointOfInterest> {
        self.nearby_pois
            .values()
            .filter_map(|json| PointOfInterest::from_json_str(json).ok())
            .collect()
    }
}
