//! Points of Interest.
//!
//! A [`PointOfInterest`] is a named circular geofence with a priority weight.
//! POIs travel in two JSON shapes:
//!
//! - the flat persisted/shared form (`regionid`, `regionname`, `latitude`, ...)
//!   used for storage and shared state, and
//! - the compact query-service form, where the core fields live in a positional
//!   array under `p` and metadata under `x`.
//!
//! Both readers are tolerant: a wrongly-typed or missing field falls back to its
//! default instead of failing. Only a structurally unusable document is rejected.

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use utoipa::ToSchema;

use crate::priority;

/// Sentinel used for a latitude or longitude that is absent or invalid.
pub const INVALID_LAT_LON: f64 = 999.999;

/// Number of positional entries in a query-service POI array.
pub const QUERY_ARRAY_LENGTH: usize = 7;

/// Field names of the flat POI representation.
pub mod keys {
    /// Unique identifier of the region.
    pub const REGION_ID: &str = "regionid";
    /// Human-readable region name.
    pub const REGION_NAME: &str = "regionname";
    /// Latitude of the region center.
    pub const LATITUDE: &str = "latitude";
    /// Longitude of the region center.
    pub const LONGITUDE: &str = "longitude";
    /// Radius in meters.
    pub const RADIUS: &str = "radius";
    /// Priority weight.
    pub const WEIGHT: &str = "weight";
    /// Library the POI belongs to.
    pub const LIBRARY_ID: &str = "libraryid";
    /// Whether the device is within the region.
    pub const USER_IS_WITHIN: &str = "useriswithin";
    /// Free-form string metadata.
    pub const REGION_METADATA: &str = "regionmetadata";
}

mod query_keys {
    pub const POI: &str = "p";
    pub const META_DATA: &str = "x";

    pub const ID: usize = 0;
    pub const NAME: usize = 1;
    pub const LATITUDE: usize = 2;
    pub const LONGITUDE: usize = 3;
    pub const RADIUS: usize = 4;
    pub const LIBRARY_ID: usize = 5;
    pub const WEIGHT: usize = 6;
}

/// Errors raised while constructing a [`PointOfInterest`].
#[derive(Debug, Error)]
pub enum PoiError {
    /// The input was not a JSON object.
    #[error("Invalid POI JSON: {0}")]
    InvalidJson(String),

    /// A query-service element did not contain a usable `p` array.
    #[error("Invalid POI query object: {0}")]
    InvalidQueryObject(String),
}

/// A geofenced Point of Interest.
///
/// Equality and hashing consider only [`identifier`](Self::identifier).
#[derive(Debug, Clone, Serialize, ToSchema)]
#[schema(example = json!({
    "regionid": "8a1c-coffee",
    "regionname": "Corner Coffee",
    "latitude": 40.4406,
    "longitude": -79.9959,
    "radius": 150,
    "weight": 10,
    "libraryid": "lib-pittsburgh",
    "useriswithin": true,
    "regionmetadata": { "category": "cafe" }
}))]
pub struct PointOfInterest {
    #[serde(rename = "regionid")]
    identifier: String,

    #[serde(rename = "regionname")]
    name: String,

    latitude: f64,

    longitude: f64,

    /// Radius in meters.
    radius: i64,

    /// Lower weight means higher priority.
    weight: i64,

    #[serde(rename = "libraryid")]
    library_id: String,

    #[serde(rename = "useriswithin")]
    user_is_within: bool,

    #[serde(rename = "regionmetadata")]
    metadata: BTreeMap<String, String>,
}

impl PointOfInterest {
    /// Create a POI with the given identifier and name.
    ///
    /// Location defaults to the invalid sentinel, numeric fields to zero.
    pub fn new(identifier: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            name: name.into(),
            latitude: INVALID_LAT_LON,
            longitude: INVALID_LAT_LON,
            radius: 0,
            weight: 0,
            library_id: String::new(),
            user_is_within: false,
            metadata: BTreeMap::new(),
        }
    }

    /// Set the center of the region.
    #[must_use]
    pub fn with_location(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = latitude;
        self.longitude = longitude;
        self
    }

    /// Set the radius in meters.
    #[must_use]
    pub fn with_radius(mut self, radius: i64) -> Self {
        self.radius = radius;
        self
    }

    /// Set the priority weight.
    #[must_use]
    pub fn with_weight(mut self, weight: i64) -> Self {
        self.weight = weight;
        self
    }

    /// Set the owning library.
    #[must_use]
    pub fn with_library_id(mut self, library_id: impl Into<String>) -> Self {
        self.library_id = library_id.into();
        self
    }

    /// Mark whether the device is within this POI.
    #[must_use]
    pub fn with_user_within(mut self, user_is_within: bool) -> Self {
        self.user_is_within = user_is_within;
        self
    }

    /// Attach metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Unique identifier.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Latitude of the center, or [`INVALID_LAT_LON`].
    #[must_use]
    pub const fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Longitude of the center, or [`INVALID_LAT_LON`].
    #[must_use]
    pub const fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Radius in meters.
    #[must_use]
    pub const fn radius(&self) -> i64 {
        self.radius
    }

    /// Priority weight.
    #[must_use]
    pub const fn weight(&self) -> i64 {
        self.weight
    }

    /// Owning library.
    #[must_use]
    pub fn library_id(&self) -> &str {
        &self.library_id
    }

    /// Whether the device is within this POI.
    #[must_use]
    pub const fn user_is_within(&self) -> bool {
        self.user_is_within
    }

    /// String metadata.
    #[must_use]
    pub const fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// Whether this POI should be preferred over `other` as the current POI.
    ///
    /// See [`priority::has_priority`].
    #[must_use]
    pub fn has_priority_over(&self, other: &Self) -> bool {
        priority::has_priority(self, other)
    }

    /// Parse the flat JSON representation.
    ///
    /// # Errors
    ///
    /// Returns [`PoiError::InvalidJson`] if the string is not a JSON object.
    pub fn from_json_str(json: &str) -> Result<Self, PoiError> {
        let value: Value = serde_json::from_str(json).map_err(|e| {
            tracing::warn!(error = %e, "Unable to read a PointOfInterest json string");
            PoiError::InvalidJson(e.to_string())
        })?;
        Self::from_json_value(&value)
    }

    /// Build a POI from an already-parsed flat JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`PoiError::InvalidJson`] if `value` is not an object.
    pub fn from_json_value(value: &Value) -> Result<Self, PoiError> {
        let Some(object) = value.as_object() else {
            tracing::warn!("PointOfInterest json is not an object");
            return Err(PoiError::InvalidJson("expected a JSON object".into()));
        };

        Ok(Self {
            identifier: string_or_default(object.get(keys::REGION_ID)),
            name: string_or_default(object.get(keys::REGION_NAME)),
            latitude: coordinate_or_sentinel(object.get(keys::LATITUDE)),
            longitude: coordinate_or_sentinel(object.get(keys::LONGITUDE)),
            radius: integer_or_zero(object.get(keys::RADIUS)),
            weight: integer_or_zero(object.get(keys::WEIGHT)),
            library_id: string_or_default(object.get(keys::LIBRARY_ID)),
            user_is_within: object
                .get(keys::USER_IS_WITHIN)
                .and_then(Value::as_bool)
                .unwrap_or(false),
            metadata: metadata_or_empty(object.get(keys::REGION_METADATA)),
        })
    }

    /// Build a POI from one element of a query-service response.
    ///
    /// The element must carry a `p` array of exactly seven entries:
    /// `[id, name, latitude, longitude, radius, libraryId, weight]`.
    /// Metadata is read from the optional `x` object.
    ///
    /// # Errors
    ///
    /// Returns [`PoiError::InvalidQueryObject`] if `p` is missing, not an array,
    /// or has the wrong length.
    pub fn from_query_object(value: &Value, user_is_within: bool) -> Result<Self, PoiError> {
        let Some(info) = value.get(query_keys::POI).and_then(Value::as_array) else {
            tracing::warn!("Query-service POI element has no 'p' array");
            return Err(PoiError::InvalidQueryObject("missing 'p' array".into()));
        };

        if info.len() != QUERY_ARRAY_LENGTH {
            tracing::warn!(
                expected = QUERY_ARRAY_LENGTH,
                actual = info.len(),
                "Query-service POI array has the wrong number of elements"
            );
            return Err(PoiError::InvalidQueryObject(format!(
                "expected {QUERY_ARRAY_LENGTH} elements, got {}",
                info.len()
            )));
        }

        Ok(Self {
            identifier: string_or_default(info.get(query_keys::ID)),
            name: string_or_default(info.get(query_keys::NAME)),
            latitude: coordinate_or_sentinel(info.get(query_keys::LATITUDE)),
            longitude: coordinate_or_sentinel(info.get(query_keys::LONGITUDE)),
            radius: integer_or_zero(info.get(query_keys::RADIUS)),
            library_id: string_or_default(info.get(query_keys::LIBRARY_ID)),
            weight: integer_or_zero(info.get(query_keys::WEIGHT)),
            user_is_within,
            metadata: metadata_or_empty(value.get(query_keys::META_DATA)),
        })
    }

    /// Serialize to the flat JSON representation.
    #[must_use]
    pub fn to_json_value(&self) -> Value {
        let mut map = Map::new();
        map.insert(keys::REGION_ID.into(), Value::from(self.identifier.clone()));
        map.insert(keys::REGION_NAME.into(), Value::from(self.name.clone()));
        map.insert(keys::LATITUDE.into(), Value::from(self.latitude));
        map.insert(keys::LONGITUDE.into(), Value::from(self.longitude));
        map.insert(keys::RADIUS.into(), Value::from(self.radius));
        map.insert(keys::WEIGHT.into(), Value::from(self.weight));
        map.insert(keys::LIBRARY_ID.into(), Value::from(self.library_id.clone()));
        map.insert(keys::USER_IS_WITHIN.into(), Value::from(self.user_is_within));
        map.insert(
            keys::REGION_METADATA.into(),
            Value::Object(
                self.metadata
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from(v.clone())))
                    .collect(),
            ),
        );
        Value::Object(map)
    }

    /// Serialize to a flat JSON string.
    #[must_use]
    pub fn to_json_string(&self) -> String {
        self.to_json_value().to_string()
    }
}

impl PartialEq for PointOfInterest {
    fn eq(&self, other: &Self) -> bool {
        self.identifier == other.identifier
    }
}

impl Eq for PointOfInterest {}

impl Hash for PointOfInterest {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identifier.hash(state);
    }
}

impl<'de> Deserialize<'de> for PointOfInterest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Self::from_json_value(&value).map_err(serde::de::Error::custom)
    }
}

fn string_or_default(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_str)
        .map(str::to_owned)
        .unwrap_or_default()
}

fn coordinate_or_sentinel(value: Option<&Value>) -> f64 {
    value
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite())
        .unwrap_or(INVALID_LAT_LON)
}

#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
fn integer_or_zero(value: Option<&Value>) -> i64 {
    match value {
        Some(v) => v.as_i64().unwrap_or_else(|| {
            // whole-number floats show up in some responses, e.g. 100.0
            v.as_f64()
                .filter(|f| f.is_finite() && f.trunc() == *f)
                .map_or(0, |f| f as i64)
        }),
        None => 0,
    }
}

fn metadata_or_empty(value: Option<&Value>) -> BTreeMap<String, String> {
    let Some(object) = value.and_then(Value::as_object) else {
        return BTreeMap::new();
    };

    let mut metadata = BTreeMap::new();
    for (key, value) in object {
        match value.as_str() {
            Some(s) => {
                metadata.insert(key.clone(), s.to_owned());
            }
            // a single non-string value invalidates the whole map
            None => return BTreeMap::new(),
        }
    }
    metadata
}
