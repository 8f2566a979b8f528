//! Nearby-POI lookup against the Places edge query service.
//!
//! The lookup never fails with an error value: every outcome is folded into a
//! [`QueryResult`] carrying a [`QueryResponseCode`], since the code is what gets
//! reported back to the requester.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::config::PlacesConfig;
use crate::poi::PointOfInterest;

/// Default number of POIs requested when the caller does not say.
pub const DEFAULT_NEARBY_POI_COUNT: usize = 10;

/// Request timeout for the query service.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Path segment of the query endpoint.
pub const PLACES_EDGE_QUERY: &str = "placesedgequery";

mod json_keys {
    pub const LIBRARY: &str = "library";
    pub const LATITUDE: &str = "latitude";
    pub const LONGITUDE: &str = "longitude";
    pub const LIMIT: &str = "limit";
    pub const PLACES: &str = "places";
    pub const POIS: &str = "pois";
    pub const USER_WITHIN: &str = "userWithin";
}

/// Outcome of a nearby-POI lookup. Serialized as its integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum QueryResponseCode {
    /// Lookup succeeded.
    Ok = 0,
    /// The service could not be reached.
    ConnectivityError = 1,
    /// The service answered with an error or an unreadable body.
    ServerResponseError = 2,
    /// The supplied coordinate is unusable.
    InvalidLatLongError = 3,
    /// Places is not configured, or the configuration is invalid.
    ConfigurationError = 4,
    /// The service is unavailable.
    QueryServiceUnavailable = 5,
    /// Anything else.
    UnknownError = 6,
    /// Processing is disabled by the privacy status.
    PrivacyOptedOut = 7,
}

impl QueryResponseCode {
    /// Map an integer code; unrecognized values become
    /// [`UnknownError`](Self::UnknownError).
    #[must_use]
    pub const fn from_code(code: i64) -> Self {
        match code {
            0 => Self::Ok,
            1 => Self::ConnectivityError,
            2 => Self::ServerResponseError,
            3 => Self::InvalidLatLongError,
            4 => Self::ConfigurationError,
            5 => Self::QueryServiceUnavailable,
            7 => Self::PrivacyOptedOut,
            _ => Self::UnknownError,
        }
    }

    /// Integer code.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Whether this is [`Ok`](Self::Ok).
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl fmt::Display for QueryResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ok => "ok",
            Self::ConnectivityError => "connectivity error",
            Self::ServerResponseError => "server response error",
            Self::InvalidLatLongError => "invalid latitude/longitude",
            Self::ConfigurationError => "configuration error",
            Self::QueryServiceUnavailable => "query service unavailable",
            Self::UnknownError => "unknown error",
            Self::PrivacyOptedOut => "privacy opted out",
        };
        write!(f, "{name} ({})", self.code())
    }
}

impl Serialize for QueryResponseCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for QueryResponseCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = i64::deserialize(deserializer)?;
        Ok(Self::from_code(code))
    }
}

/// POIs and status returned by a lookup.
///
/// `pois` is only meaningful when `response` is [`QueryResponseCode::Ok`].
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    /// Nearby POIs, those the device is within first.
    pub pois: Vec<PointOfInterest>,
    /// Outcome code.
    pub response: QueryResponseCode,
}

impl QueryResult {
    /// A successful result.
    #[must_use]
    pub const fn ok(pois: Vec<PointOfInterest>) -> Self {
        Self {
            pois,
            response: QueryResponseCode::Ok,
        }
    }

    /// A result with no POIs and the given code.
    #[must_use]
    pub const fn failed(response: QueryResponseCode) -> Self {
        Self {
            pois: Vec::new(),
            response,
        }
    }
}

/// Failures inside [`HttpQueryService`].
#[derive(Debug, Error)]
pub enum QueryError {
    /// No libraries or no endpoint configured.
    #[error("Places configuration is invalid")]
    InvalidConfiguration,

    /// The endpoint did not form a valid URL.
    #[error("Invalid query URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The HTTP client could not be built.
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    /// The request did not complete.
    #[error("Query service unreachable: {0}")]
    Connectivity(#[source] reqwest::Error),

    /// The service answered with a non-200 status.
    #[error("Query service responded with status {0}")]
    ServerStatus(u16),

    /// The body was not a JSON object.
    #[error("Unreadable query service response: {0}")]
    MalformedResponse(String),
}

impl QueryError {
    /// Code reported to the requester for this failure.
    #[inline]
    #[must_use]
    pub const fn response_code(&self) -> QueryResponseCode {
        match self {
            Self::InvalidConfiguration | Self::InvalidUrl(_) => {
                QueryResponseCode::ConfigurationError
            }
            Self::ClientBuild(_) => QueryResponseCode::UnknownError,
            Self::Connectivity(_) => QueryResponseCode::ConnectivityError,
            Self::ServerStatus(_) | Self::MalformedResponse(_) => {
                QueryResponseCode::ServerResponseError
            }
        }
    }
}

/// Source of nearby POIs.
#[async_trait]
pub trait PlacesQueryService: Send + Sync {
    /// Look up at most `limit` POIs near the coordinate.
    async fn get_nearby_places(
        &self,
        latitude: f64,
        longitude: f64,
        limit: usize,
        config: &PlacesConfig,
    ) -> QueryResult;
}

/// [`PlacesQueryService`] backed by the HTTPS edge query endpoint.
#[derive(Debug, Clone)]
pub struct HttpQueryService {
    client: reqwest::Client,
}

impl HttpQueryService {
    /// Create a service with the default request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::ClientBuild`] if the TLS backend cannot start.
    pub fn new() -> Result<Self, QueryError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(QueryError::ClientBuild)?;
        Ok(Self { client })
    }

    /// Wrap an existing client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn fetch(
        &self,
        latitude: f64,
        longitude: f64,
        limit: usize,
        config: &PlacesConfig,
    ) -> Result<Vec<PointOfInterest>, QueryError> {
        if !config.is_valid() {
            return Err(QueryError::InvalidConfiguration);
        }

        let url = build_url(config, latitude, longitude, limit)?;
        tracing::trace!(%url, "Making a request to Places query service");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(QueryError::Connectivity)?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(QueryError::ServerStatus(status.as_u16()));
        }

        let body = response.bytes().await.map_err(QueryError::Connectivity)?;
        parse_query_response(&body)
    }
}

#[async_trait]
impl PlacesQueryService for HttpQueryService {
    async fn get_nearby_places(
        &self,
        latitude: f64,
        longitude: f64,
        limit: usize,
        config: &PlacesConfig,
    ) -> QueryResult {
        match self.fetch(latitude, longitude, limit, config).await {
            Ok(pois) => {
                tracing::debug!(count = pois.len(), "Query service returned nearby POIs");
                QueryResult::ok(pois)
            }
            Err(err) => {
                tracing::warn!(error = %err, "Nearby POI lookup failed");
                QueryResult::failed(err.response_code())
            }
        }
    }
}

/// Build the lookup URL:
/// `https://{endpoint}/placesedgequery/?library=..&latitude=..&longitude=..&limit=..`
///
/// # Errors
///
/// Returns [`QueryError::InvalidUrl`] if the endpoint is not a valid host.
pub fn build_url(
    config: &PlacesConfig,
    latitude: f64,
    longitude: f64,
    limit: usize,
) -> Result<Url, QueryError> {
    let mut url = Url::parse(&format!("https://{}/{PLACES_EDGE_QUERY}/", config.endpoint))?;
    {
        let mut query = url.query_pairs_mut();
        for id in config.library_ids() {
            query.append_pair(json_keys::LIBRARY, id);
        }
        query
            .append_pair(json_keys::LATITUDE, &latitude.to_string())
            .append_pair(json_keys::LONGITUDE, &longitude.to_string())
            .append_pair(json_keys::LIMIT, &limit.to_string());
    }
    Ok(url)
}

/// Parse a query-service response body.
///
/// POIs under `places.userWithin` come first and are marked as containing the
/// device, followed by `places.pois`. Elements that fail to parse are skipped.
/// An empty body or a body without `places` yields no POIs.
///
/// # Errors
///
/// Returns [`QueryError::MalformedResponse`] if the body is not a JSON object.
pub fn parse_query_response(body: &[u8]) -> Result<Vec<PointOfInterest>, QueryError> {
    if body.is_empty() {
        tracing::debug!("No nearby POIs");
        return Ok(Vec::new());
    }

    let json: Value = serde_json::from_slice(body)
        .map_err(|e| QueryError::MalformedResponse(e.to_string()))?;
    if !json.is_object() {
        return Err(QueryError::MalformedResponse(
            "response is not a JSON object".into(),
        ));
    }

    let Some(places) = json.get(json_keys::PLACES).filter(|v| v.is_object()) else {
        tracing::debug!("No nearby POIs");
        return Ok(Vec::new());
    };

    let within = elements(places, json_keys::USER_WITHIN)
        .iter()
        .filter_map(|element| PointOfInterest::from_query_object(element, true).ok());
    let nearby = elements(places, json_keys::POIS)
        .iter()
        .filter_map(|element| PointOfInterest::from_query_object(element, false).ok());

    Ok(within.chain(nearby).collect())
}

fn elements<'a>(places: &'a Value, key: &str) -> &'a [Value] {
    places
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlacesLibrary;
    use serde_json::json;

    fn config(endpoint: &str) -> PlacesConfig {
        PlacesConfig {
            libraries: vec![PlacesLibrary::new("lib1", "One"), PlacesLibrary::new("lib2", "Two")],
            endpoint: endpoint.into(),
            ..PlacesConfig::default()
        }
    }

    fn element(id: &str) -> Value {
        json!({
            "p": [id, format!("{id} name"), 40.4, -80.0, 150, "lib1", 2],
            "x": {"city": "Pittsburgh"}
        })
    }

    #[test]
    fn test_response_code_mapping() {
        assert_eq!(QueryResponseCode::from_code(0), QueryResponseCode::Ok);
        assert_eq!(
            QueryResponseCode::from_code(4),
            QueryResponseCode::ConfigurationError
        );
        assert_eq!(
            QueryResponseCode::from_code(7),
            QueryResponseCode::PrivacyOptedOut
        );
        assert_eq!(QueryResponseCode::from_code(42), QueryResponseCode::UnknownError);
        assert_eq!(QueryResponseCode::from_code(-1), QueryResponseCode::UnknownError);
        assert_eq!(serde_json::to_value(QueryResponseCode::ServerResponseError).unwrap(), 2);
    }

    #[test]
    fn test_build_url() {
        let url = build_url(&config("places.example.com"), 40.5, -80.25, 10).unwrap();
        assert_eq!(
            url.as_str(),
            "https://places.example.com/placesedgequery/?library=lib1&library=lib2&latitude=40.5&longitude=-80.25&limit=10"
        );
    }

    #[test]
    fn test_build_url_rejects_bad_endpoint() {
        let err = build_url(&config("bad host name"), 0.0, 0.0, 1).unwrap_err();
        assert_eq!(err.response_code(), QueryResponseCode::ConfigurationError);
    }

    #[test]
    fn test_parse_within_first() {
        let body = json!({
            "places": {
                "pois": [element("near")],
                "userWithin": [element("inside")]
            }
        });
        let pois = parse_query_response(body.to_string().as_bytes()).unwrap();
        let ids: Vec<_> = pois.iter().map(PointOfInterest::identifier).collect();
        assert_eq!(ids, vec!["inside", "near"]);
        assert!(pois[0].user_is_within());
        assert!(!pois[1].user_is_within());
        assert_eq!(pois[0].metadata()["city"], "Pittsburgh");
    }

    #[test]
    fn test_parse_skips_malformed_elements() {
        let body = json!({
            "places": {
                "pois": [element("good"), {"p": ["short"]}, {"nothing": true}]
            }
        });
        let pois = parse_query_response(body.to_string().as_bytes()).unwrap();
        assert_eq!(pois.len(), 1);
        assert_eq!(pois[0].identifier(), "good");
    }

    #[test]
    fn test_parse_empty_and_missing_places() {
        assert!(parse_query_response(b"").unwrap().is_empty());
        assert!(parse_query_response(b"{}").unwrap().is_empty());
        assert!(parse_query_response(br#"{"places": {}}"#).unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_non_object() {
        for body in [&b"not json"[..], b"[1, 2]"] {
            let err = parse_query_response(body).unwrap_err();
            assert_eq!(err.response_code(), QueryResponseCode::ServerResponseError);
        }
    }

    #[tokio::test]
    async fn test_invalid_config_skips_request() {
        let service = HttpQueryService::new().unwrap();
        let result = service
            .get_nearby_places(40.0, -80.0, 10, &PlacesConfig::default())
            .await;
        assert_eq!(result, QueryResult::failed(QueryResponseCode::ConfigurationError));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_connectivity_error() {
        let service = HttpQueryService::new().unwrap();
        let result = service
            .get_nearby_places(40.0, -80.0, 10, &config("127.0.0.1:1"))
            .await;
        assert_eq!(result.response, QueryResponseCode::ConnectivityError);
        assert!(result.pois.is_empty());
    }
}
