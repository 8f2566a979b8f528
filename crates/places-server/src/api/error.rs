//! API error types and response handling.
//!
//! Handlers return [`ApiResult`]; every [`ApiError`] becomes a JSON
//! [`ErrorResponse`] with the matching status code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use places_core::{PlacesError, QueryResponseCode};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type.
#[derive(Debug, Clone)]
pub enum ApiError {
    /// 400 Bad Request - the request is malformed.
    BadRequest {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },

    /// 403 Forbidden - processing is disabled by the privacy status.
    Forbidden {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },

    /// 404 Not Found - the requested data does not exist.
    NotFound {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },

    /// 424 Failed Dependency - Places is not configured.
    FailedDependency {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
        /// Optional additional details.
        details: Option<serde_json::Value>,
    },

    /// 500 Internal Server Error - unexpected server-side error.
    InternalError {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },

    /// 503 Service Unavailable - the query service failed.
    ServiceUnavailable {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
        /// Optional additional details.
        details: Option<serde_json::Value>,
    },
}

/// Standard JSON error response body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "unknown_region",
    "message": "Region 'abc' is not among the nearby points of interest; request nearby places first.",
    "details": null
}))]
pub struct ErrorResponse {
    /// Machine-readable error code.
    #[schema(example = "unknown_region")]
    pub error: String,

    /// Human-readable error message.
    pub message: String,

    /// Optional additional details.
    #[schema(nullable)]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Map a non-OK lookup status to an error response.
    ///
    /// The numeric status is kept in `details.status`.
    #[must_use]
    pub fn from_query_status(status: QueryResponseCode) -> Self {
        let details = Some(serde_json::json!({ "status": status.code() }));
        match status {
            QueryResponseCode::PrivacyOptedOut => PlacesError::PrivacyOptedOut.into(),
            QueryResponseCode::ConfigurationError => Self::FailedDependency {
                error_code: "places_not_configured".to_owned(),
                message: PlacesError::PlacesNotConfigured.to_string(),
                details,
            },
            QueryResponseCode::InvalidLatLongError => Self::BadRequest {
                error_code: "invalid_coordinate".to_owned(),
                message: "Latitude must be within [-90, 90] and longitude within [-180, 180]"
                    .to_owned(),
            },
            other => Self::ServiceUnavailable {
                error_code: "query_failed".to_owned(),
                message: format!("Nearby places lookup failed: {other}"),
                details,
            },
        }
    }

    const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::FailedDependency { .. } => StatusCode::FAILED_DEPENDENCY,
            Self::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            Self::BadRequest {
                error_code,
                message,
            }
            | Self::Forbidden {
                error_code,
                message,
            }
            | Self::NotFound {
                error_code,
                message,
            } => ErrorResponse {
                error: error_code,
                message,
                details: None,
            },

            Self::InternalError {
                error_code,
                message,
            } => {
                tracing::error!(error_code = %error_code, message = %message, "Internal server error");
                ErrorResponse {
                    error: error_code,
                    message,
                    details: None,
                }
            }

            Self::FailedDependency {
                error_code,
                message,
                details,
            }
            | Self::ServiceUnavailable {
                error_code,
                message,
                details,
            } => ErrorResponse {
                error: error_code,
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRequest { message, .. } => write!(f, "Bad Request: {message}"),
            Self::Forbidden { message, .. } => write!(f, "Forbidden: {message}"),
            Self::NotFound { message, .. } => write!(f, "Not Found: {message}"),
            Self::FailedDependency { message, .. } => write!(f, "Failed Dependency: {message}"),
            Self::InternalError { message, .. } => write!(f, "Internal Error: {message}"),
            Self::ServiceUnavailable { message, .. } => {
                write!(f, "Service Unavailable: {message}")
            }
        }
    }
}

impl std::error::Error for ApiError {}

/// Convert from places_core errors.
impl From<PlacesError> for ApiError {
    fn from(err: PlacesError) -> Self {
        let error_code = err.error_code().to_ascii_lowercase();
        let message = err.to_string();

        match err.http_status_code() {
            400 | 422 => Self::BadRequest {
                error_code,
                message,
            },
            403 => Self::Forbidden {
                error_code,
                message,
            },
            404 => Self::NotFound {
                error_code,
                message,
            },
            424 => Self::FailedDependency {
                error_code,
                message,
                details: None,
            },
            _ => Self::InternalError {
                error_code,
                message,
            },
        }
    }
}
