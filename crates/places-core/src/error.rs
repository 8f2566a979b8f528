//! Unified error type for the places core library.
//!
//! [`PlacesError`] covers every failure the [`crate::service::PlacesService`]
//! can report. The individual modules keep their own error types
//! ([`PoiError`](crate::poi::PoiError), [`StorageError`](crate::storage::StorageError),
//! [`ConfigError`](crate::config::ConfigError)) and convert into this one at
//! the service boundary.
//!
//! # Example
//!
//! ```rust
//! use places_core::error::{PlacesError, Result};
//!
//! fn require_region(known: bool, id: &str) -> Result<()> {
//!     if !known {
//!         return Err(PlacesError::UnknownRegion(id.to_owned()));
//!     }
//!     Ok(())
//! }
//!
//! assert_eq!(require_region(false, "abc").unwrap_err().http_status_code(), 404);
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// The unified error type for all places operations.
#[derive(Debug, Error)]
pub enum PlacesError {
    // =========================================================================
    // REQUEST ERRORS
    // =========================================================================
    /// The coordinate is not a finite latitude/longitude pair.
    #[error("Invalid coordinate ({latitude}, {longitude}). Latitude must be within [-90, 90] and longitude within [-180, 180].")]
    InvalidCoordinate {
        /// Supplied latitude.
        latitude: f64,
        /// Supplied longitude.
        longitude: f64,
    },

    /// The region event type was neither `entry` nor `exit`.
    #[error("Invalid region event type: '{0}'. Expected 'entry' or 'exit'.")]
    InvalidRegionEventType(String),

    /// A point of interest could not be parsed.
    #[error("Invalid point of interest: {0}")]
    InvalidPoi(String),

    // =========================================================================
    // MEMBERSHIP ERRORS
    // =========================================================================
    /// A region event named a POI that is not among the nearby POIs.
    #[error("Region '{0}' is not among the nearby points of interest; request nearby places first.")]
    UnknownRegion(String),

    /// The device has no current POI.
    #[error("The device is not within any point of interest")]
    NoCurrentPoi,

    /// No location has been recorded yet.
    #[error("No location has been recorded yet")]
    NoKnownLocation,

    // =========================================================================
    // PRIVACY ERRORS
    // =========================================================================
    /// Processing is disabled because the device opted out.
    #[error("Places processing is disabled: privacy status is opted-out")]
    PrivacyOptedOut,

    // =========================================================================
    // CONFIGURATION ERRORS
    // =========================================================================
    /// Places has no libraries or no endpoint configured.
    #[error("Places is not configured. Set at least one library and an endpoint.")]
    PlacesNotConfigured,

    /// The configuration file was not found at the expected path.
    #[error("Configuration file not found at: {}", .0.display())]
    ConfigNotFound(PathBuf),

    /// The configuration could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    ConfigParseError(String),

    /// The configuration contains invalid values.
    #[error("Configuration validation failed: {0}")]
    ConfigValidationError(String),

    // =========================================================================
    // PERSISTENCE & I/O ERRORS
    // =========================================================================
    /// Persisted state could not be read or written.
    #[error("Persistence error: {0}")]
    PersistenceError(String),

    /// A low-level I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A specialized [`Result`] type for places operations.
pub type Result<T> = std::result::Result<T, PlacesError>;

impl PlacesError {
    /// Returns `true` if the request itself was malformed.
    #[inline]
    #[must_use]
    pub const fn is_request_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidCoordinate { .. } | Self::InvalidRegionEventType(_) | Self::InvalidPoi(_)
        )
    }

    /// Returns `true` if this error is related to configuration.
    #[inline]
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::PlacesNotConfigured
                | Self::ConfigNotFound(_)
                | Self::ConfigParseError(_)
                | Self::ConfigValidationError(_)
        )
    }

    /// Returns `true` if this error is related to I/O or persistence.
    #[inline]
    #[must_use]
    pub const fn is_storage_error(&self) -> bool {
        matches!(self, Self::PersistenceError(_) | Self::IoError(_))
    }

    /// Returns `true` if this error describes a normal state rather than a failure.
    #[inline]
    #[must_use]
    pub const fn is_expected_state(&self) -> bool {
        matches!(
            self,
            Self::NoCurrentPoi | Self::NoKnownLocation | Self::PrivacyOptedOut
        )
    }

    /// Returns an HTTP-appropriate status code for this error.
    #[inline]
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - malformed input
            Self::InvalidCoordinate { .. }
            | Self::InvalidRegionEventType(_)
            | Self::InvalidPoi(_) => 400,

            // 403 Forbidden - understood but refused
            Self::PrivacyOptedOut => 403,

            // 404 Not Found
            Self::UnknownRegion(_)
            | Self::NoCurrentPoi
            | Self::NoKnownLocation
            | Self::ConfigNotFound(_) => 404,

            // 422 Unprocessable Entity - semantic errors
            Self::ConfigParseError(_) | Self::ConfigValidationError(_) => 422,

            // 424 Failed Dependency - lookups impossible until configured
            Self::PlacesNotConfigured => 424,

            // 500 Internal Server Error - server-side issues
            Self::PersistenceError(_) | Self::IoError(_) => 500,
        }
    }

    /// Returns a machine-readable error code for API responses.
    #[inline]
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidCoordinate { .. } => "INVALID_COORDINATE",
            Self::InvalidRegionEventType(_) => "INVALID_REGION_EVENT_TYPE",
            Self::InvalidPoi(_) => "INVALID_POI",
            Self::UnknownRegion(_) => "UNKNOWN_REGION",
            Self::NoCurrentPoi => "NO_CURRENT_POI",
            Self::NoKnownLocation => "NO_KNOWN_LOCATION",
            Self::PrivacyOptedOut => "PRIVACY_OPTED_OUT",
            Self::PlacesNotConfigured => "PLACES_NOT_CONFIGURED",
            Self::ConfigNotFound(_) => "CONFIG_NOT_FOUND",
            Self::ConfigParseError(_) => "CONFIG_PARSE_ERROR",
            Self::ConfigValidationError(_) => "CONFIG_VALIDATION_ERROR",
            Self::PersistenceError(_) => "PERSISTENCE_ERROR",
            Self::IoError(_) => "IO_ERROR",
        }
    }
}

// =============================================================================
// CONVERSIONS FROM MODULE-SPECIFIC ERRORS
// =============================================================================

impl From<crate::poi::PoiError> for PlacesError {
    fn from(err: crate::poi::PoiError) -> Self {
        Self::InvalidPoi(err.to_string())
    }
}

impl From<crate::storage::StorageError> for PlacesError {
    fn from(err: crate::storage::StorageError) -> Self {
        use crate::storage::StorageError;
        match err {
            StorageError::ParseError { path, source } => {
                Self::PersistenceError(format!("Corrupt store {}: {source}", path.display()))
            }
            other => Self::PersistenceError(other.to_string()),
        }
    }
}

impl From<crate::config::ConfigError> for PlacesError {
    fn from(err: crate::config::ConfigError) -> Self {
        use crate::config::ConfigError;
        match err {
            ConfigError::NotFound(path) => Self::ConfigNotFound(path),
            ConfigError::LoadError(e) => Self::ConfigParseError(e.to_string()),
            ConfigError::SerializeError(e) => Self::ConfigParseError(e.to_string()),
            ConfigError::WriteError { path, source } => {
                Self::PersistenceError(format!("Failed to write {}: {source}", path.display()))
            }
            ConfigError::ValidationError { field, message } => {
                Self::ConfigValidationError(format!("{field}: {message}"))
            }
            ConfigError::MultipleValidationErrors(errors) => {
                let messages: Vec<String> = errors.into_iter().map(|e| e.to_string()).collect();
                Self::ConfigValidationError(messages.join("; "))
            }
            ConfigError::NoConfigDir => Self::ConfigNotFound(PathBuf::new()),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
