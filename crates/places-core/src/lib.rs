//! # places-core
//!
//! Core logic for tracking which geofenced points of interest (POIs) a device
//! is inside.
//!
//! This crate provides:
//! - POI parsing from stored JSON and from query-service responses
//! - Membership tracking: nearby POIs, user-within POIs, the current POI, and
//!   the last entered/exited POIs, with a time-to-live on membership data
//! - Persistence of the membership snapshot to a JSON key/value store
//! - Nearby-POI lookups against the Places edge query service
//!
//! ## Architecture
//!
//! - [`poi`] - Point-of-interest model and its JSON forms
//! - [`priority`] - Which of two overlapping POIs is the current one
//! - [`region`] - Geofence entry/exit event types
//! - [`authorization`] - Location authorization, accuracy and privacy values
//! - [`clock`] - Injectable time source
//! - [`membership`] - The membership state machine
//! - [`snapshot`] - Published shared-state projection
//! - [`storage`] - Key/value persistence
//! - [`config`] - Places settings and application configuration
//! - [`query`] - Query-service client
//! - [`notify`] - Outbound notifications
//! - [`service`] - Request handling on top of all of the above
//! - [`error`] - Unified error types for the crate

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(missing_docs)]

pub mod authorization;
pub mod clock;
pub mod config;
pub mod error;
pub mod membership;
pub mod notify;
pub mod poi;
pub mod priority;
pub mod query;
pub mod region;
pub mod service;
pub mod snapshot;
pub mod storage;

// Re-export primary types for convenience
pub use authorization::{AccuracyAuthorization, AuthorizationStatus, PrivacyStatus};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{AppConfig, ConfigError, PlacesConfig, PlacesLibrary, ServerConfig};
pub use error::{PlacesError, Result};
pub use membership::{MembershipSnapshot, MembershipState, DEFAULT_MEMBERSHIP_TTL_SECS};
pub use notify::{ChannelSink, NoopSink, PlacesEventSink, PlacesNotification};
pub use poi::{PoiError, PointOfInterest, INVALID_LAT_LON};
pub use query::{
    HttpQueryService, PlacesQueryService, QueryError, QueryResponseCode, QueryResult,
    DEFAULT_NEARBY_POI_COUNT,
};
pub use region::RegionEventType;
pub use service::{is_valid_coordinate, PlacesService, PlacesServiceOptions};
pub use snapshot::SharedStateProjection;
pub use storage::{
    default_data_dir, JsonFileStore, KeyValueStore, MemoryStore, PlacesDataStore, StorageError,
};
