//! Configuration management.
//!
//! Two layers of configuration live here:
//! - [`PlacesConfig`]: the Places settings themselves (libraries, query endpoint,
//!   membership TTL). Hosts either load them from the app config file or hand
//!   over a shared-state style JSON object ([`PlacesConfig::from_shared_state`]).
//! - [`AppConfig`]: everything the server binary needs, loaded from an optional
//!   TOML file plus `PLACES__*` environment variables.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use utoipa::ToSchema;

use crate::authorization::PrivacyStatus;
use crate::membership::DEFAULT_MEMBERSHIP_TTL_SECS;

/// Name of the config file inside the config directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Prefix for environment overrides, e.g. `PLACES__SERVER__PORT=9000`.
pub const ENV_PREFIX: &str = "PLACES";

/// Shared-state keys read by [`PlacesConfig::from_shared_state`].
pub mod keys {
    /// Array of `{id, name}` library objects.
    pub const LIBRARIES: &str = "places.libraries";
    /// Query service host.
    pub const ENDPOINT: &str = "places.endpoint";
    /// Membership TTL in seconds.
    pub const MEMBERSHIP_TTL: &str = "places.membershipttl";
    /// Library identifier inside a library object.
    pub const LIBRARY_ID: &str = "id";
    /// Library display name inside a library object.
    pub const LIBRARY_NAME: &str = "name";
}

// =============================================================================
// ERRORS
// =============================================================================

/// Errors raised while loading, saving or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The layered configuration could not be built or deserialized.
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    /// The config file could not be written.
    #[error("Failed to write {}: {source}", path.display())]
    WriteError {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration could not be serialized to TOML.
    #[error("Failed to serialize configuration: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// A single field holds an invalid value.
    #[error("Invalid value for '{field}': {message}")]
    ValidationError {
        /// Dotted field path.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// Several fields are invalid.
    #[error("Configuration has {} validation errors", .0.len())]
    MultipleValidationErrors(Vec<ConfigError>),

    /// No platform config directory could be determined.
    #[error("Cannot determine config directory")]
    NoConfigDir,
}

impl ConfigError {
    fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }
}

// =============================================================================
// PLACES CONFIGURATION
// =============================================================================

/// A POI library the query service should search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PlacesLibrary {
    /// Library identifier sent to the query service.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
}

impl PlacesLibrary {
    /// Create a library entry.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Places settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct PlacesConfig {
    /// Host name of the query service, without scheme.
    pub endpoint: String,
    /// Seconds of validity granted on each membership update.
    #[serde(alias = "membershipttl")]
    pub membership_ttl: u64,
    /// Libraries to query, in order.
    pub libraries: Vec<PlacesLibrary>,
}

impl Default for PlacesConfig {
    fn default() -> Self {
        Self {
            libraries: Vec::new(),
            endpoint: String::new(),
            membership_ttl: DEFAULT_MEMBERSHIP_TTL_SECS,
        }
    }
}

impl PlacesConfig {
    /// Whether lookups can be made: at least one library and an endpoint.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.libraries.is_empty() && !self.endpoint.is_empty()
    }

    /// Read Places settings from a flat shared-state object.
    ///
    /// Returns `None` when `places.libraries` is missing or not an array.
    /// Library objects without a string `id` are skipped.
    #[must_use]
    pub fn from_shared_state(data: &Value) -> Option<Self> {
        let Some(entries) = data.get(keys::LIBRARIES).and_then(Value::as_array) else {
            tracing::debug!("No Places libraries found in configuration");
            return None;
        };

        let libraries = entries
            .iter()
            .filter_map(|entry| {
                let Some(id) = entry.get(keys::LIBRARY_ID).and_then(Value::as_str) else {
                    tracing::debug!("Skipping Places library without an 'id'");
                    return None;
                };
                let name = entry
                    .get(keys::LIBRARY_NAME)
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                Some(PlacesLibrary::new(id, name))
            })
            .collect();

        let endpoint = data
            .get(keys::ENDPOINT)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();

        let membership_ttl = data
            .get(keys::MEMBERSHIP_TTL)
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_MEMBERSHIP_TTL_SECS);

        Some(Self {
            libraries,
            endpoint,
            membership_ttl,
        })
    }

    /// Library identifiers in configured order.
    pub fn library_ids(&self) -> impl Iterator<Item = &str> {
        self.libraries.iter().map(|library| library.id.as_str())
    }
}

// =============================================================================
// APPLICATION CONFIGURATION
// =============================================================================

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Production mode: JSON file logging.
    pub production: bool,
    /// Directory for persisted Places data; platform default when unset.
    pub data_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: 8080,
            production: false,
            data_dir: None,
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Initial privacy status.
    pub privacy: PrivacyStatus,
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Places settings.
    pub places: PlacesConfig,
}

impl AppConfig {
    /// Load from the default config file (if present) and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed or validation fails.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;
        Self::load_layered(&path, false)
    }

    /// Load from `path`, which must exist, and the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if `path` does not exist, or any
    /// load or validation error.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        Self::load_layered(path, true)
    }

    fn load_layered(path: &Path, required: bool) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(required),
            )
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let app: Self = settings.try_deserialize()?;
        app.validate()?;

        tracing::debug!(
            path = %path.display(),
            libraries = app.places.libraries.len(),
            "Loaded configuration"
        );
        Ok(app)
    }

    /// Parse a TOML document without consulting the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is invalid or fails validation.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(content, config::FileFormat::Toml))
            .build()?;
        let app: Self = settings.try_deserialize()?;
        app.validate()?;
        Ok(app)
    }

    /// Write this configuration to `path` as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::WriteError {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::WriteError {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check field values.
    ///
    /// An empty Places configuration is allowed (lookups then report a
    /// configuration error), but a partially filled one must be usable.
    ///
    /// # Errors
    ///
    /// Returns every problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.server.host.trim().is_empty() {
            errors.push(ConfigError::validation("server.host", "must not be empty"));
        }

        if self.places.endpoint.contains("://") {
            errors.push(ConfigError::validation(
                "places.endpoint",
                "must be a host name without a scheme",
            ));
        }

        if self
            .places
            .libraries
            .iter()
            .any(|library| library.id.trim().is_empty())
        {
            errors.push(ConfigError::validation(
                "places.libraries",
                "library ids must not be empty",
            ));
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ConfigError::MultipleValidationErrors(errors)),
        }
    }

    /// Location of the default config file.
    ///
    /// On Linux: `/etc/places/config.toml`.
    /// Elsewhere: the platform config directory for `places`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoConfigDir`] if no platform directory exists.
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        #[cfg(target_os = "linux")]
        {
            Ok(PathBuf::from("/etc/places").join(CONFIG_FILE))
        }
        #[cfg(not(target_os = "linux"))]
        {
            directories::ProjectDirs::from("", "", "places")
                .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
                .ok_or(ConfigError::NoConfigDir)
        }
    }
}
