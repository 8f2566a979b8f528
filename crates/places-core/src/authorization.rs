//! Location authorization, accuracy and privacy values.
//!
//! These are advisory: they are stored and published with the membership
//! snapshot but never affect membership correctness. Privacy opt-out is the
//! exception, which stops request processing in [`crate::service`].

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use utoipa::ToSchema;

/// Location permission reported by the host platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, ToSchema)]
#[schema(rename_all = "lowercase")]
pub enum AuthorizationStatus {
    /// The user has not yet been asked. Serialized as `"unknown"`.
    #[default]
    #[schema(rename = "unknown")]
    NotDetermined,
    /// Location use is restricted by policy.
    Restricted,
    /// The user denied location access.
    Denied,
    /// Always-on access.
    Always,
    /// Access only while the app is in use.
    WhenInUse,
}

impl AuthorizationStatus {
    /// String form used in shared state and persistence.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotDetermined => "unknown",
            Self::Restricted => "restricted",
            Self::Denied => "denied",
            Self::Always => "always",
            Self::WhenInUse => "wheninuse",
        }
    }

    /// Parse the string form. Anything unrecognized maps to
    /// [`NotDetermined`](Self::NotDetermined).
    #[must_use]
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "restricted" => Self::Restricted,
            "denied" => Self::Denied,
            "always" => Self::Always,
            "wheninuse" => Self::WhenInUse,
            _ => Self::NotDetermined,
        }
    }
}

impl fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for AuthorizationStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AuthorizationStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from_str_lossy(&s))
    }
}

/// Location accuracy granted by the host platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AccuracyAuthorization {
    /// Full-precision location.
    Full,
    /// Approximate location.
    Reduced,
}

impl AccuracyAuthorization {
    /// String form used in shared state and persistence.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Reduced => "reduced",
        }
    }

    /// Parse the string form; `None` if unrecognized.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "full" => Some(Self::Full),
            "reduced" => Some(Self::Reduced),
            _ => None,
        }
    }
}

/// Global privacy setting of the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyStatus {
    /// Data collection allowed.
    OptedIn,
    /// Data collection forbidden; requests are ignored.
    OptedOut,
    /// Not yet known.
    #[default]
    Unknown,
}

impl PrivacyStatus {
    /// Whether processing must stop.
    #[must_use]
    pub const fn is_opted_out(self) -> bool {
        matches!(self, Self::OptedOut)
    }
}
