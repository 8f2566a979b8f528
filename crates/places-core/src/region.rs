//! Geofence region transitions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The direction of a geofence transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RegionEventType {
    /// The device entered the region.
    Entry,
    /// The device exited the region.
    Exit,
}

impl RegionEventType {
    /// String form used in event data.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::Exit => "exit",
        }
    }
}

impl fmt::Display for RegionEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegionEventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "entry" => Ok(Self::Entry),
            "exit" => Ok(Self::Exit),
            other => Err(format!("unknown region event type '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_values() {
        assert_eq!(RegionEventType::Entry.as_str(), "entry");
        assert_eq!(RegionEventType::Exit.to_string(), "exit");
    }

    #[test]
    fn test_parse() {
        assert_eq!("entry".parse(), Ok(RegionEventType::Entry));
        assert_eq!("exit".parse(), Ok(RegionEventType::Exit));
        assert!("Entry".parse::<RegionEventType>().is_err());
        assert!("".parse::<RegionEventType>().is_err());
    }

    #[test]
    fn test_serde() {
        let json = serde_json::to_string(&RegionEventType::Exit).unwrap();
        assert_eq!(json, "\"exit\"");
        let parsed: RegionEventType = serde_json::from_str("\"entry\"").unwrap();
        assert_eq!(parsed, RegionEventType::Entry);
    }
}
