//! Persistent storage for Places state.
//!
//! Two layers:
//!
//! - [`KeyValueStore`] is a string-keyed store of JSON values. [`JsonFileStore`]
//!   keeps the whole collection in one JSON file; [`MemoryStore`] keeps it in
//!   memory.
//! - [`PlacesDataStore`] maps the membership snapshot onto a fixed set of keys.
//!   An absent value (or an empty POI mapping) removes its key, and reads fall
//!   back to the sentinel defaults.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

use crate::authorization::{AccuracyAuthorization, AuthorizationStatus};
use crate::membership::{MembershipSnapshot, MembershipState};
use crate::poi::{PointOfInterest, INVALID_LAT_LON};

/// Name of the JSON file used by [`JsonFileStore`] inside the data directory.
pub const DATA_STORE_FILE: &str = "PlacesDataStore.json";

/// Persistence keys.
pub mod keys {
    /// Location authorization status string.
    pub const AUTH_STATUS: &str = "places_auth_status";
    /// Location accuracy string.
    pub const ACCURACY: &str = "places_accuracy";
    /// Serialized current POI.
    pub const CURRENT_POI: &str = "places_current_poi";
    /// Serialized last entered POI.
    pub const LAST_ENTERED_POI: &str = "places_last_entered_poi";
    /// Serialized last exited POI.
    pub const LAST_EXITED_POI: &str = "places_last_exited_poi";
    /// Last known latitude.
    pub const LATITUDE: &str = "places_last_known_latitude";
    /// Last known longitude.
    pub const LONGITUDE: &str = "places_last_known_longitude";
    /// Membership expiry timestamp.
    pub const MEMBERSHIP_VALID_UNTIL: &str = "places_membership_valid_until";
    /// Identifier to serialized POI map of nearby POIs.
    pub const NEARBY_POIS: &str = "places_nearby_pois";
    /// Identifier to serialized POI map of user-within POIs.
    pub const USER_WITHIN_POIS: &str = "places_user_within_pois";
}

/// Errors raised by storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The store file could not be read.
    #[error("Failed to read {}: {source}", path.display())]
    ReadError {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The store file could not be written.
    #[error("Failed to write {}: {source}", path.display())]
    WriteError {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The store file did not contain a JSON object.
    #[error("Failed to parse {}: {source}", path.display())]
    ParseError {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// The data directory could not be created.
    #[error("Failed to create directory {}: {source}", path.display())]
    CreateDirError {
        /// Directory that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Store contents could not be serialized.
    #[error("Failed to serialize store: {0}")]
    SerializeError(#[from] serde_json::Error),

    /// No platform data directory could be determined.
    #[error("Cannot determine data directory")]
    NoDataDir,
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// A string-keyed store of JSON values.
pub trait KeyValueStore: Send {
    /// Read a value.
    fn get(&self, key: &str) -> Option<Value>;

    /// Write a value, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to persist the change.
    fn set(&mut self, key: &str, value: Value) -> StorageResult<()>;

    /// Delete a value. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to persist the change.
    fn remove(&mut self, key: &str) -> StorageResult<()>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Box<T> {
    fn get(&self, key: &str) -> Option<Value> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: Value) -> StorageResult<()> {
        (**self).set(key, value)
    }

    fn remove(&mut self, key: &str) -> StorageResult<()> {
        (**self).remove(key)
    }
}

/// In-memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<String, Value>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `key` is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> StorageResult<()> {
        self.values.insert(key.to_owned(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> StorageResult<()> {
        self.values.remove(key);
        Ok(())
    }
}

/// Store backed by a single pretty-printed JSON file.
///
/// The file is read once on open and rewritten after every change.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    values: BTreeMap<String, Value>,
}

impl JsonFileStore {
    /// Open (or lazily create) the store at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        let values = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|source| {
                StorageError::ReadError {
                    path: path.clone(),
                    source,
                }
            })?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content).map_err(|source| StorageError::ParseError {
                    path: path.clone(),
                    source,
                })?
            }
        } else {
            BTreeMap::new()
        };

        tracing::debug!(path = %path.display(), keys = values.len(), "Opened Places data store");
        Ok(Self { path, values })
    }

    /// Open the store file inside `data_dir`.
    ///
    /// # Errors
    ///
    /// See [`JsonFileStore::open`].
    pub fn in_dir(data_dir: &Path) -> StorageResult<Self> {
        Self::open(data_dir.join(DATA_STORE_FILE))
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StorageError::CreateDirError {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let content = serde_json::to_string_pretty(&self.values)?;
        std::fs::write(&self.path, content).map_err(|source| StorageError::WriteError {
            path: self.path.clone(),
            source,
        })
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> StorageResult<()> {
        self.values.insert(key.to_owned(), value);
        self.flush()
    }

    fn remove(&mut self, key: &str) -> StorageResult<()> {
        if self.values.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}

/// Get the default data directory.
///
/// On Linux: `/var/lib/places/`
/// Elsewhere: the platform data directory for `places`.
///
/// # Errors
///
/// Returns [`StorageError::NoDataDir`] if no platform directory is available.
pub fn default_data_dir() -> StorageResult<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        Ok(PathBuf::from("/var/lib/places"))
    }
    #[cfg(not(target_os = "linux"))]
    {
        directories::ProjectDirs::from("", "", "places")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .ok_or(StorageError::NoDataDir)
    }
}

/// Typed access to the persisted membership snapshot.
#[derive(Debug, Clone, Default)]
pub struct PlacesDataStore<S> {
    store: S,
}

impl<S: KeyValueStore> PlacesDataStore<S> {
    /// Wrap a key/value backend.
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Access the backend.
    pub const fn inner(&self) -> &S {
        &self.store
    }

    /// Read the persisted snapshot.
    ///
    /// Missing keys yield defaults. POIs that fail to parse are dropped. The TTL
    /// is not persisted and keeps its default.
    pub fn load_snapshot(&self) -> MembershipSnapshot {
        MembershipSnapshot {
            nearby_pois: self.poi_map(keys::NEARBY_POIS),
            user_within_pois: self.poi_map(keys::USER_WITHIN_POIS),
            current_poi: self.poi(keys::CURRENT_POI),
            last_entered_poi: self.poi(keys::LAST_ENTERED_POI),
            last_exited_poi: self.poi(keys::LAST_EXITED_POI),
            last_known_latitude: self.float(keys::LATITUDE).unwrap_or(INVALID_LAT_LON),
            last_known_longitude: self.float(keys::LONGITUDE).unwrap_or(INVALID_LAT_LON),
            membership_valid_until: self.float(keys::MEMBERSHIP_VALID_UNTIL).map(round_secs),
            authorization_status: AuthorizationStatus::from_str_lossy(
                &self.string(keys::AUTH_STATUS).unwrap_or_default(),
            ),
            accuracy: self
                .string(keys::ACCURACY)
                .and_then(|s| AccuracyAuthorization::parse(&s)),
            ..MembershipSnapshot::default()
        }
    }

    /// Write every field of `snapshot`.
    ///
    /// # Errors
    ///
    /// Returns the first backend error encountered.
    pub fn save_snapshot(&mut self, snapshot: &MembershipSnapshot) -> StorageResult<()> {
        self.set_poi_map(keys::NEARBY_POIS, &snapshot.nearby_pois)?;
        self.set_poi_map(keys::USER_WITHIN_POIS, &snapshot.user_within_pois)?;
        self.set_poi(keys::CURRENT_POI, snapshot.current_poi.as_ref())?;
        self.set_poi(keys::LAST_ENTERED_POI, snapshot.last_entered_poi.as_ref())?;
        self.set_poi(keys::LAST_EXITED_POI, snapshot.last_exited_poi.as_ref())?;
        self.store
            .set(keys::LATITUDE, Value::from(snapshot.last_known_latitude))?;
        self.store
            .set(keys::LONGITUDE, Value::from(snapshot.last_known_longitude))?;
        self.store.set(
            keys::AUTH_STATUS,
            Value::from(snapshot.authorization_status.as_str()),
        )?;
        match snapshot.accuracy {
            Some(accuracy) => self.store.set(keys::ACCURACY, Value::from(accuracy.as_str()))?,
            None => self.store.remove(keys::ACCURACY)?,
        }
        self.set_valid_until(snapshot.membership_valid_until)
    }

    /// Load the persisted snapshot into `state`.
    pub fn hydrate(&self, state: &mut MembershipState) {
        state.restore(self.load_snapshot());
    }

    /// Persist the full snapshot held by `state`.
    ///
    /// # Errors
    ///
    /// Returns the first backend error encountered.
    pub fn persist_all(&mut self, state: &MembershipState) -> StorageResult<()> {
        self.save_snapshot(state.snapshot())
    }

    /// Remove the keys reset by [`MembershipState::clear_membership`].
    ///
    /// # Errors
    ///
    /// Returns the first backend error encountered.
    pub fn persist_membership_cleared(&mut self) -> StorageResult<()> {
        self.store.remove(keys::CURRENT_POI)?;
        self.store.remove(keys::LAST_ENTERED_POI)?;
        self.store.remove(keys::LAST_EXITED_POI)?;
        self.store.remove(keys::MEMBERSHIP_VALID_UNTIL)
    }

    /// Remove every Places key.
    ///
    /// # Errors
    ///
    /// Returns the first backend error encountered.
    pub fn clear_all(&mut self) -> StorageResult<()> {
        for key in [
            keys::NEARBY_POIS,
            keys::USER_WITHIN_POIS,
            keys::CURRENT_POI,
            keys::LAST_ENTERED_POI,
            keys::LAST_EXITED_POI,
            keys::LATITUDE,
            keys::LONGITUDE,
            keys::AUTH_STATUS,
            keys::ACCURACY,
            keys::MEMBERSHIP_VALID_UNTIL,
        ] {
            self.store.remove(key)?;
        }
        Ok(())
    }

    fn poi(&self, key: &str) -> Option<PointOfInterest> {
        let json = self.string(key)?;
        PointOfInterest::from_json_str(&json).ok()
    }

    fn poi_map(&self, key: &str) -> BTreeMap<String, PointOfInterest> {
        let Some(Value::Object(entries)) = self.store.get(key) else {
            return BTreeMap::new();
        };

        entries
            .iter()
            .filter_map(|(id, json)| {
                let poi = PointOfInterest::from_json_str(json.as_str()?).ok()?;
                Some((id.clone(), poi))
            })
            .collect()
    }

    fn string(&self, key: &str) -> Option<String> {
        match self.store.get(key)? {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    fn float(&self, key: &str) -> Option<f64> {
        self.store.get(key)?.as_f64()
    }

    fn set_poi(&mut self, key: &str, poi: Option<&PointOfInterest>) -> StorageResult<()> {
        match poi {
            Some(poi) => self.store.set(key, Value::from(poi.to_json_string())),
            None => self.store.remove(key),
        }
    }

    fn set_poi_map(
        &mut self,
        key: &str,
        pois: &BTreeMap<String, PointOfInterest>,
    ) -> StorageResult<()> {
        if pois.is_empty() {
            return self.store.remove(key);
        }
        let map = pois
            .iter()
            .map(|(id, poi)| (id.clone(), Value::from(poi.to_json_string())))
            .collect();
        self.store.set(key, Value::Object(map))
    }

    #[allow(clippy::cast_precision_loss)]
    fn set_valid_until(&mut self, valid_until: Option<i64>) -> StorageResult<()> {
        match valid_until {
            Some(secs) => self
                .store
                .set(keys::MEMBERSHIP_VALID_UNTIL, Value::from(secs as f64)),
            None => self.store.remove(keys::MEMBERSHIP_VALID_UNTIL),
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn round_secs(value: f64) -> i64 {
    value.round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn poi(id: &str, within: bool) -> PointOfInterest {
        PointOfInterest::new(id, format!("{id} name"))
            .with_location(40.0, -80.0)
            .with_radius(100)
            .with_weight(3)
            .with_user_within(within)
    }

    fn populated_snapshot() -> MembershipSnapshot {
        let a = poi("a", true);
        let b = poi("b", false);
        MembershipSnapshot {
            nearby_pois: BTreeMap::from([("a".into(), a.clone()), ("b".into(), b.clone())]),
            user_within_pois: BTreeMap::from([("a".into(), a.clone())]),
            current_poi: Some(a.clone()),
            last_entered_poi: Some(a),
            last_exited_poi: Some(b),
            last_known_latitude: 40.5,
            last_known_longitude: -80.5,
            membership_valid_until: Some(1_700_003_600),
            authorization_status: AuthorizationStatus::WhenInUse,
            accuracy: Some(AccuracyAuthorization::Full),
            ..MembershipSnapshot::default()
        }
    }

    #[test]
    fn test_empty_store_yields_defaults() {
        let store = PlacesDataStore::new(MemoryStore::new());
        assert_eq!(store.load_snapshot(), MembershipSnapshot::default());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut store = PlacesDataStore::new(MemoryStore::new());
        let snapshot = populated_snapshot();
        store.save_snapshot(&snapshot).unwrap();
        assert_eq!(store.load_snapshot(), snapshot);
    }

    #[test]
    fn test_empty_maps_and_none_remove_keys() {
        let mut store = PlacesDataStore::new(MemoryStore::new());
        store.save_snapshot(&populated_snapshot()).unwrap();
        store.save_snapshot(&MembershipSnapshot::default()).unwrap();

        let backend = store.inner();
        assert!(!backend.contains(keys::NEARBY_POIS));
        assert!(!backend.contains(keys::USER_WITHIN_POIS));
        assert!(!backend.contains(keys::CURRENT_POI));
        assert!(!backend.contains(keys::ACCURACY));
        assert!(!backend.contains(keys::MEMBERSHIP_VALID_UNTIL));
        assert!(backend.contains(keys::LATITUDE));
        assert_eq!(
            backend.get(keys::AUTH_STATUS),
            Some(Value::from("unknown"))
        );
    }

    #[test]
    fn test_clear_membership_removes_only_membership_keys() {
        let mut store = PlacesDataStore::new(MemoryStore::new());
        store.save_snapshot(&populated_snapshot()).unwrap();
        store.persist_membership_cleared().unwrap();

        let loaded = store.load_snapshot();
        assert!(loaded.current_poi.is_none());
        assert!(loaded.last_entered_poi.is_none());
        assert!(loaded.last_exited_poi.is_none());
        assert!(loaded.membership_valid_until.is_none());
        assert_eq!(loaded.nearby_pois.len(), 2);
        assert_eq!(loaded.authorization_status, AuthorizationStatus::WhenInUse);
    }

    #[test]
    fn test_hydrate_keeps_configured_ttl() {
        let mut store = PlacesDataStore::new(MemoryStore::new());
        store.save_snapshot(&populated_snapshot()).unwrap();

        let mut state = MembershipState::default();
        state.set_membership_ttl(60);
        store.hydrate(&mut state);
        assert_eq!(state.snapshot().membership_ttl_secs, 60);
        assert_eq!(state.snapshot().user_within_pois.len(), 1);

        let mut copy = PlacesDataStore::new(MemoryStore::new());
        copy.persist_all(&state).unwrap();
        assert_eq!(copy.load_snapshot().current_poi, state.snapshot().current_poi);
    }

    #[test]
    fn test_clear_all_removes_every_key() {
        let mut store = PlacesDataStore::new(MemoryStore::new());
        store.save_snapshot(&populated_snapshot()).unwrap();
        store.clear_all().unwrap();
        for key in [keys::NEARBY_POIS, keys::LATITUDE, keys::AUTH_STATUS, keys::ACCURACY] {
            assert!(!store.inner().contains(key));
        }
        assert_eq!(store.load_snapshot(), MembershipSnapshot::default());
    }

    #[test]
    fn test_corrupt_entries_are_skipped() {
        let mut backend = MemoryStore::new();
        backend
            .set(
                keys::NEARBY_POIS,
                serde_json::json!({
                    "good": poi("good", false).to_json_string(),
                    "bad": "{not json",
                    "wrong": 12
                }),
            )
            .unwrap();
        backend.set(keys::CURRENT_POI, Value::from("garbage")).unwrap();
        backend.set(keys::LATITUDE, Value::from("north")).unwrap();

        let loaded = PlacesDataStore::new(backend).load_snapshot();
        assert_eq!(loaded.nearby_pois.keys().collect::<Vec<_>>(), vec!["good"]);
        assert!(loaded.current_poi.is_none());
        assert!((loaded.last_known_latitude - INVALID_LAT_LON).abs() < f64::EPSILON);
    }

    #[test]
    fn test_json_file_store_persists_across_open() {
        let dir = TempDir::new().unwrap();
        let snapshot = populated_snapshot();
        {
            let mut store = PlacesDataStore::new(JsonFileStore::in_dir(dir.path()).unwrap());
            store.save_snapshot(&snapshot).unwrap();
        }

        let reopened = PlacesDataStore::new(JsonFileStore::in_dir(dir.path()).unwrap());
        assert_eq!(reopened.load_snapshot(), snapshot);
        assert!(reopened.inner().path().ends_with(DATA_STORE_FILE));
    }

    #[test]
    fn test_json_file_store_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("deeper").join("store.json");
        let mut store = JsonFileStore::open(&path).unwrap();
        store.set("key", Value::from(1.5)).unwrap();
        assert!(path.exists());

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.get("key"), Some(Value::from(1.5)));
    }

    #[test]
    fn test_json_file_store_rejects_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "not json at all").unwrap();
        assert!(matches!(
            JsonFileStore::open(&path),
            Err(StorageError::ParseError { .. })
        ));
    }
}
