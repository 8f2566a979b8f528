//! Request handling for Places.
//!
//! [`PlacesService`] is what hosts talk to. It owns the membership state and
//! its persistence, runs lookups through a [`PlacesQueryService`] and reports
//! every outcome to a [`PlacesEventSink`].
//!
//! All methods take `&mut self` or `&self`; hosts that share a service between
//! tasks wrap it in a mutex so requests are applied one at a time.
//!
//! While the privacy status is opted-out, requests are ignored: mutations do
//! nothing, reads return nothing, and nothing is published. [`PlacesService::reset`]
//! and [`PlacesService::set_privacy_status`] still work.

use std::sync::Arc;

use serde_json::Value;

use crate::authorization::{AccuracyAuthorization, AuthorizationStatus, PrivacyStatus};
use crate::clock::{Clock, SystemClock};
use crate::config::PlacesConfig;
use crate::error::{PlacesError, Result};
use crate::membership::MembershipState;
use crate::notify::{PlacesEventSink, PlacesNotification};
use crate::poi::PointOfInterest;
use crate::query::{PlacesQueryService, QueryResponseCode, QueryResult, DEFAULT_NEARBY_POI_COUNT};
use crate::region::RegionEventType;
use crate::snapshot::SharedStateProjection;
use crate::storage::{KeyValueStore, PlacesDataStore};

/// Construction options for [`PlacesService`].
#[derive(Debug, Clone)]
pub struct PlacesServiceOptions {
    /// Places settings; lookups report a configuration error while `None`.
    pub config: Option<PlacesConfig>,
    /// Initial privacy status.
    pub privacy: PrivacyStatus,
    /// Time source for membership expiry.
    pub clock: Arc<dyn Clock>,
}

impl Default for PlacesServiceOptions {
    fn default() -> Self {
        Self {
            config: None,
            privacy: PrivacyStatus::Unknown,
            clock: Arc::new(SystemClock),
        }
    }
}

/// The Places request handler.
pub struct PlacesService<S> {
    state: MembershipState,
    store: PlacesDataStore<S>,
    query: Arc<dyn PlacesQueryService>,
    sink: Arc<dyn PlacesEventSink>,
    config: Option<PlacesConfig>,
    privacy: PrivacyStatus,
}

impl<S: KeyValueStore> PlacesService<S> {
    /// Create the service, load persisted state and publish the initial shared
    /// state.
    ///
    /// # Errors
    ///
    /// Returns an error if expired membership cannot be cleared from storage.
    pub fn new(
        store: S,
        query: Arc<dyn PlacesQueryService>,
        sink: Arc<dyn PlacesEventSink>,
        options: PlacesServiceOptions,
    ) -> Result<Self> {
        let store = PlacesDataStore::new(store);
        let mut state = MembershipState::new(options.clock);
        if let Some(config) = &options.config {
            state.set_membership_ttl(config.membership_ttl);
        }
        store.hydrate(&mut state);

        let mut service = Self {
            state,
            store,
            query,
            sink,
            config: options.config,
            privacy: options.privacy,
        };

        tracing::debug!(
            nearby = service.state.snapshot().nearby_pois.len(),
            within = service.state.snapshot().user_within_pois.len(),
            "Loaded persisted Places state"
        );

        if service.privacy.is_opted_out() {
            service.sink.publish(PlacesNotification::SharedStateCleared);
        } else {
            service.publish_shared_state()?;
        }
        Ok(service)
    }

    // =========================================================================
    // REQUESTS
    // =========================================================================

    /// Look up POIs near a coordinate and update membership from the result.
    ///
    /// The returned status is also published as a
    /// [`PlacesNotification::NearbyPlacesResponse`]. A non-OK lookup leaves
    /// the membership untouched. `limit` defaults to
    /// [`DEFAULT_NEARBY_POI_COUNT`].
    ///
    /// # Errors
    ///
    /// Returns an error only if persisting the new state fails.
    pub async fn get_nearby_places(
        &mut self,
        latitude: f64,
        longitude: f64,
        limit: Option<usize>,
    ) -> Result<QueryResult> {
        match self.lookup(latitude, longitude, limit).await {
            Ok(result) => {
                self.sink.publish(PlacesNotification::NearbyPlacesResponse {
                    status: result.response,
                    pois: result.pois.clone(),
                });
                Ok(result)
            }
            Err(err) => {
                self.sink.publish(PlacesNotification::NearbyPlacesResponse {
                    status: QueryResponseCode::UnknownError,
                    pois: Vec::new(),
                });
                Err(err)
            }
        }
    }

    async fn lookup(
        &mut self,
        latitude: f64,
        longitude: f64,
        limit: Option<usize>,
    ) -> Result<QueryResult> {
        if self.privacy.is_opted_out() {
            tracing::trace!("Ignoring request to get nearby places: privacy status is opted-out");
            return Ok(QueryResult::failed(QueryResponseCode::PrivacyOptedOut));
        }

        let Some(config) = self.valid_config().cloned() else {
            tracing::debug!("Places configuration is missing or invalid");
            return Ok(QueryResult::failed(QueryResponseCode::ConfigurationError));
        };

        if !is_valid_coordinate(latitude, longitude) {
            tracing::debug!(latitude, longitude, "Invalid coordinate for nearby places request");
            return Ok(QueryResult::failed(QueryResponseCode::InvalidLatLongError));
        }

        self.state.set_last_known_coordinate(latitude, longitude);
        self.state.set_membership_ttl(config.membership_ttl);
        self.state.refresh_membership_valid_until();
        self.store.persist_all(&self.state)?;

        let limit = limit.unwrap_or(DEFAULT_NEARBY_POI_COUNT);
        tracing::debug!(limit, latitude, longitude, "Requesting nearby POIs");

        let result = self
            .query
            .get_nearby_places(latitude, longitude, limit, &config)
            .await;

        if result.response.is_ok() {
            self.state.apply_nearby_snapshot(&result.pois);
            self.store.persist_all(&self.state)?;
            self.publish_shared_state()?;
        }

        Ok(result)
    }

    /// Apply a geofence entry or exit for a nearby POI.
    ///
    /// Returns the POI the event was applied to, or `None` if the request was
    /// ignored (opted-out or unusable configuration).
    ///
    /// # Errors
    ///
    /// Returns [`PlacesError::UnknownRegion`] if `region_id` is not among the
    /// nearby POIs, or a persistence error.
    pub fn process_region_event(
        &mut self,
        region_id: &str,
        event_type: RegionEventType,
    ) -> Result<Option<PointOfInterest>> {
        if self.privacy.is_opted_out() {
            tracing::trace!("Ignoring region event: privacy status is opted-out");
            return Ok(None);
        }

        let Some(ttl) = self.valid_config().map(|config| config.membership_ttl) else {
            tracing::debug!("Ignoring region event: Places configuration is missing or invalid");
            return Ok(None);
        };

        let Some(poi) = self.state.snapshot().nearby_pois.get(region_id).cloned() else {
            tracing::debug!(region_id, "Region event for a POI that is not nearby");
            return Err(PlacesError::UnknownRegion(region_id.to_owned()));
        };

        tracing::debug!(
            event = %event_type,
            region = poi.name(),
            "Processing region event"
        );

        self.state.set_membership_ttl(ttl);
        self.state.apply_region_event(event_type, &poi);
        self.store.persist_all(&self.state)?;
        self.publish_shared_state()?;

        self.sink.publish(PlacesNotification::RegionEventProcessed {
            poi: poi.clone(),
            event_type,
        });
        Ok(Some(poi))
    }

    /// POIs the device is currently within.
    #[must_use]
    pub fn user_within_places(&self) -> Vec<PointOfInterest> {
        if self.privacy.is_opted_out() {
            return Vec::new();
        }

        let pois: Vec<PointOfInterest> = self
            .state
            .snapshot()
            .user_within_pois
            .values()
            .cloned()
            .collect();
        self.sink
            .publish(PlacesNotification::UserWithinPlacesResponse { pois: pois.clone() });
        pois
    }

    /// Coordinate of the last lookup, or `None` if none has been made.
    #[must_use]
    pub fn last_known_location(&self) -> Option<(f64, f64)> {
        if self.privacy.is_opted_out() {
            return None;
        }

        let snapshot = self.state.snapshot();
        let (latitude, longitude) = (snapshot.last_known_latitude, snapshot.last_known_longitude);
        self.sink
            .publish(PlacesNotification::LastKnownLocationResponse { latitude, longitude });

        is_valid_coordinate(latitude, longitude).then_some((latitude, longitude))
    }

    /// The highest-priority POI the device is within, if membership is current.
    ///
    /// # Errors
    ///
    /// Returns an error if expired membership cannot be cleared from storage.
    pub fn current_poi(&mut self) -> Result<Option<PointOfInterest>> {
        if self.privacy.is_opted_out() {
            return Ok(None);
        }
        self.expire_membership()?;
        Ok(self.state.snapshot().current_poi.clone())
    }

    /// The shared state as it would be published now, or `None` while opted-out.
    ///
    /// # Errors
    ///
    /// Returns an error if expired membership cannot be cleared from storage.
    pub fn shared_state(&mut self) -> Result<Option<SharedStateProjection>> {
        if self.privacy.is_opted_out() {
            return Ok(None);
        }
        self.projection().map(Some)
    }

    // =========================================================================
    // SETTINGS
    // =========================================================================

    /// Record the location authorization status.
    ///
    /// # Errors
    ///
    /// Returns an error if persisting fails.
    pub fn set_authorization_status(&mut self, status: AuthorizationStatus) -> Result<()> {
        if self.privacy.is_opted_out() {
            return Ok(());
        }
        tracing::debug!(%status, "Setting location authorization status");
        self.state.set_authorization_status(status);
        self.store.persist_all(&self.state)?;
        self.publish_shared_state().map(|_| ())
    }

    /// Record the location accuracy; `None` clears it.
    ///
    /// # Errors
    ///
    /// Returns an error if persisting fails.
    pub fn set_accuracy(&mut self, accuracy: Option<AccuracyAuthorization>) -> Result<()> {
        if self.privacy.is_opted_out() {
            return Ok(());
        }
        tracing::debug!(
            accuracy = accuracy.map_or("none", AccuracyAuthorization::as_str),
            "Setting location accuracy"
        );
        self.state.set_accuracy(accuracy);
        self.store.persist_all(&self.state)?;
        self.publish_shared_state().map(|_| ())
    }

    /// Clear all state and persistence and publish an empty shared state.
    ///
    /// # Errors
    ///
    /// Returns an error if the persisted keys cannot be removed.
    pub fn reset(&mut self) -> Result<()> {
        self.state.clear_all();
        self.store.clear_all()?;
        self.sink.publish(PlacesNotification::SharedStateCleared);
        tracing::debug!("Places shared state and persisted data have been reset");
        Ok(())
    }

    /// Change the privacy status. Opting out publishes an empty shared state.
    pub fn set_privacy_status(&mut self, status: PrivacyStatus) {
        if status.is_opted_out() {
            tracing::debug!("Stopping Places processing due to privacy opt-out");
            self.sink.publish(PlacesNotification::SharedStateCleared);
        }
        self.privacy = status;
    }

    /// Replace the Places settings.
    pub fn set_config(&mut self, config: Option<PlacesConfig>) {
        if let Some(config) = &config {
            self.state.set_membership_ttl(config.membership_ttl);
        }
        self.config = config;
    }

    /// Replace the Places settings from a flat shared-state object.
    ///
    /// Returns whether the result is usable for lookups.
    pub fn update_configuration(&mut self, data: &Value) -> bool {
        self.set_config(PlacesConfig::from_shared_state(data));
        self.valid_config().is_some()
    }

    /// Current Places settings.
    #[must_use]
    pub const fn config(&self) -> Option<&PlacesConfig> {
        self.config.as_ref()
    }

    /// Current privacy status.
    #[must_use]
    pub const fn privacy_status(&self) -> PrivacyStatus {
        self.privacy
    }

    /// Persistence layer, for inspection.
    #[must_use]
    pub const fn store(&self) -> &PlacesDataStore<S> {
        &self.store
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    fn valid_config(&self) -> Option<&PlacesConfig> {
        self.config.as_ref().filter(|config| config.is_valid())
    }

    fn expire_membership(&mut self) -> Result<()> {
        if self.state.expire_if_stale() {
            self.store.persist_membership_cleared()?;
        }
        Ok(())
    }

    fn projection(&mut self) -> Result<SharedStateProjection> {
        self.expire_membership()?;
        Ok(self.state.project())
    }

    fn publish_shared_state(&mut self) -> Result<SharedStateProjection> {
        let state = self.projection()?;
        self.sink.publish(PlacesNotification::SharedStateUpdated {
            state: state.clone(),
        });
        Ok(state)
    }
}

impl<S> std::fmt::Debug for PlacesService<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlacesService")
            .field("state", &self.state)
            .field("config", &self.config)
            .field("privacy", &self.privacy)
            .finish_non_exhaustive()
    }
}

/// Whether the pair is a finite, in-range latitude/longitude.
#[must_use]
pub fn is_valid_coordinate(latitude: f64, longitude: f64) -> bool {
    latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::config::PlacesLibrary;
    use crate::notify::ChannelSink;
    use crate::storage::{keys, MemoryStore};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::sync::broadcast::Receiver;

    const NOW: i64 = 1_700_000_000;

    #[derive(Default)]
    struct MockQueryService {
        result: Mutex<Option<QueryResult>>,
        calls: Mutex<Vec<(f64, f64, usize)>>,
    }

    impl MockQueryService {
        fn returning(result: QueryResult) -> Arc<Self> {
            Arc::new(Self {
                result: Mutex::new(Some(result)),
                calls: Mutex::default(),
            })
        }

        fn set_result(&self, result: QueryResult) {
            *self.result.lock().unwrap() = Some(result);
        }

        fn calls(&self) -> Vec<(f64, f64, usize)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PlacesQueryService for MockQueryService {
        async fn get_nearby_places(
            &self,
            latitude: f64,
            longitude: f64,
            limit: usize,
            _config: &PlacesConfig,
        ) -> QueryResult {
            self.calls.lock().unwrap().push((latitude, longitude, limit));
            self.result
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| QueryResult::ok(Vec::new()))
        }
    }

    struct Harness {
        service: PlacesService<MemoryStore>,
        query: Arc<MockQueryService>,
        clock: Arc<FixedClock>,
        events: Receiver<PlacesNotification>,
    }

    fn places_config() -> PlacesConfig {
        PlacesConfig {
            libraries: vec![PlacesLibrary::new("lib1", "Library")],
            endpoint: "places.example.com".into(),
            membership_ttl: 600,
        }
    }

    fn poi(id: &str, weight: i64, radius: i64, within: bool) -> PointOfInterest {
        PointOfInterest::new(id, format!("{id} name"))
            .with_location(40.0, -80.0)
            .with_weight(weight)
            .with_radius(radius)
            .with_user_within(within)
    }

    fn harness_with(store: MemoryStore, result: QueryResult) -> Harness {
        let query = MockQueryService::returning(result);
        let clock = Arc::new(FixedClock::at(NOW));
        let sink = ChannelSink::default();
        let events = sink.subscribe();
        let service = PlacesService::new(
            store,
            query.clone(),
            Arc::new(sink),
            PlacesServiceOptions {
                config: Some(places_config()),
                privacy: PrivacyStatus::OptedIn,
                clock: clock.clone(),
            },
        )
        .unwrap();
        Harness {
            service,
            query,
            clock,
            events,
        }
    }

    fn harness(result: QueryResult) -> Harness {
        harness_with(MemoryStore::new(), result)
    }

    fn drain(events: &mut Receiver<PlacesNotification>) -> Vec<PlacesNotification> {
        std::iter::from_fn(|| events.try_recv().ok()).collect()
    }

    #[tokio::test]
    async fn test_new_publishes_initial_state() {
        let mut h = harness(QueryResult::ok(Vec::new()));
        let events = drain(&mut h.events);
        assert_eq!(
            events,
            vec![PlacesNotification::SharedStateUpdated {
                state: SharedStateProjection::default()
            }]
        );
    }

    #[tokio::test]
    async fn test_nearby_places_updates_membership() {
        let pois = vec![poi("a", 5, 100, true), poi("b", 5, 50, true), poi("c", 1, 10, false)];
        let mut h = harness(QueryResult::ok(pois.clone()));
        drain(&mut h.events);

        let result = h.service.get_nearby_places(40.0, -80.0, None).await.unwrap();
        assert_eq!(result.response, QueryResponseCode::Ok);
        assert_eq!(h.query.calls(), vec![(40.0, -80.0, DEFAULT_NEARBY_POI_COUNT)]);

        let current = h.service.current_poi().unwrap().unwrap();
        assert_eq!(current.identifier(), "b");
        assert_eq!(h.service.user_within_places().len(), 2);
        assert_eq!(h.service.last_known_location(), Some((40.0, -80.0)));

        let state = h.service.shared_state().unwrap().unwrap();
        assert_eq!(state.nearby_pois.len(), 3);
        assert_eq!(state.last_entered_poi.unwrap().identifier(), "a");
        assert_eq!(state.valid_until, NOW + 600);

        let events = drain(&mut h.events);
        assert!(matches!(events[0], PlacesNotification::SharedStateUpdated { .. }));
        assert_eq!(
            events[1],
            PlacesNotification::NearbyPlacesResponse {
                status: QueryResponseCode::Ok,
                pois,
            }
        );
    }

    #[tokio::test]
    async fn test_nearby_places_persists() {
        let mut h = harness(QueryResult::ok(vec![poi("a", 1, 10, true)]));
        h.service.get_nearby_places(40.0, -80.0, Some(3)).await.unwrap();

        let backend = h.service.store().inner();
        assert!(backend.contains(keys::NEARBY_POIS));
        assert!(backend.contains(keys::CURRENT_POI));
        assert_eq!(
            backend.get(keys::MEMBERSHIP_VALID_UNTIL),
            Some(Value::from(1_700_000_600.0))
        );
        assert_eq!(h.query.calls()[0].2, 3);
    }

    #[tokio::test]
    async fn test_failed_lookup_keeps_membership() {
        let mut h = harness(QueryResult::ok(vec![poi("a", 1, 10, true)]));
        h.service.get_nearby_places(40.0, -80.0, None).await.unwrap();
        drain(&mut h.events);

        h.query
            .set_result(QueryResult::failed(QueryResponseCode::ServerResponseError));
        let result = h.service.get_nearby_places(41.0, -81.0, None).await.unwrap();
        assert_eq!(result.response, QueryResponseCode::ServerResponseError);
        assert_eq!(h.service.current_poi().unwrap().unwrap().identifier(), "a");
        assert_eq!(h.service.last_known_location(), Some((41.0, -81.0)));

        let events = drain(&mut h.events);
        assert!(!events
            .iter()
            .any(|e| matches!(e, PlacesNotification::SharedStateUpdated { .. })));
    }

    #[tokio::test]
    async fn test_nearby_places_rejects_bad_requests() {
        let mut h = harness(QueryResult::ok(Vec::new()));

        for (lat, lon) in [(f64::NAN, 0.0), (91.0, 0.0), (0.0, 180.5)] {
            let result = h.service.get_nearby_places(lat, lon, None).await.unwrap();
            assert_eq!(result.response, QueryResponseCode::InvalidLatLongError);
        }

        h.service.set_config(Some(PlacesConfig::default()));
        let result = h.service.get_nearby_places(40.0, -80.0, None).await.unwrap();
        assert_eq!(result.response, QueryResponseCode::ConfigurationError);

        h.service.set_config(None);
        let result = h.service.get_nearby_places(40.0, -80.0, None).await.unwrap();
        assert_eq!(result.response, QueryResponseCode::ConfigurationError);

        assert!(h.query.calls().is_empty());
        assert_eq!(h.service.last_known_location(), None);
    }

    #[tokio::test]
    async fn test_privacy_opt_out_stops_processing() {
        let mut h = harness(QueryResult::ok(vec![poi("a", 1, 10, true)]));
        h.service.get_nearby_places(40.0, -80.0, None).await.unwrap();
        drain(&mut h.events);

        h.service.set_privacy_status(PrivacyStatus::OptedOut);
        assert_eq!(drain(&mut h.events), vec![PlacesNotification::SharedStateCleared]);

        let result = h.service.get_nearby_places(40.0, -80.0, None).await.unwrap();
        assert_eq!(result.response, QueryResponseCode::PrivacyOptedOut);
        assert_eq!(h.query.calls().len(), 1);
        assert_eq!(
            h.service.process_region_event("a", RegionEventType::Exit).unwrap(),
            None
        );
        assert!(h.service.shared_state().unwrap().is_none());
        assert!(h.service.user_within_places().is_empty());

        h.service.set_privacy_status(PrivacyStatus::OptedIn);
        assert_eq!(h.service.current_poi().unwrap().unwrap().identifier(), "a");
    }

    #[tokio::test]
    async fn test_region_events() {
        let mut h = harness(QueryResult::ok(vec![
            poi("strong", 1, 100, true),
            poi("weak", 9, 10, false),
        ]));
        h.service.get_nearby_places(40.0, -80.0, None).await.unwrap();
        drain(&mut h.events);

        let entered = h
            .service
            .process_region_event("weak", RegionEventType::Entry)
            .unwrap()
            .unwrap();
        assert_eq!(entered.identifier(), "weak");
        assert_eq!(h.service.current_poi().unwrap().unwrap().identifier(), "strong");

        h.service
            .process_region_event("strong", RegionEventType::Exit)
            .unwrap();
        let state = h.service.shared_state().unwrap().unwrap();
        assert_eq!(state.current_poi.unwrap().identifier(), "weak");
        assert_eq!(state.last_exited_poi.unwrap().identifier(), "strong");
        assert_eq!(state.last_entered_poi.unwrap().identifier(), "weak");

        let events = drain(&mut h.events);
        assert!(events.contains(&PlacesNotification::RegionEventProcessed {
            poi: poi("strong", 1, 100, true),
            event_type: RegionEventType::Exit,
        }));
    }

    #[tokio::test]
    async fn test_region_event_for_unknown_poi() {
        let mut h = harness(QueryResult::ok(vec![poi("a", 1, 10, false)]));
        h.service.get_nearby_places(40.0, -80.0, None).await.unwrap();

        let err = h
            .service
            .process_region_event("stale", RegionEventType::Entry)
            .unwrap_err();
        assert!(matches!(err, PlacesError::UnknownRegion(ref id) if id == "stale"));
        assert!(h.service.current_poi().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_region_event_ignored_without_config() {
        let mut h = harness(QueryResult::ok(vec![poi("a", 1, 10, false)]));
        h.service.get_nearby_places(40.0, -80.0, None).await.unwrap();
        h.service.set_config(None);

        assert_eq!(
            h.service.process_region_event("a", RegionEventType::Entry).unwrap(),
            None
        );
        assert!(h.service.user_within_places().is_empty());
    }

    #[tokio::test]
    async fn test_membership_expires() {
        let mut h = harness(QueryResult::ok(vec![poi("a", 1, 10, true)]));
        h.service.get_nearby_places(40.0, -80.0, None).await.unwrap();

        h.clock.advance(600);
        assert!(h.service.current_poi().unwrap().is_none());

        let state = h.service.shared_state().unwrap().unwrap();
        assert_eq!(state.valid_until, 0);
        assert_eq!(state.nearby_pois.len(), 1);
        assert!(!h.service.store().inner().contains(keys::CURRENT_POI));
        assert!(!h.service.store().inner().contains(keys::MEMBERSHIP_VALID_UNTIL));
        assert!(h.service.store().inner().contains(keys::NEARBY_POIS));
    }

    #[tokio::test]
    async fn test_state_survives_restart() {
        let mut h = harness(QueryResult::ok(vec![poi("a", 1, 10, true)]));
        h.service.get_nearby_places(40.0, -80.0, None).await.unwrap();
        h.service
            .set_authorization_status(AuthorizationStatus::Always)
            .unwrap();
        let backend = h.service.store().inner().clone();

        let mut restarted = harness_with(backend, QueryResult::ok(Vec::new()));
        let state = restarted.service.shared_state().unwrap().unwrap();
        assert_eq!(state.current_poi.unwrap().identifier(), "a");
        assert_eq!(state.auth_status, AuthorizationStatus::Always);
        assert_eq!(state.valid_until, NOW + 600);
    }

    #[tokio::test]
    async fn test_settings_publish_state() {
        let mut h = harness(QueryResult::ok(Vec::new()));
        drain(&mut h.events);

        h.service
            .set_authorization_status(AuthorizationStatus::WhenInUse)
            .unwrap();
        h.service
            .set_accuracy(Some(AccuracyAuthorization::Reduced))
            .unwrap();

        let events = drain(&mut h.events);
        assert_eq!(events.len(), 2);
        let PlacesNotification::SharedStateUpdated { state } = &events[1] else {
            panic!("expected shared state, got {:?}", events[1]);
        };
        assert_eq!(state.auth_status, AuthorizationStatus::WhenInUse);
        assert_eq!(state.accuracy, Some(AccuracyAuthorization::Reduced));
        assert_eq!(
            h.service.store().inner().get(keys::ACCURACY),
            Some(Value::from("reduced"))
        );
    }

    #[tokio::test]
    async fn test_reset_clears_everything() {
        let mut h = harness(QueryResult::ok(vec![poi("a", 1, 10, true)]));
        h.service.get_nearby_places(40.0, -80.0, None).await.unwrap();
        drain(&mut h.events);

        h.service.reset().unwrap();
        assert_eq!(drain(&mut h.events), vec![PlacesNotification::SharedStateCleared]);
        assert!(h.service.current_poi().unwrap().is_none());
        assert_eq!(h.service.last_known_location(), None);
        assert!(!h.service.store().inner().contains(keys::NEARBY_POIS));
        assert!(!h.service.store().inner().contains(keys::LATITUDE));
    }

    #[tokio::test]
    async fn test_update_configuration_from_shared_state() {
        let mut h = harness(QueryResult::ok(Vec::new()));
        assert!(!h.service.update_configuration(&serde_json::json!({})));
        assert!(h.service.config().is_none());

        assert!(h.service.update_configuration(&serde_json::json!({
            "places.libraries": [{"id": "lib"}],
            "places.endpoint": "places.example.com",
            "places.membershipttl": 30
        })));
        assert_eq!(h.service.config().unwrap().membership_ttl, 30);
    }

    #[test]
    fn test_is_valid_coordinate() {
        assert!(is_valid_coordinate(0.0, 0.0));
        assert!(is_valid_coordinate(-90.0, 180.0));
        assert!(!is_valid_coordinate(90.1, 0.0));
        assert!(!is_valid_coordinate(0.0, f64::INFINITY));
        assert!(!is_valid_coordinate(999.999, 999.999));
    }
}
