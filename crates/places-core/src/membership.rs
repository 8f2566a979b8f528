//! POI membership state machine.
//!
//! [`MembershipState`] owns the current [`MembershipSnapshot`] and is the only
//! place it is mutated. Two operations drive it:
//!
//! - [`apply_nearby_snapshot`](MembershipState::apply_nearby_snapshot) replaces
//!   the nearby and user-within sets with a fresh lookup result.
//! - [`apply_region_event`](MembershipState::apply_region_event) applies a single
//!   geofence entry or exit.
//!
//! Both recompute the current POI through [`crate::priority`] and push
//! `membership_valid_until` forward by the membership TTL. Expiry is lazy: it is
//! only checked when the state is read through [`MembershipState::project`].
//!
//! The state does no I/O. Callers persist the snapshot afterwards (see
//! [`crate::storage::PlacesDataStore`]) and must serialize access to it.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::authorization::{AccuracyAuthorization, AuthorizationStatus};
use crate::clock::{Clock, SystemClock};
use crate::poi::{PointOfInterest, INVALID_LAT_LON};
use crate::priority;
use crate::region::RegionEventType;
use crate::snapshot::SharedStateProjection;

/// Default membership TTL: one hour.
pub const DEFAULT_MEMBERSHIP_TTL_SECS: u64 = 60 * 60;

/// Plain data held by [`MembershipState`].
#[derive(Debug, Clone, PartialEq)]
pub struct MembershipSnapshot {
    /// Most recent lookup result, keyed by identifier.
    pub nearby_pois: BTreeMap<String, PointOfInterest>,
    /// POIs the device is currently within, keyed by identifier.
    pub user_within_pois: BTreeMap<String, PointOfInterest>,
    /// Highest-priority POI among `user_within_pois`.
    pub current_poi: Option<PointOfInterest>,
    /// Most recently entered POI.
    pub last_entered_poi: Option<PointOfInterest>,
    /// Most recently exited POI.
    pub last_exited_poi: Option<PointOfInterest>,
    /// Last latitude handed to a lookup.
    pub last_known_latitude: f64,
    /// Last longitude handed to a lookup.
    pub last_known_longitude: f64,
    /// Seconds of validity granted on each membership update.
    pub membership_ttl_secs: u64,
    /// Epoch seconds after which membership is stale.
    pub membership_valid_until: Option<i64>,
    /// Advisory location permission.
    pub authorization_status: AuthorizationStatus,
    /// Advisory location accuracy.
    pub accuracy: Option<AccuracyAuthorization>,
}

impl Default for MembershipSnapshot {
    fn default() -> Self {
        Self {
            nearby_pois: BTreeMap::new(),
            user_within_pois: BTreeMap::new(),
            current_poi: None,
            last_entered_poi: None,
            last_exited_poi: None,
            last_known_latitude: INVALID_LAT_LON,
            last_known_longitude: INVALID_LAT_LON,
            membership_ttl_secs: DEFAULT_MEMBERSHIP_TTL_SECS,
            membership_valid_until: None,
            authorization_status: AuthorizationStatus::NotDetermined,
            accuracy: None,
        }
    }
}

/// The membership state machine.
#[derive(Debug, Clone)]
pub struct MembershipState {
    snapshot: MembershipSnapshot,
    clock: Arc<dyn Clock>,
}

impl Default for MembershipState {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl MembershipState {
    /// Create an empty state driven by `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            snapshot: MembershipSnapshot::default(),
            clock,
        }
    }

    /// Read-only view of the current snapshot.
    #[must_use]
    pub const fn snapshot(&self) -> &MembershipSnapshot {
        &self.snapshot
    }

    /// Replace the snapshot wholesale, e.g. after loading persistence.
    ///
    /// The TTL currently configured on this state is kept.
    pub fn restore(&mut self, snapshot: MembershipSnapshot) {
        let ttl = self.snapshot.membership_ttl_secs;
        self.snapshot = snapshot;
        self.snapshot.membership_ttl_secs = ttl;
    }

    /// Apply a complete, fresh nearby-POI lookup result.
    ///
    /// `pois` is expected closest-first: the first POI the device is within
    /// becomes `last_entered_poi`. The nearby and user-within sets are replaced,
    /// not merged.
    pub fn apply_nearby_snapshot(&mut self, pois: &[PointOfInterest]) {
        self.snapshot.current_poi = None;

        if pois.is_empty() {
            self.snapshot.nearby_pois.clear();
            self.snapshot.user_within_pois.clear();
        } else {
            let mut nearby = BTreeMap::new();
            let mut within = BTreeMap::new();
            let mut last_entered_updated = false;

            for poi in pois {
                nearby.insert(poi.identifier().to_owned(), poi.clone());

                if !poi.user_is_within() {
                    continue;
                }

                within.insert(poi.identifier().to_owned(), poi.clone());

                if !last_entered_updated {
                    tracing::trace!(
                        name = poi.name(),
                        identifier = poi.identifier(),
                        "Updating lastEnteredPoi from nearby snapshot"
                    );
                    last_entered_updated = true;
                    self.snapshot.last_entered_poi = Some(poi.clone());
                }

                self.snapshot.current_poi =
                    priority::fold_current(self.snapshot.current_poi.take(), poi);
            }

            self.snapshot.nearby_pois = nearby;
            self.snapshot.user_within_pois = within;
        }

        self.refresh_membership_valid_until();
    }

    /// Apply a geofence transition for `poi`.
    ///
    /// This does not check that `poi` is among the nearby POIs; filtering stale
    /// transitions is up to the caller.
    pub fn apply_region_event(&mut self, event_type: RegionEventType, poi: &PointOfInterest) {
        match event_type {
            RegionEventType::Entry => {
                tracing::trace!(
                    name = poi.name(),
                    identifier = poi.identifier(),
                    "Updating lastEnteredPoi from region entry"
                );
                self.snapshot.last_entered_poi = Some(poi.clone());
                self.snapshot
                    .user_within_pois
                    .insert(poi.identifier().to_owned(), poi.clone());
            }
            RegionEventType::Exit => {
                tracing::trace!(
                    name = poi.name(),
                    identifier = poi.identifier(),
                    "Updating lastExitedPoi from region exit"
                );
                self.snapshot.last_exited_poi = Some(poi.clone());
                self.snapshot.current_poi = None;
                self.snapshot.user_within_pois.remove(poi.identifier());
            }
        }

        self.refresh_membership_valid_until();
        self.recalculate_current_poi();
    }

    /// Reset every field to its initial value.
    pub fn clear_all(&mut self) {
        let ttl = self.snapshot.membership_ttl_secs;
        self.snapshot = MembershipSnapshot {
            membership_ttl_secs: ttl,
            ..MembershipSnapshot::default()
        };
    }

    /// Reset the current, last-entered and last-exited POIs and the expiry.
    ///
    /// Nearby and user-within sets, coordinate and authorization are kept.
    pub fn clear_membership(&mut self) {
        self.snapshot.current_poi = None;
        self.snapshot.last_entered_poi = None;
        self.snapshot.last_exited_poi = None;
        self.snapshot.membership_valid_until = None;
    }

    /// Set `membership_valid_until` to now plus the TTL, rounded to the second.
    pub fn refresh_membership_valid_until(&mut self) {
        let ttl_millis = i64::try_from(self.snapshot.membership_ttl_secs)
            .unwrap_or(i64::MAX / 1000)
            .saturating_mul(1000);
        let valid_until_millis = self.clock.now().timestamp_millis().saturating_add(ttl_millis);
        self.snapshot.membership_valid_until =
            Some(valid_until_millis.saturating_add(500).div_euclid(1000));
    }

    /// Whether membership data is still within its TTL.
    #[must_use]
    pub fn is_membership_valid(&self) -> bool {
        self.snapshot
            .membership_valid_until
            .is_some_and(|until| self.clock.now().timestamp() < until)
    }

    /// Clear membership if it has expired. Returns `true` if anything was cleared.
    pub fn expire_if_stale(&mut self) -> bool {
        if self.is_membership_valid() {
            return false;
        }
        tracing::debug!("Membership data expired, clearing membership");
        self.clear_membership();
        true
    }

    /// Produce the published view of the state, expiring membership first.
    pub fn project(&mut self) -> SharedStateProjection {
        self.expire_if_stale();

        let snapshot = &self.snapshot;
        SharedStateProjection {
            nearby_pois: snapshot
                .nearby_pois
                .values()
                .map(|poi| (poi.identifier().to_owned(), poi.to_json_string()))
                .collect(),
            current_poi: snapshot.current_poi.clone(),
            last_entered_poi: snapshot.last_entered_poi.clone(),
            last_exited_poi: snapshot.last_exited_poi.clone(),
            accuracy: snapshot.accuracy,
            auth_status: snapshot.authorization_status,
            valid_until: snapshot.membership_valid_until.unwrap_or(0),
        }
    }

    /// Record the coordinate of the latest lookup.
    pub fn set_last_known_coordinate(&mut self, latitude: f64, longitude: f64) {
        self.snapshot.last_known_latitude = latitude;
        self.snapshot.last_known_longitude = longitude;
    }

    /// Set the TTL used by subsequent refreshes.
    pub fn set_membership_ttl(&mut self, ttl_secs: u64) {
        self.snapshot.membership_ttl_secs = ttl_secs;
    }

    /// Set the advisory authorization status.
    pub fn set_authorization_status(&mut self, status: AuthorizationStatus) {
        self.snapshot.authorization_status = status;
    }

    /// Set the advisory accuracy.
    pub fn set_accuracy(&mut self, accuracy: Option<AccuracyAuthorization>) {
        self.snapshot.accuracy = accuracy;
    }

    fn recalculate_current_poi(&mut self) {
        if self.snapshot.user_within_pois.is_empty() {
            self.snapshot.current_poi = None;
            return;
        }

        self.snapshot.current_poi = priority::resolve_from(
            self.snapshot.current_poi.take(),
            self.snapshot.user_within_pois.values(),
        );
    }
}
