//! Outbound notifications.
//!
//! [`crate::service::PlacesService`] reports every shared-state change and every
//! response through a [`PlacesEventSink`]. Sinks must not block.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::poi::PointOfInterest;
use crate::query::QueryResponseCode;
use crate::region::RegionEventType;
use crate::snapshot::SharedStateProjection;

/// Default buffer size of a [`ChannelSink`].
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Something the Places service announces.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlacesNotification {
    /// A new shared state was published.
    SharedStateUpdated {
        /// The published projection.
        state: SharedStateProjection,
    },
    /// The shared state was replaced by an empty one (reset or opt-out).
    SharedStateCleared,
    /// Result of a nearby-POI request.
    NearbyPlacesResponse {
        /// Lookup outcome.
        status: QueryResponseCode,
        /// POIs returned by the lookup.
        pois: Vec<PointOfInterest>,
    },
    /// A region event changed membership.
    RegionEventProcessed {
        /// The POI the event was for.
        poi: PointOfInterest,
        /// Entry or exit.
        event_type: RegionEventType,
    },
    /// Result of a user-within request.
    UserWithinPlacesResponse {
        /// POIs the device is within.
        pois: Vec<PointOfInterest>,
    },
    /// Result of a last-known-location request.
    LastKnownLocationResponse {
        /// Latitude, or the invalid sentinel.
        latitude: f64,
        /// Longitude, or the invalid sentinel.
        longitude: f64,
    },
}

impl PlacesNotification {
    /// Short name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SharedStateUpdated { .. } => "shared_state_updated",
            Self::SharedStateCleared => "shared_state_cleared",
            Self::NearbyPlacesResponse { .. } => "nearby_places_response",
            Self::RegionEventProcessed { .. } => "region_event_processed",
            Self::UserWithinPlacesResponse { .. } => "user_within_places_response",
            Self::LastKnownLocationResponse { .. } => "last_known_location_response",
        }
    }
}

/// Receives notifications from the service.
pub trait PlacesEventSink: Send + Sync {
    /// Deliver `notification`.
    fn publish(&self, notification: PlacesNotification);
}

/// Drops every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl PlacesEventSink for NoopSink {
    fn publish(&self, _notification: PlacesNotification) {}
}

/// Fans notifications out over a [`tokio::sync::broadcast`] channel.
///
/// Slow subscribers lose the oldest notifications; publishing with no
/// subscribers is not an error.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: broadcast::Sender<PlacesNotification>,
}

impl ChannelSink {
    /// Create a sink buffering up to `capacity` notifications per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to notifications published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PlacesNotification> {
        self.sender.subscribe()
    }
}

impl Default for ChannelSink {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl PlacesEventSink for ChannelSink {
    fn publish(&self, notification: PlacesNotification) {
        let name = notification.name();
        if self.sender.send(notification).is_err() {
            tracing::trace!(notification = name, "No subscribers for Places notification");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_sink_delivers_to_subscribers() {
        let sink = ChannelSink::default();
        let mut first = sink.subscribe();
        let mut second = sink.subscribe();

        sink.publish(PlacesNotification::SharedStateCleared);

        assert_eq!(first.recv().await.unwrap(), PlacesNotification::SharedStateCleared);
        assert_eq!(second.recv().await.unwrap(), PlacesNotification::SharedStateCleared);
    }

    #[test]
    fn test_channel_sink_without_subscribers() {
        let sink = ChannelSink::new(0);
        sink.publish(PlacesNotification::SharedStateCleared);
    }

    #[test]
    fn test_notification_serialization() {
        let json = serde_json::to_value(PlacesNotification::NearbyPlacesResponse {
            status: QueryResponseCode::Ok,
            pois: vec![PointOfInterest::new("a", "A")],
        })
        .unwrap();
        assert_eq!(json["type"], "nearby_places_response");
        assert_eq!(json["status"], 0);
        assert_eq!(json["pois"][0]["regionid"], "a");
    }
}
