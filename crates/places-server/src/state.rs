//! Application state shared across handlers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use places_core::{KeyValueStore, PlacesService};
use tokio::sync::{Mutex, MutexGuard};

/// The service type the server runs, over any storage backend.
pub type Service = PlacesService<Box<dyn KeyValueStore>>;

/// Shared application state.
///
/// The service sits behind a single mutex, so requests are applied in arrival
/// order and never interleave. A nearby lookup holds the lock while the query
/// service responds.
#[derive(Clone)]
pub struct SharedState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    service: Mutex<Service>,
    started_at: DateTime<Utc>,
}

impl SharedState {
    /// Wrap a service.
    #[must_use]
    pub fn new(service: Service) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                service: Mutex::new(service),
                started_at: Utc::now(),
            }),
        }
    }

    /// Exclusive access to the service.
    pub async fn service(&self) -> MutexGuard<'_, Service> {
        self.inner.service.lock().await
    }

    /// When this state was created.
    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.inner.started_at
    }
}
