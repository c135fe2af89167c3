//! Collaborator seams for the planner.
//!
//! Route computation, geocoding, and live hazard delivery all happen outside
//! this crate. Concrete apps implement these traits for their own backends.

use crate::feed::FeedError;
use crate::preference::{LocationError, LocationRef, TripRequest};
use crate::ranking::{ProviderError, RawCandidate};
use crate::session::{HazardEvent, SessionEvent, SessionSnapshot};

/// Resolves free text typed by a traveler into a place.
pub trait LocationResolver {
    fn resolve(&self, text: &str) -> Result<LocationRef, LocationError>;
}

/// Supplies raw per-candidate metrics for a trip request.
///
/// The actual path computation is the provider's job; the planner only ranks
/// what it is given.
pub trait MetricsProvider {
    fn candidates_for(&self, request: &TripRequest) -> Result<Vec<RawCandidate>, ProviderError>;
}

/// Push-style hazard source drained by the navigator.
pub trait HazardFeed {
    /// Returns events that arrived since the previous poll.
    fn poll(&mut self) -> Result<Vec<HazardEvent>, FeedError>;

    /// Called once when the session no longer wants events.
    fn unsubscribe(&mut self) {}
}

/// Receives a notification for every session transition.
///
/// Observers get read-only snapshots and never touch session state.
pub trait SessionObserver: Send + Sync {
    fn on_transition(&self, event: &SessionEvent, snapshot: &SessionSnapshot);
}
