//! Offline provider with three fixed routes.
//!
//! Serves the same Safest/Balanced/Fastest trio and five-step directions for
//! every request. Useful for demos and tests when no route service is
//! reachable.

use crate::preference::{LocationError, LocationRef, TripRequest};
use crate::ranking::{ProviderError, RawCandidate, RouteId, Score};
use crate::session::{HazardEvent, HazardKind, HazardPosition, RouteStep};
use crate::traits::{LocationResolver, MetricsProvider};

#[derive(Debug, Clone, Copy, Default)]
pub struct CannedRoutes;

impl CannedRoutes {
    pub fn new() -> Self {
        Self
    }

    /// Stand-in for device location detection.
    pub fn current_location() -> LocationRef {
        LocationRef::new("current-location", "Current Location (123 Main St, City)")
    }

    /// The construction alert pushed a few seconds into a guided trip.
    pub fn sample_alert() -> HazardEvent {
        HazardEvent {
            id: 1,
            kind: HazardKind::Construction,
            message: "Construction zone ahead. Reduced visibility reported.".to_string(),
            position: HazardPosition::ArrivalOffset(3),
        }
    }

    pub fn directions() -> Vec<RouteStep> {
        vec![
            RouteStep::new(0, "Head north on Main Street", 500),
            RouteStep::new(1, "Turn right onto Oak Avenue", 1200),
            RouteStep::new(2, "Continue straight through downtown", 2100)
                .with_hazard(HazardKind::Crime, "High crime area ahead - stay alert"),
            RouteStep::new(3, "Turn left onto Pine Street", 800),
            RouteStep::new(4, "Arrive at destination", 100),
        ]
    }
}

impl MetricsProvider for CannedRoutes {
    fn candidates_for(&self, _request: &TripRequest) -> Result<Vec<RawCandidate>, ProviderError> {
        Ok(vec![
            canned(
                1,
                "Safest Route",
                1500,
                8200,
                Score::High,
                Score::Low,
                &["Well-lit streets", "Low crime area", "Emergency services nearby"],
            ),
            canned(
                2,
                "Balanced Route",
                1080,
                6800,
                Score::Medium,
                Score::Medium,
                &["Moderate traffic", "Some construction", "Good visibility"],
            ),
            canned(
                3,
                "Fastest Route",
                900,
                6100,
                Score::Low,
                Score::High,
                &["Heavy traffic area", "Industrial zone", "Limited lighting"],
            ),
        ])
    }
}

impl LocationResolver for CannedRoutes {
    /// Every non-blank string names a place; the id is its slug.
    fn resolve(&self, text: &str) -> Result<LocationRef, LocationError> {
        let label = text.trim();
        let id = label
            .split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join("-");
        if id.is_empty() {
            return Err(LocationError::NotFound(text.to_string()));
        }
        Ok(LocationRef::new(id, label))
    }
}

fn canned(
    id: u32,
    name: &str,
    eta_seconds: u32,
    distance_meters: u32,
    safety: Score,
    pollution: Score,
    highlights: &[&str],
) -> RawCandidate {
    RawCandidate {
        id: RouteId(id),
        name: name.to_string(),
        eta_seconds,
        distance_meters,
        safety,
        pollution,
        highlights: highlights.iter().map(|h| h.to_string()).collect(),
        steps: CannedRoutes::directions(),
    }
}
