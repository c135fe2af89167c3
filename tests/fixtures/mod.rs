//! Shared fixtures for saferoute integration tests.
//!
//! Provides builders for raw candidates and steps, plus test doubles for the
//! collaborator traits.

#![allow(dead_code)]

use std::sync::Mutex;

use saferoute::preference::{create_request, LocationRef, OptimizationGoal, TripRequest};
use saferoute::ranking::{ProviderError, RawCandidate, RouteCandidate, RouteId, Score};
use saferoute::session::{
    HazardEvent, HazardKind, HazardPosition, RouteStep, SessionEvent, SessionSnapshot,
};
use saferoute::traits::{MetricsProvider, SessionObserver};

/// Builder for raw candidates with sensible defaults.
#[derive(Clone, Debug)]
pub struct TestCandidate {
    raw: RawCandidate,
}

impl TestCandidate {
    pub fn new(id: u32) -> Self {
        Self {
            raw: RawCandidate {
                id: RouteId(id),
                name: format!("Route {}", id),
                eta_seconds: 600,
                distance_meters: 5000,
                safety: Score::Medium,
                pollution: Score::Medium,
                highlights: Vec::new(),
                steps: steps(3),
            },
        }
    }

    pub fn eta(mut self, seconds: u32) -> Self {
        self.raw.eta_seconds = seconds;
        self
    }

    pub fn safety(mut self, score: Score) -> Self {
        self.raw.safety = score;
        self
    }

    pub fn pollution(mut self, score: Score) -> Self {
        self.raw.pollution = score;
        self
    }

    pub fn steps(mut self, count: usize) -> Self {
        self.raw.steps = steps(count);
        self
    }

    pub fn build(self) -> RawCandidate {
        self.raw
    }
}

/// The three routes used throughout: safe/slow, balanced, fast/risky.
pub fn scenario_candidates() -> Vec<RawCandidate> {
    vec![
        TestCandidate::new(1).eta(1500).safety(Score::High).pollution(Score::Low).build(),
        TestCandidate::new(2).eta(1080).safety(Score::Medium).pollution(Score::Medium).build(),
        TestCandidate::new(3).eta(900).safety(Score::Low).pollution(Score::High).build(),
    ]
}

pub fn request(goal: OptimizationGoal) -> TripRequest {
    create_request(LocationRef::new("a", "A"), LocationRef::new("b", "B"), goal)
        .expect("valid request")
}

pub fn steps(count: usize) -> Vec<RouteStep> {
    (0..count)
        .map(|i| {
            if i + 1 == count {
                RouteStep::new(i, "Arrive at destination", 100)
            } else {
                RouteStep::new(i, format!("Continue for leg {}", i + 1), 400)
            }
        })
        .collect()
}

pub fn route(id: u32) -> RouteCandidate {
    RouteCandidate {
        id: RouteId(id),
        display_name: format!("Route {}", id),
        eta_seconds: 600,
        distance_meters: 5000,
        safety_score: Score::High,
        pollution_score: Score::Low,
        highlights: Vec::new(),
    }
}

pub fn hazard(id: u64, kind: HazardKind) -> HazardEvent {
    HazardEvent {
        id,
        kind,
        message: format!("hazard {}", id),
        position: HazardPosition::ArrivalOffset(60),
    }
}

/// Provider that returns a fixed list.
pub struct FixedProvider(pub Vec<RawCandidate>);

impl MetricsProvider for FixedProvider {
    fn candidates_for(&self, _request: &TripRequest) -> Result<Vec<RawCandidate>, ProviderError> {
        Ok(self.0.clone())
    }
}

/// Provider that always fails.
pub struct DownProvider;

impl MetricsProvider for DownProvider {
    fn candidates_for(&self, _request: &TripRequest) -> Result<Vec<RawCandidate>, ProviderError> {
        Err(ProviderError::Unavailable("route service offline".to_string()))
    }
}

/// Observer that records every event it sees.
#[derive(Default)]
pub struct RecordingObserver {
    seen: Mutex<Vec<(SessionEvent, SessionSnapshot)>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<SessionEvent> {
        self.seen.lock().unwrap().iter().map(|(e, _)| e.clone()).collect()
    }

    pub fn last_snapshot(&self) -> Option<SessionSnapshot> {
        self.seen.lock().unwrap().last().map(|(_, s)| s.clone())
    }
}

impl SessionObserver for RecordingObserver {
    fn on_transition(&self, event: &SessionEvent, snapshot: &SessionSnapshot) {
        self.seen.lock().unwrap().push((event.clone(), snapshot.clone()));
    }
}
