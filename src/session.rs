//! Navigation session state machine.
//!
//! A session moves `Idle -> Active <-> Paused -> Completed`, with `Rerouting`
//! reachable from `Active` or `Paused`. Emergency is a separate flag that no
//! transition reads, so raising it can never be refused or held up.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ranking::{RouteCandidate, RouteId};

/// Maximum number of alerts a session keeps by default.
const DEFAULT_ALERT_CAPACITY: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HazardKind {
    Crime,
    Pollution,
    Construction,
    Other,
}

/// A warning printed alongside one step of the directions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepHazard {
    pub kind: HazardKind,
    pub message: String,
}

/// One leg of turn-by-turn directions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteStep {
    pub index: usize,
    pub instruction: String,
    pub leg_distance_meters: u32,
    #[serde(default)]
    pub hazard: Option<StepHazard>,
}

impl RouteStep {
    pub fn new(index: usize, instruction: impl Into<String>, leg_distance_meters: u32) -> Self {
        Self {
            index,
            instruction: instruction.into(),
            leg_distance_meters,
            hazard: None,
        }
    }

    pub fn with_hazard(mut self, kind: HazardKind, message: impl Into<String>) -> Self {
        self.hazard = Some(StepHazard {
            kind,
            message: message.into(),
        });
        self
    }
}

/// Where along the route a hazard applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HazardPosition {
    /// Seconds from now until the traveler reaches it.
    ArrivalOffset(u32),
    /// Index of the step it sits on.
    Step(usize),
}

/// A hazard reported by the live feed. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HazardEvent {
    pub id: u64,
    pub kind: HazardKind,
    pub message: String,
    pub position: HazardPosition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Idle,
    Active,
    Paused,
    Rerouting,
    Completed,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Active => "active",
            SessionStatus::Paused => "paused",
            SessionStatus::Rerouting => "rerouting",
            SessionStatus::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// What a transition did, for observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SessionEvent {
    Started { route: RouteId },
    StepAdvanced { index: usize },
    Paused,
    Resumed,
    AlertIngested { id: u64, kind: HazardKind },
    EmergencyTriggered,
    EmergencyResolved,
    RerouteStarted,
    Rerouted { route: RouteId },
    Completed { index: usize },
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session already {0}")]
    AlreadyActive(SessionStatus),
    #[error("route has no steps")]
    EmptyRoute,
    #[error("step at position {position} has index {found}")]
    NonContiguousSteps { position: usize, found: usize },
    #[error("cannot {action} while {status}")]
    InvalidTransition {
        action: &'static str,
        status: SessionStatus,
    },
}

/// Traveler-scoped emergency flag.
///
/// Clones share state. Setting and clearing are single atomic swaps, so they
/// are safe from any thread at any time.
#[derive(Debug, Clone, Default)]
pub struct EmergencyFlag(Arc<AtomicBool>);

impl EmergencyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if this call raised the flag.
    pub fn trigger(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }

    /// Returns true if this call cleared the flag.
    pub fn resolve(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }

    pub fn is_active(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Alerts kept before the oldest is evicted.
    pub alert_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            alert_capacity: DEFAULT_ALERT_CAPACITY,
        }
    }
}

/// Read-only view handed to observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub route: Option<RouteCandidate>,
    pub current_step_index: usize,
    pub current_step: Option<RouteStep>,
    pub step_count: usize,
    /// Most recent first.
    pub alerts: Vec<HazardEvent>,
    pub emergency_active: bool,
}

#[derive(Debug)]
pub struct NavigationSession {
    config: SessionConfig,
    route: Option<RouteCandidate>,
    steps: Vec<RouteStep>,
    current_step: usize,
    status: SessionStatus,
    alerts: VecDeque<HazardEvent>,
    /// Every hazard id this route has taken in, including evicted ones.
    consumed: HashSet<u64>,
    emergency: EmergencyFlag,
}

impl Default for NavigationSession {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl NavigationSession {
    pub fn new(config: SessionConfig) -> Self {
        Self::with_emergency(config, EmergencyFlag::new())
    }

    /// A session sharing an existing emergency flag.
    pub fn with_emergency(config: SessionConfig, emergency: EmergencyFlag) -> Self {
        Self {
            config,
            route: None,
            steps: Vec::new(),
            current_step: 0,
            status: SessionStatus::Idle,
            alerts: VecDeque::new(),
            consumed: HashSet::new(),
            emergency,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn route(&self) -> Option<&RouteCandidate> {
        self.route.as_ref()
    }

    pub fn steps(&self) -> &[RouteStep] {
        &self.steps
    }

    pub fn current_step_index(&self) -> usize {
        self.current_step
    }

    pub fn current_step(&self) -> Option<&RouteStep> {
        self.steps.get(self.current_step)
    }

    /// Alerts, most recent first.
    pub fn alerts(&self) -> impl Iterator<Item = &HazardEvent> {
        self.alerts.iter()
    }

    pub fn emergency_active(&self) -> bool {
        self.emergency.is_active()
    }

    pub fn emergency_handle(&self) -> EmergencyFlag {
        self.emergency.clone()
    }

    /// Whether the hazard feed should be delivering events.
    pub fn is_live(&self) -> bool {
        matches!(self.status, SessionStatus::Active | SessionStatus::Paused)
    }

    pub fn start(
        &mut self,
        route: RouteCandidate,
        steps: Vec<RouteStep>,
    ) -> Result<SessionEvent, SessionError> {
        if self.status != SessionStatus::Idle {
            return Err(SessionError::AlreadyActive(self.status));
        }
        validate_steps(&steps)?;

        tracing::info!(route = %route.id, steps = steps.len(), "navigation started");
        let route_id = route.id;
        self.route = Some(route);
        self.steps = steps;
        self.current_step = 0;
        self.alerts.clear();
        self.consumed.clear();
        self.status = SessionStatus::Active;
        Ok(SessionEvent::Started { route: route_id })
    }

    pub fn pause(&mut self) -> Result<SessionEvent, SessionError> {
        self.transition("pause", SessionStatus::Active, SessionStatus::Paused)?;
        Ok(SessionEvent::Paused)
    }

    pub fn resume(&mut self) -> Result<SessionEvent, SessionError> {
        self.transition("resume", SessionStatus::Paused, SessionStatus::Active)?;
        Ok(SessionEvent::Resumed)
    }

    /// Moves to the next step, completing the session on the arrival step.
    ///
    /// Does nothing unless active.
    pub fn advance_step(&mut self) -> Option<SessionEvent> {
        if self.status != SessionStatus::Active {
            tracing::debug!(status = %self.status, "ignoring advance");
            return None;
        }

        let last = self.steps.len() - 1;
        if self.current_step < last {
            self.current_step += 1;
        }

        if self.current_step == last {
            tracing::info!(index = self.current_step, "navigation completed");
            self.status = SessionStatus::Completed;
            Some(SessionEvent::Completed {
                index: self.current_step,
            })
        } else {
            tracing::debug!(index = self.current_step, "advanced step");
            Some(SessionEvent::StepAdvanced {
                index: self.current_step,
            })
        }
    }

    /// Advances only if the session is still on `observed_index`.
    ///
    /// Position triggers report the leg they saw the traveler leave; duplicate
    /// or late triggers for the same leg collapse into one advance.
    pub fn advance_from(&mut self, observed_index: usize) -> Option<SessionEvent> {
        if self.current_step != observed_index {
            tracing::debug!(
                observed = observed_index,
                current = self.current_step,
                "coalescing stale advance trigger"
            );
            return None;
        }
        self.advance_step()
    }

    /// Records a hazard, newest first. Events for a session that is not
    /// live, or already taken in on this route, are dropped even after they
    /// have been evicted from the alert list.
    pub fn ingest_hazard(&mut self, event: HazardEvent) -> Option<SessionEvent> {
        if !self.is_live() {
            tracing::debug!(id = event.id, status = %self.status, "dropping hazard for inactive session");
            return None;
        }
        if !self.consumed.insert(event.id) {
            tracing::debug!(id = event.id, "dropping duplicate hazard");
            return None;
        }

        tracing::debug!(id = event.id, kind = ?event.kind, "hazard ingested");
        let ingested = SessionEvent::AlertIngested {
            id: event.id,
            kind: event.kind,
        };
        self.alerts.push_front(event);
        self.alerts.truncate(self.config.alert_capacity.max(1));
        Some(ingested)
    }

    /// Drops the current route's steps and alerts and waits for a replacement.
    pub fn begin_reroute(&mut self) -> Result<SessionEvent, SessionError> {
        if !self.is_live() {
            return Err(SessionError::InvalidTransition {
                action: "reroute",
                status: self.status,
            });
        }

        tracing::info!(from = %self.status, "rerouting");
        self.route = None;
        self.steps.clear();
        self.alerts.clear();
        self.consumed.clear();
        self.current_step = 0;
        self.status = SessionStatus::Rerouting;
        Ok(SessionEvent::RerouteStarted)
    }

    /// Replaces the session body with a fresh one for `route`.
    ///
    /// On error the session stays in `Rerouting`.
    pub fn complete_reroute(
        &mut self,
        route: RouteCandidate,
        steps: Vec<RouteStep>,
    ) -> Result<SessionEvent, SessionError> {
        if self.status != SessionStatus::Rerouting {
            return Err(SessionError::InvalidTransition {
                action: "complete reroute",
                status: self.status,
            });
        }

        let mut next = NavigationSession::with_emergency(self.config.clone(), self.emergency.clone());
        let route_id = route.id;
        next.start(route, steps)?;
        *self = next;
        Ok(SessionEvent::Rerouted { route: route_id })
    }

    /// Raises the emergency flag. Idempotent; never fails.
    pub fn trigger_emergency(&self) -> Option<SessionEvent> {
        if self.emergency.trigger() {
            tracing::warn!(status = %self.status, "emergency triggered");
            Some(SessionEvent::EmergencyTriggered)
        } else {
            None
        }
    }

    pub fn resolve_emergency(&self) -> Option<SessionEvent> {
        if self.emergency.resolve() {
            tracing::info!("emergency resolved");
            Some(SessionEvent::EmergencyResolved)
        } else {
            None
        }
    }

    /// Ends the session from any status and returns its final view.
    pub fn cancel(self) -> SessionSnapshot {
        tracing::info!(status = %self.status, "navigation cancelled");
        self.snapshot()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            route: self.route.clone(),
            current_step_index: self.current_step,
            current_step: self.current_step().cloned(),
            step_count: self.steps.len(),
            alerts: self.alerts.iter().cloned().collect(),
            emergency_active: self.emergency.is_active(),
        }
    }

    fn transition(
        &mut self,
        action: &'static str,
        from: SessionStatus,
        to: SessionStatus,
    ) -> Result<(), SessionError> {
        if self.status != from {
            return Err(SessionError::InvalidTransition {
                action,
                status: self.status,
            });
        }
        tracing::debug!(%from, %to, "{}", action);
        self.status = to;
        Ok(())
    }
}

fn validate_steps(steps: &[RouteStep]) -> Result<(), SessionError> {
    if steps.is_empty() {
        return Err(SessionError::EmptyRoute);
    }
    for (position, step) in steps.iter().enumerate() {
        if step.index != position {
            return Err(SessionError::NonContiguousSteps {
                position,
                found: step.index,
            });
        }
    }
    Ok(())
}
