//! Thread-safe owner of one traveler's navigation session.
//!
//! Transitions run under a short lock and never wait on I/O. The emergency
//! flag lives outside that lock, re-route releases it while fetching new
//! candidates, and the hazard feed is polled without holding it.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use thiserror::Error;

use crate::preference::{TravelerSettings, TripRequest};
use crate::ranking::{self, GenerationError, RankOptions, RouteCandidate, SelectedRoute};
use crate::session::{
    EmergencyFlag, HazardEvent, NavigationSession, SessionConfig, SessionError, SessionEvent,
    SessionSnapshot, SessionStatus,
};
use crate::traits::{HazardFeed, MetricsProvider, SessionObserver};

#[derive(Debug, Error)]
pub enum NavigatorError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error("no navigation session")]
    NoSession,
}

struct Slot {
    session: Option<NavigationSession>,
    /// Bumped whenever the session gets a new route body or is replaced.
    generation: u64,
}

/// Transitions waiting to reach observers, in the order they happened.
#[derive(Default)]
struct Outbox {
    pending: VecDeque<(SessionEvent, SessionSnapshot)>,
    dispatching: bool,
}

pub struct Navigator {
    slot: Mutex<Slot>,
    emergency: EmergencyFlag,
    feed: Mutex<Option<Box<dyn HazardFeed + Send>>>,
    observers: RwLock<Vec<Arc<dyn SessionObserver>>>,
    outbox: Mutex<Outbox>,
    config: SessionConfig,
    settings: TravelerSettings,
    rank_options: RankOptions,
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new(SessionConfig::default(), TravelerSettings::default())
    }
}

impl Navigator {
    pub fn new(config: SessionConfig, settings: TravelerSettings) -> Self {
        let emergency = EmergencyFlag::new();
        let session = NavigationSession::with_emergency(config.clone(), emergency.clone());
        Self {
            slot: Mutex::new(Slot {
                session: Some(session),
                generation: 0,
            }),
            emergency,
            feed: Mutex::new(None),
            observers: RwLock::new(Vec::new()),
            outbox: Mutex::new(Outbox::default()),
            config,
            settings,
            rank_options: RankOptions::default(),
        }
    }

    pub fn with_rank_options(mut self, options: RankOptions) -> Self {
        self.rank_options = options;
        self
    }

    pub fn settings(&self) -> &TravelerSettings {
        &self.settings
    }

    /// Observers receive every transition in the order it was applied.
    ///
    /// A transition made while another thread is delivering is handed to that
    /// thread, so the call that caused it may return before observers see it.
    pub fn subscribe(&self, observer: Arc<dyn SessionObserver>) {
        self.observers.write().push(observer);
    }

    /// `None` once the session has been cancelled.
    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        self.slot
            .lock()
            .session
            .as_ref()
            .map(NavigationSession::snapshot)
    }

    pub fn emergency_active(&self) -> bool {
        self.emergency.is_active()
    }

    /// Installs a fresh idle session. Allowed when there is no session or the
    /// current one is idle or completed.
    pub fn reset(&self) -> Result<(), NavigatorError> {
        let mut slot = self.slot.lock();
        if let Some(current) = slot.session.as_ref() {
            let status = current.status();
            if !matches!(status, SessionStatus::Idle | SessionStatus::Completed) {
                return Err(SessionError::InvalidTransition {
                    action: "reset",
                    status,
                }
                .into());
            }
        }
        slot.session = Some(NavigationSession::with_emergency(
            self.config.clone(),
            self.emergency.clone(),
        ));
        slot.generation += 1;
        tracing::debug!(generation = slot.generation, "navigation session reset");
        Ok(())
    }

    pub fn start(&self, selected: SelectedRoute) -> Result<(), NavigatorError> {
        let SelectedRoute { candidate, steps } = selected;
        self.apply(|session| session.start(candidate, steps))
    }

    pub fn pause(&self) -> Result<(), NavigatorError> {
        self.apply(NavigationSession::pause)
    }

    pub fn resume(&self) -> Result<(), NavigatorError> {
        self.apply(NavigationSession::resume)
    }

    /// Returns true if the step index moved or the trip completed.
    pub fn advance_step(&self) -> bool {
        self.transition(None, NavigationSession::advance_step)
            .unwrap_or(false)
    }

    /// Compare-and-advance for position triggers; see
    /// [`NavigationSession::advance_from`].
    pub fn advance_from(&self, observed_index: usize) -> bool {
        self.transition(None, |session| session.advance_from(observed_index))
            .unwrap_or(false)
    }

    pub fn ingest_hazard(&self, event: HazardEvent) -> bool {
        self.transition(None, |session| session.ingest_hazard(event))
            .unwrap_or(false)
    }

    /// Subscribes `feed` for the rest of the active trip, replacing any
    /// previous one. Returns false, and unsubscribes `feed` at once, when
    /// the session is not active or paused.
    pub fn attach_feed(&self, mut feed: Box<dyn HazardFeed + Send>) -> bool {
        let previous = {
            let slot = self.slot.lock();
            if !slot.session.as_ref().is_some_and(NavigationSession::is_live) {
                drop(slot);
                tracing::debug!("no live session, refusing hazard feed");
                feed.unsubscribe();
                return false;
            }
            self.feed.lock().replace(feed)
        };
        if let Some(mut previous) = previous {
            previous.unsubscribe();
        }
        true
    }

    /// Drains the attached feed into the session and returns how many alerts
    /// were recorded.
    ///
    /// Feed failures are logged and skipped; the session keeps its current
    /// alerts. Events polled for a route that was replaced while the poll
    /// was in flight are dropped along with the feed.
    pub fn pump_hazards(&self) -> usize {
        if !self.settings.real_time_alerts {
            return 0;
        }
        let Some(generation) = self.live_generation() else {
            return 0;
        };
        let Some(mut feed) = self.feed.lock().take() else {
            return 0;
        };

        let mut ingested = 0;
        match feed.poll() {
            Ok(events) => {
                for event in events {
                    let id = event.id;
                    let recorded =
                        self.transition(Some(generation), |session| session.ingest_hazard(event));
                    match recorded {
                        Some(true) => ingested += 1,
                        Some(false) => {}
                        None => {
                            tracing::debug!(id, "route changed during poll, dropping hazards");
                            break;
                        }
                    }
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "hazard feed poll failed, keeping stale alerts");
            }
        }

        let slot = self.slot.lock();
        let current = slot.generation == generation
            && slot.session.as_ref().is_some_and(NavigationSession::is_live);
        let mut feed_slot = self.feed.lock();
        if current && feed_slot.is_none() {
            *feed_slot = Some(feed);
        } else {
            drop(feed_slot);
            drop(slot);
            feed.unsubscribe();
        }
        ingested
    }

    /// Marks the session as rerouting and drops the old route's steps,
    /// alerts, and feed.
    pub fn begin_reroute(&self) -> Result<(), NavigatorError> {
        self.apply(NavigationSession::begin_reroute)
    }

    pub fn complete_reroute(&self, selected: SelectedRoute) -> Result<(), NavigatorError> {
        let SelectedRoute { candidate, steps } = selected;
        self.apply(|session| session.complete_reroute(candidate, steps))
    }

    /// Re-plans with `request` and switches to the recommended candidate.
    ///
    /// The session lock is not held while `provider` works. If generation
    /// fails the session stays rerouting; calling this again retries, and
    /// [`Navigator::cancel`] gives up.
    pub fn reroute<P>(
        &self,
        provider: &P,
        request: &TripRequest,
    ) -> Result<RouteCandidate, NavigatorError>
    where
        P: MetricsProvider + ?Sized,
    {
        if !self.is_rerouting() {
            self.begin_reroute()?;
        }
        let selected = match ranking::generate(request, provider, &self.rank_options) {
            Ok(candidates) => candidates.into_recommended(),
            Err(err) => {
                tracing::warn!(error = %err, "reroute candidate fetch failed");
                return Err(err.into());
            }
        };
        let candidate = selected.candidate.clone();
        self.complete_reroute(selected)?;
        Ok(candidate)
    }

    /// Raises the emergency flag. Takes effect before observers are told and
    /// does not depend on the session's state.
    pub fn trigger_emergency(&self) -> bool {
        let raised = self.emergency.trigger();
        if raised {
            tracing::warn!("emergency triggered");
            self.announce(SessionEvent::EmergencyTriggered);
        }
        raised
    }

    pub fn resolve_emergency(&self) -> bool {
        let cleared = self.emergency.resolve();
        if cleared {
            tracing::info!("emergency resolved");
            self.announce(SessionEvent::EmergencyResolved);
        }
        cleared
    }

    /// Destroys the session. Later operations are no-ops until [`reset`].
    ///
    /// [`reset`]: Navigator::reset
    pub fn cancel(&self) -> Option<SessionSnapshot> {
        let snapshot = {
            let mut slot = self.slot.lock();
            let session = slot.session.take()?;
            slot.generation += 1;
            let snapshot = session.cancel();
            self.enqueue(SessionEvent::Cancelled, snapshot.clone());
            snapshot
        };
        self.release_feed();
        self.dispatch();
        Some(snapshot)
    }

    fn live_generation(&self) -> Option<u64> {
        let slot = self.slot.lock();
        slot.session
            .as_ref()
            .is_some_and(NavigationSession::is_live)
            .then_some(slot.generation)
    }

    fn is_rerouting(&self) -> bool {
        self.slot
            .lock()
            .session
            .as_ref()
            .is_some_and(|session| session.status() == SessionStatus::Rerouting)
    }

    fn apply(
        &self,
        op: impl FnOnce(&mut NavigationSession) -> Result<SessionEvent, SessionError>,
    ) -> Result<(), NavigatorError> {
        let mut failure = None;
        let ran = self.transition(None, |session| match op(session) {
            Ok(event) => Some(event),
            Err(err) => {
                failure = Some(err);
                None
            }
        });
        match (ran, failure) {
            (None, _) => Err(NavigatorError::NoSession),
            (Some(_), Some(err)) => Err(err.into()),
            (Some(_), None) => Ok(()),
        }
    }

    /// Runs `op` under the session lock and queues its event before the lock
    /// is released, so observers see transitions in the order they applied.
    ///
    /// `None` if there is no session, or it has moved past `generation`.
    fn transition(
        &self,
        generation: Option<u64>,
        op: impl FnOnce(&mut NavigationSession) -> Option<SessionEvent>,
    ) -> Option<bool> {
        let releases_feed = {
            let mut guard = self.slot.lock();
            let slot = &mut *guard;
            if generation.is_some_and(|expected| expected != slot.generation) {
                return None;
            }
            let session = slot.session.as_mut()?;
            let Some(event) = op(session) else {
                return Some(false);
            };
            if matches!(
                event,
                SessionEvent::Started { .. }
                    | SessionEvent::RerouteStarted
                    | SessionEvent::Rerouted { .. }
            ) {
                slot.generation += 1;
            }
            let ends_feed = matches!(
                event,
                SessionEvent::Completed { .. } | SessionEvent::RerouteStarted
            );
            self.enqueue(event, session.snapshot());
            ends_feed
        };
        if releases_feed {
            self.release_feed();
        }
        self.dispatch();
        Some(true)
    }

    fn announce(&self, event: SessionEvent) {
        {
            let slot = self.slot.lock();
            let Some(session) = slot.session.as_ref() else {
                return;
            };
            self.enqueue(event, session.snapshot());
        }
        self.dispatch();
    }

    fn enqueue(&self, event: SessionEvent, snapshot: SessionSnapshot) {
        self.outbox.lock().pending.push_back((event, snapshot));
    }

    /// Delivers queued transitions unless another thread already is.
    fn dispatch(&self) {
        {
            let mut outbox = self.outbox.lock();
            if outbox.dispatching {
                return;
            }
            outbox.dispatching = true;
        }
        loop {
            let next = {
                let mut outbox = self.outbox.lock();
                let next = outbox.pending.pop_front();
                if next.is_none() {
                    outbox.dispatching = false;
                }
                next
            };
            let Some((event, snapshot)) = next else {
                break;
            };
            let observers = self.observers.read().clone();
            for observer in observers {
                observer.on_transition(&event, &snapshot);
            }
        }
    }

    fn release_feed(&self) {
        if let Some(mut feed) = self.feed.lock().take() {
            tracing::debug!("unsubscribing hazard feed");
            feed.unsubscribe();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canned::CannedRoutes;
    use crate::preference::{create_request, LocationRef, OptimizationGoal};

    fn selected() -> SelectedRoute {
        let request = create_request(
            LocationRef::new("a", "A"),
            LocationRef::new("b", "B"),
            OptimizationGoal::Safety,
        )
        .unwrap();
        ranking::generate(&request, &CannedRoutes, &RankOptions::default())
            .unwrap()
            .into_recommended()
    }

    #[test]
    fn test_cancel_then_reset() {
        let navigator = Navigator::default();
        navigator.start(selected()).unwrap();
        assert!(navigator.reset().is_err());

        let last = navigator.cancel().unwrap();
        assert_eq!(last.status, SessionStatus::Active);
        assert!(navigator.snapshot().is_none());
        assert!(!navigator.advance_step());
        assert!(matches!(navigator.pause(), Err(NavigatorError::NoSession)));

        navigator.reset().unwrap();
        assert_eq!(navigator.snapshot().unwrap().status, SessionStatus::Idle);
    }

    #[test]
    fn test_reset_allowed_when_idle() {
        let navigator = Navigator::default();
        navigator.reset().unwrap();
        assert_eq!(navigator.snapshot().unwrap().status, SessionStatus::Idle);

        navigator.start(selected()).unwrap();
        navigator.pause().unwrap();
        assert!(matches!(
            navigator.reset(),
            Err(NavigatorError::Session(SessionError::InvalidTransition {
                action: "reset",
                status: SessionStatus::Paused,
            }))
        ));
    }

    #[test]
    fn test_emergency_survives_cancel() {
        let navigator = Navigator::default();
        navigator.cancel();
        assert!(navigator.trigger_emergency());
        assert!(navigator.emergency_active());
    }
}
