//! Route candidate ranking (goal-weighted fitness).

use std::cmp::Reverse;
use std::collections::HashSet;
use std::fmt;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::preference::{OptimizationGoal, TripRequest};
use crate::session::RouteStep;
use crate::traits::MetricsProvider;

/// Fitness values closer than this are treated as equal.
const FITNESS_RESOLUTION: f64 = 1e-9;

/// Three-tier rating shared by safety and pollution.
///
/// The tiers compare the same way for both, but their desirability does
/// not: high safety is good, high pollution is bad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Score {
    Low,
    Medium,
    High,
}

impl Score {
    pub fn level(self) -> u8 {
        match self {
            Score::Low => 0,
            Score::Medium => 1,
            Score::High => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteId(pub u32);

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unranked metrics for one route, as a provider reports them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCandidate {
    pub id: RouteId,
    pub name: String,
    pub eta_seconds: u32,
    pub distance_meters: u32,
    pub safety: Score,
    pub pollution: Score,
    #[serde(default)]
    pub highlights: Vec<String>,
    #[serde(default)]
    pub steps: Vec<RouteStep>,
}

/// A ranked, immutable route proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteCandidate {
    pub id: RouteId,
    pub display_name: String,
    pub eta_seconds: u32,
    pub distance_meters: u32,
    pub safety_score: Score,
    pub pollution_score: Score,
    pub highlights: Vec<String>,
}

/// Relative weight of each dimension in the fitness sum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GoalWeights {
    pub safety: f64,
    pub time: f64,
    pub pollution: f64,
}

#[derive(Debug, Clone)]
pub struct RankOptions {
    pub safety: GoalWeights,
    pub fastest: GoalWeights,
    pub eco: GoalWeights,
}

impl Default for RankOptions {
    fn default() -> Self {
        Self {
            safety: GoalWeights {
                safety: 0.6,
                time: 0.2,
                pollution: 0.2,
            },
            fastest: GoalWeights {
                safety: 0.2,
                time: 0.7,
                pollution: 0.1,
            },
            eco: GoalWeights {
                safety: 0.2,
                time: 0.2,
                pollution: 0.6,
            },
        }
    }
}

impl RankOptions {
    pub fn weights_for(&self, goal: OptimizationGoal) -> GoalWeights {
        match goal {
            OptimizationGoal::Safety => self.safety,
            OptimizationGoal::Fastest => self.fastest,
            OptimizationGoal::Eco => self.eco,
        }
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("route service request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("route service unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("no route found between origin and destination")]
    NoRouteFound,
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// A route picked by the traveler, with its turn-by-turn steps.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedRoute {
    pub candidate: RouteCandidate,
    pub steps: Vec<RouteStep>,
}

#[derive(Debug, Clone)]
struct RankedEntry {
    candidate: RouteCandidate,
    steps: Vec<RouteStep>,
    fitness: f64,
}

/// Candidates for one request, best first. Never empty.
#[derive(Debug, Clone)]
pub struct CandidateSet {
    goal: OptimizationGoal,
    entries: Vec<RankedEntry>,
}

impl CandidateSet {
    pub fn goal(&self) -> OptimizationGoal {
        self.goal
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn candidates(&self) -> impl Iterator<Item = &RouteCandidate> {
        self.entries.iter().map(|entry| &entry.candidate)
    }

    pub fn ids(&self) -> Vec<RouteId> {
        self.candidates().map(|candidate| candidate.id).collect()
    }

    /// The top-ranked candidate. Recommendation is positional, not stored.
    pub fn recommended(&self) -> &RouteCandidate {
        &self.entries[0].candidate
    }

    pub fn is_recommended(&self, id: RouteId) -> bool {
        self.recommended().id == id
    }

    pub fn get(&self, id: RouteId) -> Option<&RouteCandidate> {
        self.entry(id).map(|entry| &entry.candidate)
    }

    pub fn fitness_of(&self, id: RouteId) -> Option<f64> {
        self.entry(id).map(|entry| entry.fitness)
    }

    pub fn steps_for(&self, id: RouteId) -> Option<&[RouteStep]> {
        self.entry(id).map(|entry| entry.steps.as_slice())
    }

    pub fn select(&self, id: RouteId) -> Option<SelectedRoute> {
        self.entry(id).map(|entry| SelectedRoute {
            candidate: entry.candidate.clone(),
            steps: entry.steps.clone(),
        })
    }

    pub fn into_recommended(mut self) -> SelectedRoute {
        let entry = self.entries.swap_remove(0);
        SelectedRoute {
            candidate: entry.candidate,
            steps: entry.steps,
        }
    }

    fn entry(&self, id: RouteId) -> Option<&RankedEntry> {
        self.entries.iter().find(|entry| entry.candidate.id == id)
    }
}

/// Fetches raw metrics for `request` and ranks them for its goal.
pub fn generate<P>(
    request: &TripRequest,
    provider: &P,
    options: &RankOptions,
) -> Result<CandidateSet, GenerationError>
where
    P: MetricsProvider + ?Sized,
{
    let raw = provider.candidates_for(request)?;
    tracing::debug!(
        origin = %request.origin().id,
        destination = %request.destination().id,
        goal = %request.goal(),
        count = raw.len(),
        "ranking route candidates"
    );
    rank(request.goal(), raw, options)
}

/// Ranks raw candidates by descending goal-weighted fitness.
///
/// Ties (within [`FITNESS_RESOLUTION`]) go to the lower ETA, then the lower id.
pub fn rank(
    goal: OptimizationGoal,
    raw: Vec<RawCandidate>,
    options: &RankOptions,
) -> Result<CandidateSet, GenerationError> {
    let raw = dedupe_candidates(raw);
    if raw.is_empty() {
        return Err(GenerationError::NoRouteFound);
    }

    let bounds = Bounds::of(&raw);
    let weights = options.weights_for(goal);

    let mut entries: Vec<RankedEntry> = raw
        .into_par_iter()
        .map(|candidate| {
            let fitness = fitness(&candidate, &bounds, weights);
            into_entry(candidate, fitness)
        })
        .collect();

    entries.sort_by_key(|entry| {
        (
            Reverse(quantize(entry.fitness)),
            entry.candidate.eta_seconds,
            entry.candidate.id,
        )
    });

    Ok(CandidateSet { goal, entries })
}

fn dedupe_candidates(raw: Vec<RawCandidate>) -> Vec<RawCandidate> {
    let mut seen: HashSet<RouteId> = HashSet::new();
    let mut unique = Vec::with_capacity(raw.len());
    for candidate in raw {
        if !seen.insert(candidate.id) {
            tracing::warn!(id = %candidate.id, "dropping duplicate route candidate");
            continue;
        }
        unique.push(candidate);
    }
    unique
}

/// Min/max of each dimension across the candidate set.
#[derive(Debug, Clone, Copy)]
struct Bounds {
    eta: (f64, f64),
    safety: (f64, f64),
    pollution: (f64, f64),
}

impl Bounds {
    fn of(raw: &[RawCandidate]) -> Self {
        Self {
            eta: span(raw.iter().map(|c| f64::from(c.eta_seconds))),
            safety: span(raw.iter().map(|c| f64::from(c.safety.level()))),
            pollution: span(raw.iter().map(|c| f64::from(c.pollution.level()))),
        }
    }
}

fn span(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

/// Min-max normalization into [0, 1]. `invert` makes lower raw values score
/// higher. A dimension with no spread scores 1.0 for everyone.
fn normalize(value: f64, (min, max): (f64, f64), invert: bool) -> f64 {
    let spread = max - min;
    if spread <= f64::EPSILON {
        return 1.0;
    }
    if invert {
        (max - value) / spread
    } else {
        (value - min) / spread
    }
}

fn fitness(candidate: &RawCandidate, bounds: &Bounds, weights: GoalWeights) -> f64 {
    let time = normalize(f64::from(candidate.eta_seconds), bounds.eta, true);
    let safety = normalize(f64::from(candidate.safety.level()), bounds.safety, false);
    let pollution = normalize(f64::from(candidate.pollution.level()), bounds.pollution, true);

    weights.safety * safety + weights.time * time + weights.pollution * pollution
}

fn quantize(fitness: f64) -> i64 {
    (fitness / FITNESS_RESOLUTION).round() as i64
}

fn into_entry(raw: RawCandidate, fitness: f64) -> RankedEntry {
    RankedEntry {
        candidate: RouteCandidate {
            id: raw.id,
            display_name: raw.name,
            eta_seconds: raw.eta_seconds,
            distance_meters: raw.distance_meters,
            safety_score: raw.safety,
            pollution_score: raw.pollution,
            highlights: raw.highlights,
        },
        steps: raw.steps,
        fitness,
    }
}
