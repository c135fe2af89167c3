//! Trip requests and the rules for when one is well-formed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ranking::Score;
use crate::traits::LocationResolver;

/// A place as the traveler named it.
///
/// `id` is the resolved identity; `label` is what gets displayed. Two refs
/// denote the same place when their ids match, whatever their labels say.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocationRef {
    pub id: String,
    pub label: String,
}

impl LocationRef {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.id.trim().is_empty() || self.label.trim().is_empty()
    }

    pub fn same_place(&self, other: &LocationRef) -> bool {
        self.id == other.id
    }
}

/// What the traveler wants the route optimized for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationGoal {
    #[default]
    Safety,
    Fastest,
    Eco,
}

impl fmt::Display for OptimizationGoal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OptimizationGoal::Safety => "safety",
            OptimizationGoal::Fastest => "fastest",
            OptimizationGoal::Eco => "eco",
        };
        f.write_str(name)
    }
}

impl FromStr for OptimizationGoal {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "safety" => Ok(OptimizationGoal::Safety),
            "fastest" => Ok(OptimizationGoal::Fastest),
            "eco" => Ok(OptimizationGoal::Eco),
            _ => Err(ValidationError::UnknownGoal(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Origin,
    Destination,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Origin => f.write_str("origin"),
            Field::Destination => f.write_str("destination"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    EmptyField(Field),
    #[error("origin and destination are the same place")]
    SameLocation,
    #[error("unknown optimization goal: {0:?}")]
    UnknownGoal(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("no place matches {0:?}")]
    NotFound(String),
    #[error("location lookup failed: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Location(#[from] LocationError),
}

/// An immutable, validated trip request.
///
/// Fields are private so the only way to get one is through
/// [`create_request`] or [`resolve_request`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TripRequest {
    origin: LocationRef,
    destination: LocationRef,
    goal: OptimizationGoal,
    avoid_crime_areas: bool,
}

impl TripRequest {
    pub fn origin(&self) -> &LocationRef {
        &self.origin
    }

    pub fn destination(&self) -> &LocationRef {
        &self.destination
    }

    pub fn goal(&self) -> OptimizationGoal {
        self.goal
    }

    /// Asks providers to route around known crime areas. Ranking does not
    /// read it; providers that support the filter apply it before scoring.
    pub fn avoid_crime_areas(&self) -> bool {
        self.avoid_crime_areas
    }

    pub fn with_crime_avoidance(mut self, avoid: bool) -> TripRequest {
        self.avoid_crime_areas = avoid;
        self
    }

    /// A new request for the same endpoints with a different goal.
    pub fn with_goal(&self, goal: OptimizationGoal) -> TripRequest {
        TripRequest {
            origin: self.origin.clone(),
            destination: self.destination.clone(),
            goal,
            avoid_crime_areas: self.avoid_crime_areas,
        }
    }
}

pub fn create_request(
    origin: LocationRef,
    destination: LocationRef,
    goal: OptimizationGoal,
) -> Result<TripRequest, ValidationError> {
    if origin.is_blank() {
        return Err(ValidationError::EmptyField(Field::Origin));
    }
    if destination.is_blank() {
        return Err(ValidationError::EmptyField(Field::Destination));
    }
    if origin.same_place(&destination) {
        return Err(ValidationError::SameLocation);
    }

    Ok(TripRequest {
        origin,
        destination,
        goal,
        avoid_crime_areas: false,
    })
}

/// Builds a request from raw traveler input, geocoding both ends.
///
/// Blank input is rejected before the resolver is consulted.
pub fn resolve_request<L>(
    resolver: &L,
    origin_text: &str,
    destination_text: &str,
    goal: OptimizationGoal,
) -> Result<TripRequest, RequestError>
where
    L: LocationResolver + ?Sized,
{
    if origin_text.trim().is_empty() {
        return Err(ValidationError::EmptyField(Field::Origin).into());
    }
    if destination_text.trim().is_empty() {
        return Err(ValidationError::EmptyField(Field::Destination).into());
    }

    let origin = resolver.resolve(origin_text.trim())?;
    let destination = resolver.resolve(destination_text.trim())?;
    Ok(create_request(origin, destination, goal)?)
}

/// A route the traveler bookmarked earlier. Storage lives elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedRoute {
    pub id: u32,
    pub name: String,
    pub from: LocationRef,
    pub to: LocationRef,
    pub last_used: String,
    pub safety: Score,
}

impl SavedRoute {
    /// Reusing a saved route always plans for safety.
    pub fn to_request(&self) -> Result<TripRequest, ValidationError> {
        create_request(self.from.clone(), self.to.clone(), OptimizationGoal::Safety)
    }
}

/// Per-traveler toggles from the settings screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TravelerSettings {
    /// Poll the live hazard feed while navigating.
    pub real_time_alerts: bool,
    pub safety_first: bool,
    pub avoid_crime_areas: bool,
    pub eco_mode: bool,
}

impl Default for TravelerSettings {
    fn default() -> Self {
        Self {
            real_time_alerts: true,
            safety_first: true,
            avoid_crime_areas: true,
            eco_mode: false,
        }
    }
}

impl TravelerSettings {
    pub fn preferred_goal(&self) -> OptimizationGoal {
        if self.eco_mode {
            OptimizationGoal::Eco
        } else if self.safety_first {
            OptimizationGoal::Safety
        } else {
            OptimizationGoal::Fastest
        }
    }

    /// A request for a fresh trip planned the way this traveler prefers.
    pub fn request(
        &self,
        origin: LocationRef,
        destination: LocationRef,
    ) -> Result<TripRequest, ValidationError> {
        create_request(origin, destination, self.preferred_goal())
            .map(|request| request.with_crime_avoidance(self.avoid_crime_areas))
    }
}
