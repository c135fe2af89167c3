//! saferoute core
//!
//! Plans a trip, ranks route alternatives by safety, speed, and pollution,
//! and drives a turn-by-turn navigation session that takes live hazard
//! alerts, re-routes, and escalates emergencies.

pub mod traits;
pub mod preference;
pub mod ranking;
pub mod session;
pub mod navigator;
pub mod feed;
pub mod http;
pub mod canned;
