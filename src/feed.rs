//! Hazard feed adapters.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use serde::Deserialize;
use thiserror::Error;

use crate::http::HttpServiceConfig;
use crate::ranking::RouteId;
use crate::session::HazardEvent;
use crate::traits::HazardFeed;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("hazard feed request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("hazard feed disconnected")]
    Disconnected,
}

/// Producer side of a [`ChannelFeed`]. Cheap to clone.
#[derive(Debug, Clone)]
pub struct HazardSender(Sender<HazardEvent>);

impl HazardSender {
    /// Returns false once the feed has been dropped or unsubscribed.
    pub fn send(&self, event: HazardEvent) -> bool {
        self.0.send(event).is_ok()
    }
}

/// In-process feed backed by a channel.
#[derive(Debug)]
pub struct ChannelFeed {
    receiver: Option<Receiver<HazardEvent>>,
}

impl ChannelFeed {
    pub fn new() -> (HazardSender, ChannelFeed) {
        let (tx, rx) = mpsc::channel();
        (HazardSender(tx), ChannelFeed { receiver: Some(rx) })
    }
}

impl HazardFeed for ChannelFeed {
    fn poll(&mut self) -> Result<Vec<HazardEvent>, FeedError> {
        let receiver = self.receiver.as_ref().ok_or(FeedError::Disconnected)?;
        let mut events = Vec::new();
        loop {
            match receiver.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) => return Ok(events),
                Err(TryRecvError::Disconnected) if !events.is_empty() => return Ok(events),
                Err(TryRecvError::Disconnected) => return Err(FeedError::Disconnected),
            }
        }
    }

    fn unsubscribe(&mut self) {
        self.receiver = None;
    }
}

#[derive(Debug, Deserialize)]
struct HazardResponse {
    #[serde(default)]
    events: Vec<HazardEvent>,
}

/// Polls `GET {base}/hazards?route=<id>&after=<last id>`.
#[derive(Debug)]
pub struct HttpHazardFeed {
    config: HttpServiceConfig,
    client: reqwest::blocking::Client,
    route: RouteId,
    last_seen: Option<u64>,
}

impl HttpHazardFeed {
    pub fn new(config: HttpServiceConfig, route: RouteId) -> Result<Self, reqwest::Error> {
        let client = config.build_client()?;
        Ok(Self {
            config,
            client,
            route,
            last_seen: None,
        })
    }
}

impl HazardFeed for HttpHazardFeed {
    fn poll(&mut self) -> Result<Vec<HazardEvent>, FeedError> {
        let url = format!("{}/hazards", self.config.base_url.trim_end_matches('/'));
        let mut query = vec![("route", self.route.to_string())];
        if let Some(last) = self.last_seen {
            query.push(("after", last.to_string()));
        }

        let body = self
            .client
            .get(url)
            .query(&query)
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json::<HazardResponse>())?;

        if let Some(max) = body.events.iter().map(|event| event.id).max() {
            self.last_seen = Some(self.last_seen.map_or(max, |last| last.max(max)));
        }
        Ok(body.events)
    }
}
