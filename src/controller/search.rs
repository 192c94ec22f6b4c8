use std::sync::Arc;
use std::time::Duration;
use futures::future::join_all;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use crate::config::Timings;
use crate::controller::status::{StatusRotation, ENRICHING_PHRASES, FINAL_PHRASE, SEARCHING_PHRASES};
use crate::error::GatewayError;
use crate::helpers::notifier::Notifier;
use crate::models::restaurant::{ImageStatus, Restaurant};
use crate::models::search_request::SearchRequest;
use crate::models::summary::AIGeneratedSummary;
use crate::repositories::gateway::BackendGateway;
use crate::repositories::image_probe::ImageProbe;

pub const RECOMMENDATIONS_FAILED: &str = "Failed to get recommendations. Please try again.";
/// How many results the backend returns per page of a session's ranking.
pub const PAGE_SIZE: u32 = 3;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("There is no previous search to repeat")]
    NothingToReroll,

    #[error("A search is already in progress")]
    InProgress,

    #[error("Recommendation fetch failed: {0}")]
    Recommendations(#[source] GatewayError),
}

/// What the results page renders.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearchState {
    pub loading: bool,
    pub status: Option<String>,
    pub restaurants: Vec<Restaurant>,
    pub last_request: Option<SearchRequest>,
}

/// Turns a search request into a fully hydrated result list.
///
/// Cloning is cheap and every clone drives the same state.
#[derive(Clone)]
pub struct SearchOrchestrator {
    gateway: Arc<dyn BackendGateway>,
    images: Arc<dyn ImageProbe>,
    notifier: Arc<dyn Notifier>,
    state: Arc<watch::Sender<SearchState>>,
    settle_delay: Duration,
    status_interval: Duration,
}

/// Clears the loading flag however the search ends, including when its future is dropped.
struct LoadingGuard {
    state: Arc<watch::Sender<SearchState>>,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.state.send_if_modified(|state| {
            if !state.loading {
                return false;
            }
            state.loading = false;
            state.status = None;
            true
        });
    }
}

impl SearchOrchestrator {
    pub fn new(
        gateway: Arc<dyn BackendGateway>,
        images: Arc<dyn ImageProbe>,
        notifier: Arc<dyn Notifier>,
        timings: &Timings,
    ) -> Self {
        let (state, _) = watch::channel(SearchState::default());
        Self {
            gateway,
            images,
            notifier,
            state: Arc::new(state),
            settle_delay: timings.settle_delay,
            status_interval: timings.status_interval,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> SearchState {
        self.state.borrow().clone()
    }

    pub fn last_request(&self) -> Option<SearchRequest> {
        self.state.borrow().last_request.clone()
    }

    pub fn restaurant(&self, restaurant_id: &str) -> Option<Restaurant> {
        self.state
            .borrow()
            .restaurants
            .iter()
            .find(|r| r.id == restaurant_id)
            .cloned()
    }

    /// Stores a summary on a displayed restaurant unless it already has one.
    pub fn attach_summary(&self, summary: AIGeneratedSummary) -> bool {
        let mut attached = false;
        self.state.send_if_modified(|state| {
            if let Some(restaurant) = state
                .restaurants
                .iter_mut()
                .find(|r| r.id == summary.restaurant_id)
            {
                attached = restaurant.attach_summary(summary.clone());
            }
            attached
        });
        attached
    }

    fn set_status(&self, status: Option<&str>) {
        self.state.send_modify(|state| state.status = status.map(str::to_string));
    }

    fn rotate(&self, phrases: &'static [&'static str]) -> StatusRotation {
        let state = self.state.clone();
        StatusRotation::start(phrases, self.status_interval, move |phrase| {
            state.send_modify(|s| s.status = Some(phrase.to_string()));
        })
    }

    /// Runs one search from request to revealed results.
    pub async fn search(&self, request: SearchRequest) -> Result<usize, SearchError> {
        let mut started = false;
        self.state.send_if_modified(|state| {
            if state.loading {
                return false;
            }
            state.loading = true;
            state.status = None;
            state.restaurants.clear();
            state.last_request = Some(request.clone());
            started = true;
            true
        });
        if !started {
            debug!("Ignoring search for '{}', another one is running", request.address);
            return Err(SearchError::InProgress);
        }
        let _loading = LoadingGuard { state: self.state.clone() };

        info!(
            "Searching near '{}' ({:?})",
            request.address,
            request.coordinates()
        );
        let rotation = self.rotate(SEARCHING_PHRASES);
        let fetched = self.gateway.recommendations(&request).await;
        drop(rotation);

        let mut restaurants = match fetched {
            Ok(restaurants) => restaurants,
            Err(e) => {
                warn!("Something went wrong fetching recommendations due to: {}", e);
                let message = e.detail().unwrap_or(RECOMMENDATIONS_FAILED).to_string();
                self.state.send_modify(|state| {
                    state.loading = false;
                    state.status = None;
                    state.restaurants.clear();
                });
                self.notifier.alert(&message);
                return Err(SearchError::Recommendations(e));
            }
        };

        info!("Received {} recommendations, enriching", restaurants.len());
        let rotation = self.rotate(ENRICHING_PHRASES);
        self.enrich(&mut restaurants, &request.summary_hints()).await;
        drop(rotation);
        self.set_status(Some(FINAL_PHRASE));

        tokio::time::sleep(self.settle_delay).await;

        let count = restaurants.len();
        self.state.send_modify(|state| {
            state.restaurants = restaurants;
            state.loading = false;
            state.status = None;
        });
        Ok(count)
    }

    /// Repeats the most recent search with its stored request.
    ///
    /// Within a backend session the next page of the cached ranking is requested;
    /// the backend wraps the offset around.
    pub async fn reroll(&self) -> Result<usize, SearchError> {
        let mut request = self.last_request().ok_or(SearchError::NothingToReroll)?;
        if request.session_id.is_some() {
            request.offset = Some(request.offset.unwrap_or(0) + PAGE_SIZE);
        }
        self.search(request).await
    }

    /// One summary fetch and one image preload per restaurant, all concurrent.
    /// Individual failures degrade that restaurant only; this always settles.
    async fn enrich(&self, restaurants: &mut [Restaurant], hints: &[String]) {
        let summary_jobs: Vec<_> = restaurants
            .iter()
            .map(|r| (r.id.clone(), r.ai_summary.is_some()))
            .collect();
        let image_jobs: Vec<_> = restaurants
            .iter()
            .map(|r| (r.id.clone(), r.photo_url.clone()))
            .collect();

        let summaries = join_all(summary_jobs.into_iter().map(|(id, cached)| async move {
            if cached {
                return None;
            }
            match self.gateway.summary(&id, hints).await {
                Ok(summary) => Some(summary),
                Err(e) => {
                    warn!("Something went wrong fetching summary for {} due to: {}", id, e);
                    None
                }
            }
        }));
        let images = join_all(image_jobs.into_iter().map(|(id, photo_url)| async move {
            let url = match photo_url {
                Some(url) => url,
                None => return ImageStatus::Absent,
            };
            match self.images.preload(&url).await {
                Ok(()) => ImageStatus::Loaded,
                Err(e) => {
                    warn!("Something went wrong preloading the photo of {} due to: {}", id, e);
                    ImageStatus::Unavailable
                }
            }
        }));

        let (summaries, images) = futures::join!(summaries, images);
        for ((restaurant, summary), image) in restaurants.iter_mut().zip(summaries).zip(images) {
            if let Some(summary) = summary {
                restaurant.attach_summary(summary);
            }
            restaurant.image = image;
        }
    }
}
