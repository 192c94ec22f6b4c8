//! In-memory collaborators for controller tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;
use async_trait::async_trait;
use crate::error::GatewayError;
use crate::helpers::notifier::Notifier;
use crate::models::place::{Coordinates, PlaceDetails, Prediction};
use crate::models::preferences::UserPreferences;
use crate::models::restaurant::Restaurant;
use crate::models::search_request::SearchRequest;
use crate::models::summary::AIGeneratedSummary;
use crate::models::user_choice::UserChoice;
use crate::repositories::gateway::BackendGateway;
use crate::repositories::image_probe::ImageProbe;

fn unavailable() -> GatewayError {
    GatewayError::Status { status: 503, detail: None }
}

/// Anything not scripted fails with a 503.
#[derive(Default)]
pub struct MockGateway {
    recommendations: Mutex<Option<Result<Vec<Restaurant>, GatewayError>>>,
    summaries: Mutex<HashMap<String, AIGeneratedSummary>>,
    predictions: Mutex<HashMap<String, Vec<Prediction>>>,
    places: Mutex<HashMap<String, PlaceDetails>>,
    geocodes: Mutex<HashMap<String, Coordinates>>,
    latency: Mutex<Duration>,
    calls: Mutex<Vec<String>>,
    requests: Mutex<Vec<SearchRequest>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_recommendations(self, restaurants: Vec<Restaurant>) -> Self {
        *self.recommendations.lock().unwrap() = Some(Ok(restaurants));
        self
    }

    pub fn with_recommendation_error(self, detail: Option<&str>) -> Self {
        *self.recommendations.lock().unwrap() = Some(Err(GatewayError::Status {
            status: 400,
            detail: detail.map(str::to_string),
        }));
        self
    }

    pub fn with_summary(self, restaurant_id: &str, text: &str) -> Self {
        self.summaries.lock().unwrap().insert(restaurant_id.to_string(), summary(restaurant_id, text));
        self
    }

    pub fn with_predictions(self, query: &str, predictions: Vec<Prediction>) -> Self {
        self.predictions.lock().unwrap().insert(query.to_string(), predictions);
        self
    }

    pub fn with_place(self, prediction_id: &str, details: PlaceDetails) -> Self {
        self.places.lock().unwrap().insert(prediction_id.to_string(), details);
        self
    }

    pub fn with_geocode(self, address: &str, coordinates: Coordinates) -> Self {
        self.geocodes.lock().unwrap().insert(address.to_string(), coordinates);
        self
    }

    /// Every call sleeps this long before answering.
    pub fn with_latency(self, latency: Duration) -> Self {
        *self.latency.lock().unwrap() = latency;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, operation: &str) -> Vec<String> {
        let prefix = format!("{}:", operation);
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(&prefix))
            .collect()
    }

    pub fn requests(&self) -> Vec<SearchRequest> {
        self.requests.lock().unwrap().clone()
    }

    async fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

pub fn summary(restaurant_id: &str, text: &str) -> AIGeneratedSummary {
    AIGeneratedSummary {
        restaurant_id: restaurant_id.to_string(),
        summary: text.to_string(),
        highlights: vec!["Crispy crust".to_string()],
        recommendations: vec!["Margherita".to_string()],
    }
}

#[async_trait]
impl BackendGateway for MockGateway {
    async fn recommendations(&self, request: &SearchRequest) -> Result<Vec<Restaurant>, GatewayError> {
        self.requests.lock().unwrap().push(request.clone());
        self.record(format!("recommendations:{}", request.address)).await;
        match self.recommendations.lock().unwrap().as_ref() {
            Some(Ok(restaurants)) => Ok(restaurants.clone()),
            Some(Err(GatewayError::Status { status, detail })) => Err(GatewayError::Status {
                status: *status,
                detail: detail.clone(),
            }),
            _ => Err(unavailable()),
        }
    }

    async fn search_restaurants(&self, request: &SearchRequest) -> Result<Vec<Restaurant>, GatewayError> {
        self.record(format!("search_restaurants:{}", request.address)).await;
        match self.recommendations.lock().unwrap().as_ref() {
            Some(Ok(restaurants)) => Ok(restaurants.clone()),
            _ => Err(unavailable()),
        }
    }

    async fn restaurant(&self, restaurant_id: &str) -> Result<Restaurant, GatewayError> {
        self.record(format!("restaurant:{}", restaurant_id)).await;
        match self.recommendations.lock().unwrap().as_ref() {
            Some(Ok(restaurants)) => restaurants
                .iter()
                .find(|r| r.id == restaurant_id)
                .cloned()
                .ok_or(GatewayError::Status { status: 404, detail: Some("Restaurant not found".to_string()) }),
            _ => Err(unavailable()),
        }
    }

    async fn summary(
        &self,
        restaurant_id: &str,
        preferences: &[String],
    ) -> Result<AIGeneratedSummary, GatewayError> {
        self.record(format!("summary:{}:{}", restaurant_id, preferences.join(","))).await;
        self.summaries
            .lock()
            .unwrap()
            .get(restaurant_id)
            .cloned()
            .ok_or_else(unavailable)
    }

    async fn geocode(&self, address: &str) -> Result<Coordinates, GatewayError> {
        self.record(format!("geocode:{}", address)).await;
        self.geocodes.lock().unwrap().get(address).copied().ok_or_else(unavailable)
    }

    async fn autocomplete(
        &self,
        query: &str,
        session_token: &str,
    ) -> Result<Vec<Prediction>, GatewayError> {
        self.record(format!("autocomplete:{}:{}", query, session_token)).await;
        self.predictions.lock().unwrap().get(query).cloned().ok_or_else(unavailable)
    }

    async fn place_details(
        &self,
        prediction_id: &str,
        session_token: &str,
    ) -> Result<PlaceDetails, GatewayError> {
        self.record(format!("place_details:{}:{}", prediction_id, session_token)).await;
        self.places.lock().unwrap().get(prediction_id).cloned().ok_or_else(unavailable)
    }

    async fn record_choice(&self, choice: &UserChoice) -> Result<(), GatewayError> {
        self.record(format!(
            "record_choice:{}:{}",
            choice.restaurant_id,
            choice.session_id.as_deref().unwrap_or_default()
        )).await;
        Ok(())
    }

    async fn saved_preferences(&self) -> Result<UserPreferences, GatewayError> {
        self.record("saved_preferences:".to_string()).await;
        Err(unavailable())
    }
}

#[derive(Default)]
pub struct MockImages {
    broken: HashSet<String>,
    loaded: Mutex<Vec<String>>,
}

impl MockImages {
    pub fn failing(urls: &[&str]) -> Self {
        Self {
            broken: urls.iter().map(|u| u.to_string()).collect(),
            loaded: Mutex::new(Vec::new()),
        }
    }

    pub fn loaded(&self) -> Vec<String> {
        self.loaded.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageProbe for MockImages {
    async fn preload(&self, url: &str) -> Result<(), GatewayError> {
        self.loaded.lock().unwrap().push(url.to_string());
        if self.broken.contains(url) {
            return Err(GatewayError::Status { status: 404, detail: None });
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn alert(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}
