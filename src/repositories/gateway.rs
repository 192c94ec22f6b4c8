use std::sync::Arc;
use async_trait::async_trait;
use crate::error::GatewayError;
use crate::models::place::{Coordinates, PlaceDetails, Prediction};
use crate::models::preferences::UserPreferences;
use crate::models::restaurant::Restaurant;
use crate::models::search_request::SearchRequest;
use crate::models::summary::AIGeneratedSummary;
use crate::models::user_choice::UserChoice;
use crate::repositories::backend_repo::BackendRepo;
use crate::repositories::places_repo::PlacesProvider;

/// Everything the client asks of the outside world, one request per call.
///
/// Callers decide which failures are fatal; the gateway never retries or caches.
#[async_trait]
pub trait BackendGateway: Send + Sync {
    async fn recommendations(&self, request: &SearchRequest) -> Result<Vec<Restaurant>, GatewayError>;

    async fn search_restaurants(&self, request: &SearchRequest) -> Result<Vec<Restaurant>, GatewayError>;

    async fn restaurant(&self, restaurant_id: &str) -> Result<Restaurant, GatewayError>;

    async fn summary(
        &self,
        restaurant_id: &str,
        preferences: &[String],
    ) -> Result<AIGeneratedSummary, GatewayError>;

    async fn geocode(&self, address: &str) -> Result<Coordinates, GatewayError>;

    async fn autocomplete(
        &self,
        query: &str,
        session_token: &str,
    ) -> Result<Vec<Prediction>, GatewayError>;

    async fn place_details(
        &self,
        prediction_id: &str,
        session_token: &str,
    ) -> Result<PlaceDetails, GatewayError>;

    async fn record_choice(&self, choice: &UserChoice) -> Result<(), GatewayError>;

    async fn saved_preferences(&self) -> Result<UserPreferences, GatewayError>;
}

pub struct HttpGateway {
    backend: BackendRepo,
    places: Arc<dyn PlacesProvider>,
}

impl HttpGateway {
    pub fn new(backend: BackendRepo, places: Arc<dyn PlacesProvider>) -> Self {
        Self { backend, places }
    }

    pub fn places(&self) -> &Arc<dyn PlacesProvider> {
        &self.places
    }
}

#[async_trait]
impl BackendGateway for HttpGateway {
    async fn recommendations(&self, request: &SearchRequest) -> Result<Vec<Restaurant>, GatewayError> {
        self.backend.recommendations(request).await
    }

    async fn search_restaurants(&self, request: &SearchRequest) -> Result<Vec<Restaurant>, GatewayError> {
        self.backend.search_restaurants(request).await
    }

    async fn restaurant(&self, restaurant_id: &str) -> Result<Restaurant, GatewayError> {
        self.backend.restaurant(restaurant_id).await
    }

    async fn summary(
        &self,
        restaurant_id: &str,
        preferences: &[String],
    ) -> Result<AIGeneratedSummary, GatewayError> {
        self.backend.summary(restaurant_id, preferences).await
    }

    async fn geocode(&self, address: &str) -> Result<Coordinates, GatewayError> {
        self.backend.geocode(address).await
    }

    async fn autocomplete(
        &self,
        query: &str,
        session_token: &str,
    ) -> Result<Vec<Prediction>, GatewayError> {
        self.places.autocomplete(query, session_token).await
    }

    async fn place_details(
        &self,
        prediction_id: &str,
        session_token: &str,
    ) -> Result<PlaceDetails, GatewayError> {
        self.places.place_details(prediction_id, session_token).await
    }

    async fn record_choice(&self, choice: &UserChoice) -> Result<(), GatewayError> {
        self.backend.record_choice(choice).await
    }

    async fn saved_preferences(&self) -> Result<UserPreferences, GatewayError> {
        self.backend.saved_preferences().await
    }
}
