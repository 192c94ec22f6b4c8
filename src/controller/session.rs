use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;
use crate::controller::autocomplete::ResolvedLocation;
use crate::controller::geolocation::GeolocationProvider;
use crate::controller::search::{SearchError, SearchOrchestrator};
use crate::error::GatewayError;
use crate::helpers::notifier::Notifier;
use crate::models::preferences::UserPreferences;
use crate::models::restaurant::Restaurant;
use crate::models::search_request::SearchRequest;
use crate::repositories::gateway::BackendGateway;

/// The search form: preferences plus the three ways a search can start.
pub struct Session {
    gateway: Arc<dyn BackendGateway>,
    notifier: Arc<dyn Notifier>,
    geolocation: GeolocationProvider,
    orchestrator: SearchOrchestrator,
    preferences: UserPreferences,
    session_id: String,
}

impl Session {
    pub fn new(
        gateway: Arc<dyn BackendGateway>,
        notifier: Arc<dyn Notifier>,
        geolocation: GeolocationProvider,
        orchestrator: SearchOrchestrator,
    ) -> Self {
        Self {
            gateway,
            notifier,
            geolocation,
            orchestrator,
            preferences: UserPreferences::default(),
            session_id: Uuid::new_v4().to_string(),
        }
    }

    /// Backend session every search of this run belongs to.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn orchestrator(&self) -> &SearchOrchestrator {
        &self.orchestrator
    }

    pub fn preferences(&self) -> &UserPreferences {
        &self.preferences
    }

    pub fn preferences_mut(&mut self) -> &mut UserPreferences {
        &mut self.preferences
    }

    /// Seeds the form from the backend. Keeps the defaults when that fails.
    pub async fn load_saved_preferences(&mut self) -> bool {
        match self.gateway.saved_preferences().await {
            Ok(saved) => {
                self.preferences = saved.normalized();
                info!("Loaded saved preferences");
                true
            }
            Err(e) => {
                warn!("Something went wrong loading saved preferences due to: {}", e);
                false
            }
        }
    }

    pub fn request_for_location(&self, location: &ResolvedLocation) -> SearchRequest {
        SearchRequest::at(&location.address, location.coordinates, &self.preferences)
            .in_session(&self.session_id)
    }

    /// Builds a request at the device position, or alerts and gives up.
    pub async fn request_for_current_location(&self) -> Option<SearchRequest> {
        match self.geolocation.current_position().await {
            Ok(position) => Some(
                SearchRequest::at_current_location(position, &self.preferences).in_session(&self.session_id),
            ),
            Err(e) => {
                self.notifier.alert(e.user_message());
                None
            }
        }
    }

    /// Geocodes a typed address; if that fails the backend gets the bare address.
    pub async fn request_for_address(&self, address: &str) -> Option<SearchRequest> {
        let address = address.trim();
        if address.is_empty() {
            return None;
        }
        match self.gateway.geocode(address).await {
            Ok(coordinates) => Some(
                SearchRequest::at(address, coordinates, &self.preferences).in_session(&self.session_id),
            ),
            Err(e) => {
                warn!("Something went wrong geocoding '{}' due to: {}, sending the address as is", address, e);
                Some(SearchRequest::for_address(address, &self.preferences).in_session(&self.session_id))
            }
        }
    }

    pub async fn search_current_location(&self) -> Option<Result<usize, SearchError>> {
        let request = self.request_for_current_location().await?;
        Some(self.orchestrator.search(request).await)
    }

    pub async fn search_location(&self, location: &ResolvedLocation) -> Result<usize, SearchError> {
        self.orchestrator.search(self.request_for_location(location)).await
    }

    pub async fn search_address(&self, address: &str) -> Option<Result<usize, SearchError>> {
        let request = self.request_for_address(address).await?;
        Some(self.orchestrator.search(request).await)
    }

    /// Plain listing from the generic search endpoint, without enrichment.
    pub async fn browse(&self, address: &str) -> Result<Vec<Restaurant>, GatewayError> {
        let request = SearchRequest::for_address(address, &self.preferences);
        self.gateway.search_restaurants(&request).await
    }
}
