use std::sync::{Arc, Mutex};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::warn;
use crate::error::GatewayError;
use crate::models::place::{Coordinates, PlaceDetails, Prediction};
use crate::repositories::backend_repo::{read_json, BackendRepo, ProxyPrediction};

pub const GOOGLE_PLACES_URL: &str = "https://places.googleapis.com/v1";
const PLACE_RESOURCE_PREFIX: &str = "places/";
const DETAILS_FIELD_MASK: &str = "id,displayName,formattedAddress,location";

/// Source of address predictions and their resolution to coordinates.
#[async_trait]
pub trait PlacesProvider: Send + Sync {
    fn name(&self) -> &'static str;

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

    fn auth_failures(&self) -> &AuthFailureHooks;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthFailure {
    pub provider: &'static str,
    pub status: u16,
}

type AuthFailureHook = Arc<dyn Fn(&AuthFailure) + Send + Sync>;

/// Callbacks fired when the places provider rejects our credentials.
#[derive(Clone, Default)]
pub struct AuthFailureHooks {
    hooks: Arc<Mutex<Vec<AuthFailureHook>>>,
}

impl AuthFailureHooks {
    pub fn register(&self, hook: impl Fn(&AuthFailure) + Send + Sync + 'static) {
        match self.hooks.lock() {
            Ok(mut hooks) => hooks.push(Arc::new(hook)),
            Err(e) => warn!("Failed to register auth failure hook due to: {}", e),
        }
    }

    pub fn fire(&self, failure: &AuthFailure) {
        let hooks: Vec<AuthFailureHook> = match self.hooks.lock() {
            Ok(hooks) => hooks.clone(),
            Err(_) => return,
        };
        for hook in hooks {
            hook(failure);
        }
    }
}

/// Catches 401/403 before the generic status handling so the hooks see them.
async fn check_auth(
    response: Response,
    provider: &'static str,
    hooks: &AuthFailureHooks,
) -> Result<Response, GatewayError> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        warn!("{} rejected the request with {}", provider, status);
        let failure = AuthFailure { provider, status: status.as_u16() };
        hooks.fire(&failure);
        return Err(GatewayError::Unauthorized { provider, status: status.as_u16() });
    }
    Ok(response)
}

// Raw provider shapes. Nothing below leaves this module un-normalized.

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct RawText {
    text: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct RawLocation {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct RawPlace {
    display_name: Option<RawText>,
    formatted_address: Option<String>,
    location: Option<RawLocation>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct RawAutocomplete {
    #[serde(default)]
    suggestions: Vec<RawSuggestion>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct RawSuggestion {
    place_prediction: Option<RawPlacePrediction>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct RawPlacePrediction {
    place_id: Option<String>,
    text: Option<RawText>,
    structured_format: Option<RawStructuredFormat>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct RawStructuredFormat {
    main_text: Option<RawText>,
    secondary_text: Option<RawText>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn strip_resource_prefix(id: &str) -> &str {
    id.strip_prefix(PLACE_RESOURCE_PREFIX).unwrap_or(id)
}

fn normalize_proxy_predictions(raw: Vec<ProxyPrediction>) -> Vec<Prediction> {
    raw.into_iter()
        .filter_map(|p| {
            Some(Prediction {
                id: strip_resource_prefix(&non_empty(p.place_id)?).to_string(),
                description: non_empty(p.description)?,
                main_text: non_empty(p.main_text),
                secondary_text: non_empty(p.secondary_text),
            })
        })
        .collect()
}

fn normalize_suggestions(raw: RawAutocomplete) -> Vec<Prediction> {
    raw.suggestions
        .into_iter()
        .filter_map(|s| {
            let prediction = s.place_prediction?;
            let structured = prediction.structured_format;
            let (main_text, secondary_text) = match structured {
                Some(f) => (
                    f.main_text.and_then(|t| non_empty(t.text)),
                    f.secondary_text.and_then(|t| non_empty(t.text)),
                ),
                None => (None, None),
            };
            Some(Prediction {
                id: strip_resource_prefix(&non_empty(prediction.place_id)?).to_string(),
                description: non_empty(prediction.text?.text)?,
                main_text,
                secondary_text,
            })
        })
        .collect()
}

fn normalize_place(raw: RawPlace) -> Result<PlaceDetails, GatewayError> {
    let location = raw
        .location
        .and_then(|l| Some(Coordinates { latitude: l.latitude?, longitude: l.longitude? }))
        .ok_or_else(|| GatewayError::MalformedPayload("place has no location".to_string()))?;
    let formatted_address = non_empty(raw.formatted_address)
        .or_else(|| raw.display_name.and_then(|d| non_empty(d.text)))
        .ok_or_else(|| GatewayError::MalformedPayload("place has no address".to_string()))?;

    Ok(PlaceDetails {
        formatted_address,
        location,
    })
}

/// Predictions through the backend's `/places` proxy; the backend holds the provider key.
pub struct BackendPlacesProvider {
    backend: BackendRepo,
    auth_failures: AuthFailureHooks,
}

impl BackendPlacesProvider {
    pub fn new(backend: BackendRepo) -> Self {
        Self {
            backend,
            auth_failures: AuthFailureHooks::default(),
        }
    }
}

#[async_trait]
impl PlacesProvider for BackendPlacesProvider {
    fn name(&self) -> &'static str {
        "places proxy"
    }

    async fn autocomplete(
        &self,
        query: &str,
        session_token: &str,
    ) -> Result<Vec<Prediction>, GatewayError> {
        let response = self.backend.proxy_autocomplete(query, session_token).await?;
        let response = check_auth(response, self.name(), &self.auth_failures).await?;
        let raw: Vec<ProxyPrediction> = read_json(response).await?;
        Ok(normalize_proxy_predictions(raw))
    }

    async fn place_details(
        &self,
        prediction_id: &str,
        _session_token: &str,
    ) -> Result<PlaceDetails, GatewayError> {
        let response = self.backend.proxy_place_details(prediction_id).await?;
        let response = check_auth(response, self.name(), &self.auth_failures).await?;
        normalize_place(read_json(response).await?)
    }

    fn auth_failures(&self) -> &AuthFailureHooks {
        &self.auth_failures
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AutocompleteBody<'a> {
    input: &'a str,
    session_token: &'a str,
}

/// Direct Google Places (New) access with the configured maps key.
pub struct GooglePlacesProvider {
    client: Client,
    base_url: Url,
    api_key: String,
    auth_failures: AuthFailureHooks,
}

impl GooglePlacesProvider {
    pub fn new(client: Client, base_url: Url, api_key: String) -> Self {
        Self {
            client,
            base_url,
            api_key,
            auth_failures: AuthFailureHooks::default(),
        }
    }

    fn url(&self, path: &str) -> Result<Url, GatewayError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Url::parse(&format!("{}/{}", base, path))
            .map_err(|e| GatewayError::InvalidEndpoint(e.to_string()))
    }
}

#[async_trait]
impl PlacesProvider for GooglePlacesProvider {
    fn name(&self) -> &'static str {
        "Google Places"
    }

    async fn autocomplete(
        &self,
        query: &str,
        session_token: &str,
    ) -> Result<Vec<Prediction>, GatewayError> {
        let response = self.client
            .post(self.url("places:autocomplete")?)
            .header("X-Goog-Api-Key", &self.api_key)
            .json(&AutocompleteBody { input: query, session_token })
            .send()
            .await?;
        let response = check_auth(response, self.name(), &self.auth_failures).await?;
        let raw: RawAutocomplete = read_json(response).await?;
        Ok(normalize_suggestions(raw))
    }

    async fn place_details(
        &self,
        prediction_id: &str,
        session_token: &str,
    ) -> Result<PlaceDetails, GatewayError> {
        let mut url = self.url("places")?;
        url.path_segments_mut()
            .map_err(|_| GatewayError::InvalidEndpoint(self.base_url.to_string()))?
            .push(strip_resource_prefix(prediction_id));

        let response = self.client
            .get(url)
            .header("X-Goog-Api-Key", &self.api_key)
            .header("X-Goog-FieldMask", DETAILS_FIELD_MASK)
            .query(&[("sessionToken", session_token)])
            .send()
            .await?;
        let response = check_auth(response, self.name(), &self.auth_failures).await?;
        normalize_place(read_json(response).await?)
    }

    fn auth_failures(&self) -> &AuthFailureHooks {
        &self.auth_failures
    }
}
