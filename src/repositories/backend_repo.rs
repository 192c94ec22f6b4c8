use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use crate::error::GatewayError;
use crate::models::place::Coordinates;
use crate::models::preferences::UserPreferences;
use crate::models::restaurant::Restaurant;
use crate::models::search_request::SearchRequest;
use crate::models::summary::AIGeneratedSummary;
use crate::models::user_choice::UserChoice;

/// Plain HTTP access to the recommendation backend. One request per call, no retries.
#[derive(Clone)]
pub struct BackendRepo {
    client: Client,
    base_url: Url,
}

#[derive(Serialize)]
struct GeocodeBody<'a> {
    address: &'a str,
}

/// Prediction as the backend's places proxy emits it.
#[derive(Clone, Deserialize, Debug)]
pub struct ProxyPrediction {
    pub place_id: Option<String>,
    pub description: Option<String>,
    pub main_text: Option<String>,
    pub secondary_text: Option<String>,
}

impl BackendRepo {
    pub fn new(
        client: Client,
        base_url: Url,
    ) -> Self {
        Self {
            client,
            base_url,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::InvalidEndpoint(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub async fn recommendations(
        &self,
        request: &SearchRequest,
    ) -> Result<Vec<Restaurant>, GatewayError> {
        let url = self.endpoint(&["pizza-recommendations"])?;
        let response = self.client.post(url).json(request).send().await?;
        read_json(response).await
    }

    pub async fn search_restaurants(
        &self,
        request: &SearchRequest,
    ) -> Result<Vec<Restaurant>, GatewayError> {
        let url = self.endpoint(&["restaurants", "search"])?;
        let response = self.client.post(url).json(request).send().await?;
        read_json(response).await
    }

    pub async fn restaurant(
        &self,
        restaurant_id: &str,
    ) -> Result<Restaurant, GatewayError> {
        let url = self.endpoint(&["restaurants", restaurant_id])?;
        let response = self.client.get(url).send().await?;
        read_json(response).await
    }

    pub async fn summary(
        &self,
        restaurant_id: &str,
        preferences: &[String],
    ) -> Result<AIGeneratedSummary, GatewayError> {
        let url = self.endpoint(&["restaurants", restaurant_id, "summary"])?;
        let mut request = self.client.get(url);
        if !preferences.is_empty() {
            request = request.query(&[("preferences", preferences.join(","))]);
        }
        let response = request.send().await?;
        read_json(response).await
    }

    pub async fn geocode(
        &self,
        address: &str,
    ) -> Result<Coordinates, GatewayError> {
        let url = self.endpoint(&["geocode"])?;
        let response = self.client
            .post(url)
            .json(&GeocodeBody { address })
            .send()
            .await?;
        read_json(response).await
    }

    pub async fn record_choice(
        &self,
        choice: &UserChoice,
    ) -> Result<(), GatewayError> {
        let url = self.endpoint(&["user", "choices"])?;
        let response = self.client.post(url).json(choice).send().await?;
        ensure_success(response).await.map(|_| ())
    }

    pub async fn saved_preferences(&self) -> Result<UserPreferences, GatewayError> {
        let url = self.endpoint(&["user", "preferences"])?;
        let response = self.client.get(url).send().await?;
        read_json(response).await
    }

    pub async fn proxy_autocomplete(
        &self,
        query: &str,
        session_token: &str,
    ) -> Result<Response, GatewayError> {
        let url = self.endpoint(&["places", "autocomplete"])?;
        let response = self.client
            .get(url)
            .query(&[("input", query), ("session_token", session_token)])
            .send()
            .await?;
        Ok(response)
    }

    pub async fn proxy_place_details(
        &self,
        place_id: &str,
    ) -> Result<Response, GatewayError> {
        let url = self.endpoint(&["places", "details", place_id])?;
        Ok(self.client.get(url).send().await?)
    }
}

/// Turns a non-2xx response into `GatewayError::Status`, keeping the backend's `detail` text.
pub(crate) async fn ensure_success(response: Response) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = extract_detail(&body);
    warn!("Backend responded with {} due to: {}", status, detail.as_deref().unwrap_or("<no detail>"));
    Err(GatewayError::Status {
        status: status.as_u16(),
        detail,
    })
}

pub(crate) async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, GatewayError> {
    let response = ensure_success(response).await?;
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| {
        debug!("Undecodable body: {}", String::from_utf8_lossy(&body));
        GatewayError::MalformedPayload(e.to_string())
    })
}

fn extract_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        Value::String(detail) if !detail.trim().is_empty() => Some(detail.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo(base: &str) -> BackendRepo {
        BackendRepo::new(Client::new(), Url::parse(base).unwrap())
    }

    #[test]
    fn endpoints_are_joined_under_the_base_path() {
        let with_slash = repo("http://localhost:8000/api/");
        let without_slash = repo("http://localhost:8000/api");

        assert_eq!(
            with_slash.endpoint(&["pizza-recommendations"]).unwrap().as_str(),
            "http://localhost:8000/api/pizza-recommendations"
        );
        assert_eq!(
            without_slash.endpoint(&["restaurants", "r 1", "summary"]).unwrap().as_str(),
            "http://localhost:8000/api/restaurants/r%201/summary"
        );
    }

    #[test]
    fn detail_is_only_taken_from_string_fields() {
        assert_eq!(
            extract_detail(r#"{"detail": "Geocoding failed: nope"}"#),
            Some("Geocoding failed: nope".to_string())
        );
        assert_eq!(extract_detail(r#"{"detail": [{"loc": ["body"]}]}"#), None);
        assert_eq!(extract_detail(r#"{"detail": "  "}"#), None);
        assert_eq!(extract_detail("<html>Bad Gateway</html>"), None);
    }
}
