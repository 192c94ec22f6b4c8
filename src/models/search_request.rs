use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use crate::models::place::Coordinates;
use crate::models::preferences::UserPreferences;

pub const CURRENT_LOCATION_LABEL: &str = "Current Location";

#[skip_serializing_none]
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub preferences: Option<UserPreferences>,
    pub offset: Option<u32>,
    pub session_id: Option<String>,
}

impl SearchRequest {
    /// A request the backend has to geocode itself.
    pub fn for_address(address: &str, preferences: &UserPreferences) -> Self {
        Self {
            address: address.trim().to_string(),
            latitude: None,
            longitude: None,
            preferences: Some(preferences.clone()),
            offset: None,
            session_id: None,
        }
    }

    pub fn at(address: &str, coordinates: Coordinates, preferences: &UserPreferences) -> Self {
        Self {
            latitude: Some(coordinates.latitude),
            longitude: Some(coordinates.longitude),
            ..Self::for_address(address, preferences)
        }
    }

    pub fn at_current_location(coordinates: Coordinates, preferences: &UserPreferences) -> Self {
        Self::at(CURRENT_LOCATION_LABEL, coordinates, preferences)
    }

    /// Ties the request to a backend session so rerolls can page through its ranking.
    pub fn in_session(self, session_id: &str) -> Self {
        Self {
            session_id: Some(session_id.to_string()),
            offset: None,
            ..self
        }
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates { latitude, longitude }),
            _ => None,
        }
    }

    pub fn summary_hints(&self) -> Vec<String> {
        self.preferences
            .as_ref()
            .map(UserPreferences::summary_hints)
            .unwrap_or_default()
    }
}
