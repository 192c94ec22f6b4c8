use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// One autocomplete suggestion, already normalized away from the provider's shape.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub id: String,
    pub description: String,
    pub main_text: Option<String>,
    pub secondary_text: Option<String>,
}

impl Prediction {
    pub fn new(id: &str, description: &str) -> Self {
        Self {
            id: id.to_string(),
            description: description.to_string(),
            main_text: None,
            secondary_text: None,
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlaceDetails {
    pub formatted_address: String,
    pub location: Coordinates,
}
