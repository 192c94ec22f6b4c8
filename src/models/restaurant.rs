use serde::{Deserialize, Serialize};
use crate::models::summary::AIGeneratedSummary;

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Restaurant {
    pub id: String,
    pub name: String,
    pub address: String,
    pub distance: f64,
    pub rating: f64,
    pub price_level: u8,
    #[serde(default)]
    pub cuisine: Vec<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub open_now: Option<bool>,
    pub latitude: f64,
    pub longitude: f64,
    pub photo_url: Option<String>,
    pub ai_summary: Option<AIGeneratedSummary>,
    #[serde(skip)]
    pub image: ImageStatus,
}

/// Outcome of preloading a restaurant's photo. Lives only on the client.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ImageStatus {
    #[default]
    Unchecked,
    /// No photo reference was sent, nothing to load.
    Absent,
    Loaded,
    Unavailable,
}

impl Restaurant {
    /// Attaches a summary unless one is already cached. Returns whether it was stored.
    pub fn attach_summary(&mut self, summary: AIGeneratedSummary) -> bool {
        if self.ai_summary.is_some() {
            return false;
        }
        self.ai_summary = Some(summary);
        true
    }

    pub fn price_label(&self) -> String {
        "$".repeat(self.price_level.clamp(1, 4) as usize)
    }
}

#[cfg(test)]
pub(crate) fn sample(id: &str, photo_url: Option<&str>) -> Restaurant {
    Restaurant {
        id: id.to_string(),
        name: format!("Pizzeria {}", id),
        address: "1 Main St".to_string(),
        distance: 1.2,
        rating: 4.5,
        price_level: 2,
        cuisine: vec!["Pizza".to_string()],
        phone: None,
        website: None,
        open_now: Some(true),
        latitude: 40.7,
        longitude: -74.0,
        photo_url: photo_url.map(str::to_string),
        ai_summary: None,
        image: ImageStatus::Unchecked,
    }
}
