use std::collections::BTreeSet;
use serde::{Deserialize, Serialize};

pub const MIN_DISTANCE_MILES: u32 = 1;
pub const MAX_DISTANCE_MILES: u32 = 50;
pub const DEFAULT_MIN_RATING: f64 = 3.0;

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    pub max_distance: u32,
    pub min_rating: f64,
    #[serde(default)]
    pub dietary_restrictions: BTreeSet<String>,
    #[serde(default)]
    pub favorite_styles: BTreeSet<String>,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            max_distance: 10,
            min_rating: DEFAULT_MIN_RATING,
            dietary_restrictions: BTreeSet::new(),
            favorite_styles: BTreeSet::new(),
        }
    }
}

/// Clamps a raw distance entry into the accepted mile range.
pub fn clamp_distance(raw: i64) -> u32 {
    raw.clamp(MIN_DISTANCE_MILES as i64, MAX_DISTANCE_MILES as i64) as u32
}

impl UserPreferences {
    /// Commits a distance entered in the form. Out-of-range values are clamped, never rejected.
    pub fn commit_max_distance(&mut self, raw: i64) -> u32 {
        self.max_distance = clamp_distance(raw);
        self.max_distance
    }

    /// Clamps into 0..=5. NaN and infinities are refused and the current rating kept.
    pub fn set_min_rating(&mut self, rating: f64) -> bool {
        if !rating.is_finite() {
            return false;
        }
        self.min_rating = rating.clamp(0.0, 5.0);
        true
    }

    /// Returns whether the restriction is active after the toggle.
    pub fn toggle_dietary_restriction(&mut self, restriction: &str) -> bool {
        toggle(&mut self.dietary_restrictions, restriction)
    }

    pub fn toggle_favorite_style(&mut self, style: &str) -> bool {
        toggle(&mut self.favorite_styles, style)
    }

    /// Restrictions first, then styles, as the summary endpoint expects them.
    pub fn summary_hints(&self) -> Vec<String> {
        self.dietary_restrictions
            .iter()
            .chain(self.favorite_styles.iter())
            .cloned()
            .collect()
    }

    /// Saved preferences come from the backend unchecked; bring them back into range.
    pub fn normalized(mut self) -> Self {
        self.max_distance = clamp_distance(self.max_distance as i64);
        if !self.set_min_rating(self.min_rating) {
            self.min_rating = DEFAULT_MIN_RATING;
        }
        self
    }
}

fn toggle(set: &mut BTreeSet<String>, value: &str) -> bool {
    let value = value.trim();
    if set.remove(value) {
        false
    } else {
        set.insert(value.to_string());
        true
    }
}
