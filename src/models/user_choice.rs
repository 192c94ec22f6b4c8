use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use time::OffsetDateTime;

#[skip_serializing_none]
#[derive(Clone, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UserChoice {
    pub restaurant_id: String,
    pub session_id: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub chosen_at: OffsetDateTime,
}

impl UserChoice {
    pub fn now(restaurant_id: &str, session_id: Option<String>) -> Self {
        Self {
            restaurant_id: restaurant_id.to_string(),
            session_id,
            chosen_at: OffsetDateTime::now_utc(),
        }
    }
}
