pub mod place;
pub mod preferences;
pub mod restaurant;
pub mod search_request;
pub mod summary;
pub mod user_choice;
