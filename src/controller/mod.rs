pub mod autocomplete;
pub mod geolocation;
pub mod results;
pub mod search;
pub mod session;
pub mod status;
