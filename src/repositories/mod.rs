pub mod backend_repo;
pub mod gateway;
pub mod image_probe;
pub mod places_repo;
