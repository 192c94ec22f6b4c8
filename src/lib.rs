pub mod cli;
pub mod config;
pub mod controller;
pub mod error;
pub mod helpers;
pub mod models;
pub mod repositories;

#[cfg(test)]
pub(crate) mod testing;
