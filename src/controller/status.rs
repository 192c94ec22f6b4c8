use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

pub const SEARCHING_PHRASES: &[&str] = &[
    "Firing up the oven...",
    "Scouting the neighborhood...",
    "Tossing the dough...",
    "Comparing crusts...",
];

pub const ENRICHING_PHRASES: &[&str] = &[
    "Reading what people are saying...",
    "Plating the photos...",
];

pub const FINAL_PHRASE: &str = "Almost ready!";

/// Cycles status phrases on a fixed interval until dropped.
pub struct StatusRotation {
    task: JoinHandle<()>,
}

impl StatusRotation {
    /// The first phrase is published immediately.
    pub fn start<F>(phrases: &'static [&'static str], interval: Duration, publish: F) -> Self
    where
        F: Fn(&'static str) + Send + 'static,
    {
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            for phrase in phrases.iter().cycle() {
                ticker.tick().await;
                debug!("Status: {}", phrase);
                publish(*phrase);
            }
        });
        Self { task }
    }
}

impl Drop for StatusRotation {
    fn drop(&mut self) {
        self.task.abort();
    }
}
