use tracing::warn;

/// Surfaces errors the user has to acknowledge before continuing.
pub trait Notifier: Send + Sync {
    fn alert(&self, message: &str);
}

pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn alert(&self, message: &str) {
        warn!("Alert shown to user: {}", message);
        eprintln!("\n!! {}\n", message);
    }
}
