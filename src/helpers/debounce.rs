use std::time::Duration;
use tokio::time::Instant;

/// Holds back a value until input has been quiet for `quiet`, then releases it
/// only if it differs from the last value released.
#[derive(Debug)]
pub struct DistinctDebouncer<T> {
    quiet: Duration,
    pending: Option<(T, Instant)>,
    last_released: Option<T>,
}

impl<T: PartialEq + Clone> DistinctDebouncer<T> {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            pending: None,
            last_released: None,
        }
    }

    /// Replaces whatever is pending and restarts the quiet period.
    pub fn push(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now + self.quiet));
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, deadline)| *deadline)
    }

    /// Releases the pending value once its deadline has passed.
    /// A value equal to the previous release is swallowed.
    pub fn fire(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((_, deadline)) if *deadline <= now => {}
            _ => return None,
        }
        let (value, _) = self.pending.take()?;
        if self.last_released.as_ref() == Some(&value) {
            return None;
        }
        self.last_released = Some(value.clone());
        Some(value)
    }

    /// Records a value set programmatically so it does not count as a change later.
    pub fn settle_on(&mut self, value: T) {
        self.pending = None;
        self.last_released = Some(value);
    }
}
