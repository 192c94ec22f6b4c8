use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};
use crate::config::Timings;
use crate::models::place::Coordinates;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeolocationError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Location unavailable")]
    Unavailable,

    #[error("Timed out acquiring location")]
    Timeout,
}

impl GeolocationError {
    pub fn user_message(&self) -> &'static str {
        match self {
            GeolocationError::PermissionDenied => {
                "Location access was denied. Please allow location access or enter an address."
            }
            GeolocationError::Unavailable | GeolocationError::Timeout => {
                "Unable to determine your location. Please enter an address instead."
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PositionOptions {
    pub high_accuracy: bool,
    pub timeout: Duration,
    /// How old a cached fix may be; zero forces a fresh one.
    pub maximum_age: Duration,
}

/// Where positions come from. The timeout in `options` is enforced by the provider.
#[async_trait]
pub trait PositionSource: Send + Sync {
    async fn acquire(&self, options: &PositionOptions) -> Result<Coordinates, GeolocationError>;
}

/// A position fixed at startup, for terminals that have no location service.
pub struct FixedPositionSource(pub Coordinates);

#[async_trait]
impl PositionSource for FixedPositionSource {
    async fn acquire(&self, _options: &PositionOptions) -> Result<Coordinates, GeolocationError> {
        Ok(self.0)
    }
}

pub struct NoPositionSource;

#[async_trait]
impl PositionSource for NoPositionSource {
    async fn acquire(&self, _options: &PositionOptions) -> Result<Coordinates, GeolocationError> {
        Err(GeolocationError::Unavailable)
    }
}

pub struct GeolocationProvider {
    source: Arc<dyn PositionSource>,
    high_accuracy: PositionOptions,
    low_accuracy: PositionOptions,
}

impl GeolocationProvider {
    pub fn new(source: Arc<dyn PositionSource>, timings: &Timings) -> Self {
        Self {
            source,
            high_accuracy: PositionOptions {
                high_accuracy: true,
                timeout: timings.high_accuracy_timeout,
                maximum_age: Duration::ZERO,
            },
            low_accuracy: PositionOptions {
                high_accuracy: false,
                timeout: timings.low_accuracy_timeout,
                maximum_age: Duration::ZERO,
            },
        }
    }

    async fn attempt(&self, options: &PositionOptions) -> Result<Coordinates, GeolocationError> {
        match tokio::time::timeout(options.timeout, self.source.acquire(options)).await {
            Ok(result) => result,
            Err(_) => Err(GeolocationError::Timeout),
        }
    }

    /// High accuracy first; anything but a denial gets one low-accuracy retry.
    pub async fn current_position(&self) -> Result<Coordinates, GeolocationError> {
        match self.attempt(&self.high_accuracy).await {
            Ok(position) => Ok(position),
            Err(GeolocationError::PermissionDenied) => {
                warn!("Location permission denied, not retrying");
                Err(GeolocationError::PermissionDenied)
            }
            Err(e) => {
                info!("High accuracy location failed due to: {}, retrying with low accuracy", e);
                self.attempt(&self.low_accuracy).await.map_err(|e| {
                    warn!("Low accuracy location failed due to: {}", e);
                    e
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use super::*;

    /// Replays scripted outcomes; `None` never answers.
    struct ScriptedSource {
        script: Mutex<Vec<Option<Result<Coordinates, GeolocationError>>>>,
        seen: Mutex<Vec<PositionOptions>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Option<Result<Coordinates, GeolocationError>>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn seen(&self) -> Vec<PositionOptions> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PositionSource for ScriptedSource {
        async fn acquire(&self, options: &PositionOptions) -> Result<Coordinates, GeolocationError> {
            self.seen.lock().unwrap().push(*options);
            let next = self.script.lock().unwrap().remove(0);
            match next {
                Some(result) => result,
                None => std::future::pending().await,
            }
        }
    }

    const POSITION: Coordinates = Coordinates { latitude: 10.0, longitude: 20.0 };

    #[tokio::test(start_paused = true)]
    async fn timeout_falls_back_to_low_accuracy() {
        let source = ScriptedSource::new(vec![None, Some(Ok(POSITION))]);
        let provider = GeolocationProvider::new(source.clone(), &Timings::default());

        let started = tokio::time::Instant::now();
        assert_eq!(provider.current_position().await, Ok(POSITION));
        assert_eq!(started.elapsed(), Duration::from_secs(5));

        let seen = source.seen();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].high_accuracy);
        assert!(!seen[1].high_accuracy);
        assert_eq!(seen[1].timeout, Duration::from_secs(10));
        assert_eq!(seen[1].maximum_age, Duration::ZERO);
    }

    #[tokio::test]
    async fn permission_denied_is_not_retried() {
        let source = ScriptedSource::new(vec![Some(Err(GeolocationError::PermissionDenied))]);
        let provider = GeolocationProvider::new(source.clone(), &Timings::default());

        assert_eq!(provider.current_position().await, Err(GeolocationError::PermissionDenied));
        assert_eq!(source.seen().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn surfaces_the_low_accuracy_failure() {
        let source = ScriptedSource::new(vec![Some(Err(GeolocationError::Unavailable)), None]);
        let provider = GeolocationProvider::new(source.clone(), &Timings::default());

        assert_eq!(provider.current_position().await, Err(GeolocationError::Timeout));
        assert_eq!(source.seen().len(), 2);
    }

    #[tokio::test]
    async fn fixed_source_answers_first_time() {
        let provider = GeolocationProvider::new(Arc::new(FixedPositionSource(POSITION)), &Timings::default());

        assert_eq!(provider.current_position().await, Ok(POSITION));
    }
}
