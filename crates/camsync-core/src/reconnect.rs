//! Reconnection policy for dropped camera links.
//!
//! Reconnection is lazy: the link manager only tries it at keep-alive time,
//! for cameras whose link reports as down.

use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::traits::CameraLink;

/// Options for reconnecting a dropped link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectOptions {
    /// Maximum number of connection attempts per keep-alive round.
    pub max_attempts: u32,
    /// Fixed delay between two attempts.
    pub delay: Duration,
    /// Upper bound for a single attempt, shorter than a first connect so an
    /// out-of-range camera does not hold the worker for long.
    pub attempt_timeout: Duration,
}

impl Default for ReconnectOptions {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            delay: Duration::from_secs(1),
            attempt_timeout: Duration::from_secs(5),
        }
    }
}

impl ReconnectOptions {
    /// Set maximum number of attempts.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set the delay between attempts.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Set the per-attempt timeout.
    pub fn attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Validate the options and return an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::InvalidConfig(
                "reconnect max_attempts must be >= 1".to_string(),
            ));
        }
        if self.attempt_timeout.is_zero() {
            return Err(Error::InvalidConfig(
                "reconnect attempt_timeout must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Try to re-open `link`, sleeping `options.delay` between attempts.
///
/// Returns `true` once an attempt succeeds.
pub async fn reconnect(link: &dyn CameraLink, options: &ReconnectOptions) -> bool {
    for attempt in 1..=options.max_attempts {
        info!(
            "Reconnecting to {} (attempt {}/{})",
            link.name(),
            attempt,
            options.max_attempts
        );
        match timeout(options.attempt_timeout, link.connect()).await {
            Ok(Ok(())) => {
                info!("Reconnected to {}", link.name());
                return true;
            }
            Ok(Err(e)) => warn!("Reconnect to {} failed: {}", link.name(), e),
            Err(_) => warn!(
                "Reconnect to {} timed out after {:?}",
                link.name(),
                options.attempt_timeout
            ),
        }
        if attempt < options.max_attempts {
            sleep(options.delay).await;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockCamera;

    #[test]
    fn test_default_policy() {
        let options = ReconnectOptions::default();
        assert_eq!(options.max_attempts, 2);
        assert_eq!(options.delay, Duration::from_secs(1));
        assert_eq!(options.attempt_timeout, Duration::from_secs(5));
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_zero_attempts_invalid() {
        assert!(ReconnectOptions::default().max_attempts(0).validate().is_err());
        assert!(
            ReconnectOptions::default()
                .attempt_timeout(Duration::ZERO)
                .validate()
                .is_err()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_attempts_are_cut_short() {
        let camera = MockCamera::new("GoPro A");
        camera.set_connect_latency(Duration::from_secs(15));

        let start = tokio::time::Instant::now();
        assert!(!reconnect(&camera, &ReconnectOptions::default()).await);
        assert_eq!(camera.connect_attempts(), 2);
        // two 5 s attempts and the 1 s pause between them
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(11) && elapsed < Duration::from_secs(12));
        assert!(!camera.is_connected_sync());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_second_attempt() {
        let camera = MockCamera::new("GoPro A");
        camera.fail_next_connects(1);

        let start = tokio::time::Instant::now();
        assert!(reconnect(&camera, &ReconnectOptions::default()).await);
        assert_eq!(camera.connect_attempts(), 2);
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_gives_up() {
        let camera = MockCamera::new("GoPro A");
        camera.set_reachable(false);

        assert!(!reconnect(&camera, &ReconnectOptions::default()).await);
        assert_eq!(camera.connect_attempts(), 2);
    }
}
