//! Forced-start deadline owned by the buffer manager.

use std::time::Duration;

use tokio::time::Instant;

/// A cancellable one-shot deadline.
///
/// Holds no task or runtime resource: disarming simply forgets the
/// deadline, so a disarmed timer can never fire late.
#[derive(Debug, Default)]
pub struct StartTimer {
    deadline: Option<Instant>,
}

impl StartTimer {
    #[must_use]
    pub const fn new() -> Self {
        Self { deadline: None }
    }

    /// Arm to fire `after` from now, replacing any earlier deadline.
    pub fn arm(&mut self, after: Duration) {
        self.deadline = Some(Instant::now() + after);
    }

    /// Disarm. Returns whether the timer was armed.
    pub const fn disarm(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    #[must_use]
    pub const fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Resolves at the deadline. Never resolves while disarmed.
    pub async fn fired(&self) {
        match self.deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fires_at_deadline() {
        let mut timer = StartTimer::new();
        timer.arm(Duration::from_millis(5000));
        let started = Instant::now();
        timer.fired().await;
        assert_eq!(started.elapsed(), Duration::from_millis(5000));
    }

    #[tokio::test(start_paused = true)]
    async fn disarmed_timer_never_fires() {
        let mut timer = StartTimer::new();
        timer.arm(Duration::from_millis(10));
        assert!(timer.disarm());
        assert!(!timer.disarm());

        let fired = tokio::time::timeout(Duration::from_secs(60), timer.fired()).await;
        assert!(fired.is_err());
    }
}
