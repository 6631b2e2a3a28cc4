use rand::Rng;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Longest interval a pacer will hold between two requests.
pub const MAX_INTERVAL: Duration = Duration::from_secs(3600);

/// Enforces a randomised minimum interval between successive outbound
/// requests. The first call never waits.
#[derive(Debug)]
pub struct Pacer {
    min: Duration,
    max: Duration,
    last: Mutex<Option<Instant>>,
}

impl Pacer {
    pub fn new(min: Duration, max: Duration) -> Self {
        let (min, max) = if max < min { (max, min) } else { (min, max) };
        Self {
            min,
            max,
            last: Mutex::new(None),
        }
    }

    /// Negative and NaN bounds become zero; infinite or oversized ones are
    /// capped at `MAX_INTERVAL`.
    pub fn from_secs_f32(min: f32, max: f32) -> Self {
        Self::new(bounded_interval(min), bounded_interval(max))
    }

    pub fn disabled() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    fn random_interval(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        let secs = rand::rng().random_range(self.min.as_secs_f64()..=self.max.as_secs_f64());
        Duration::from_secs_f64(secs)
    }

    /// Sleeps until the chosen interval since the previous call has elapsed,
    /// then records the new request time.
    pub async fn wait(&self) {
        let delay = {
            let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
            let now = Instant::now();
            let delay = match *last {
                Some(previous) => self
                    .random_interval()
                    .saturating_sub(now.saturating_duration_since(previous)),
                None => Duration::ZERO,
            };
            *last = Some(now + delay);
            delay
        };

        if !delay.is_zero() {
            debug!("Pacing: sleeping {:?} before next request", delay);
            tokio::time::sleep(delay).await;
        }
    }
}

fn bounded_interval(secs: f32) -> Duration {
    Duration::try_from_secs_f32(secs.max(0.0)).map_or(MAX_INTERVAL, |d| d.min(MAX_INTERVAL))
}

impl Default for Pacer {
    fn default() -> Self {
        Self::disabled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_wait_is_immediate() {
        let pacer = Pacer::new(Duration::from_secs(5), Duration::from_secs(5));
        let start = tokio::time::Instant::now();
        pacer.wait().await;
        assert!(start.elapsed() < Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_wait_respects_minimum_interval() {
        let pacer = Pacer::new(Duration::from_secs(2), Duration::from_secs(3));
        pacer.wait().await;
        let start = tokio::time::Instant::now();
        pacer.wait().await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1900), "waited only {:?}", elapsed);
        assert!(elapsed <= Duration::from_secs(3) + Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_disabled_pacer_never_sleeps() {
        let pacer = Pacer::disabled();
        let start = std::time::Instant::now();
        for _ in 0..5 {
            pacer.wait().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn test_out_of_range_seconds_are_bounded() {
        let pacer = Pacer::from_secs_f32(f32::NAN, f32::INFINITY);
        assert_eq!(pacer.min, Duration::ZERO);
        assert_eq!(pacer.max, MAX_INTERVAL);

        let pacer = Pacer::from_secs_f32(-3.0, 1e30);
        assert_eq!(pacer.min, Duration::ZERO);
        assert_eq!(pacer.max, MAX_INTERVAL);

        let pacer = Pacer::from_secs_f32(0.5, 1.5);
        assert_eq!(pacer.min, Duration::from_millis(500));
        assert_eq!(pacer.max, Duration::from_millis(1500));
    }

    #[test]
    fn test_swapped_bounds_are_normalised() {
        let pacer = Pacer::new(Duration::from_secs(3), Duration::from_secs(1));
        let interval = pacer.random_interval();
        assert!(interval >= Duration::from_secs(1) && interval <= Duration::from_secs(3));
    }
}
