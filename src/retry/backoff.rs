//! Backoff strategies.
//!
//! A [`Backoff`] maps a retry number (starting at 1) to a wait duration, or
//! `None` when no further retry should happen.

use rand::Rng;
use std::fmt::Debug;
use std::time::Duration;

pub trait Backoff: Send + Sync + Debug {
    fn next(&self, retry: u32) -> Option<Duration>;
}

/// Calculate exponential backoff delay with jitter.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    Duration::from_millis(capped_delay + jitter(capped_delay))
}

/// 0 to 10% of `delay_ms`.
fn jitter(delay_ms: u64) -> u64 {
    let range = delay_ms / 10;
    if range > 0 {
        rand::thread_rng().gen_range(0..range)
    } else {
        0
    }
}

/// Exponentially growing delays, capped at `max_ms`. Never gives up.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    base_ms: u64,
    max_ms: u64,
}

impl ExponentialBackoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base_ms: base.as_millis() as u64,
            max_ms: max.as_millis() as u64,
        }
    }
}

impl Backoff for ExponentialBackoff {
    fn next(&self, retry: u32) -> Option<Duration> {
        Some(calculate_backoff(retry, self.base_ms, self.max_ms))
    }
}

/// A fixed list of delays; stops once the list is exhausted.
#[derive(Debug, Clone)]
pub struct SimpleBackoff {
    ticks_ms: Vec<u64>,
    jitter: bool,
}

impl SimpleBackoff {
    pub fn new(ticks_ms: impl Into<Vec<u64>>) -> Self {
        Self {
            ticks_ms: ticks_ms.into(),
            jitter: false,
        }
    }

    /// Add up to 10% random jitter to every tick.
    pub fn with_jitter(mut self, enabled: bool) -> Self {
        self.jitter = enabled;
        self
    }
}

impl Backoff for SimpleBackoff {
    fn next(&self, retry: u32) -> Option<Duration> {
        let index = (retry as usize).checked_sub(1)?;
        let tick = *self.ticks_ms.get(index)?;
        let extra = if self.jitter { jitter(tick) } else { 0 };
        Some(Duration::from_millis(tick + extra))
    }
}

/// The same delay every time. Never gives up.
#[derive(Debug, Clone, Copy)]
pub struct ConstantBackoff {
    interval: Duration,
}

impl ConstantBackoff {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Backoff for ConstantBackoff {
    fn next(&self, _retry: u32) -> Option<Duration> {
        Some(self.interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculation() {
        let b1 = calculate_backoff(1, 100, 2000);
        assert!(b1.as_millis() >= 100);

        let b2 = calculate_backoff(2, 100, 2000);
        assert!(b2.as_millis() >= 200);

        let max = calculate_backoff(10, 100, 1000);
        assert!(max.as_millis() >= 1000 && max.as_millis() < 1100);

        assert_eq!(calculate_backoff(0, 100, 1000), Duration::ZERO);
    }

    #[test]
    fn test_simple_backoff_stops_after_ticks() {
        let b = SimpleBackoff::new(vec![1, 2, 3]);
        assert_eq!(b.next(0), None);
        assert_eq!(b.next(1), Some(Duration::from_millis(1)));
        assert_eq!(b.next(3), Some(Duration::from_millis(3)));
        assert_eq!(b.next(4), None);
    }

    #[test]
    fn test_simple_backoff_jitter_bounds() {
        let b = SimpleBackoff::new(vec![100]).with_jitter(true);
        let d = b.next(1).unwrap().as_millis();
        assert!((100..110).contains(&d));
    }

    #[test]
    fn test_unbounded_strategies() {
        let c = ConstantBackoff::new(Duration::from_millis(50));
        assert_eq!(c.next(1000), Some(Duration::from_millis(50)));

        let e = ExponentialBackoff::new(Duration::from_millis(10), Duration::from_millis(40));
        assert!(e.next(50).unwrap() >= Duration::from_millis(40));
    }
}
