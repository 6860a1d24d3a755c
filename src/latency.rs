//! Round-trip latency classification.

use std::time::Duration;

/// Latency above which a probe is reported as slow.
pub const DEFAULT_SLOW_THRESHOLD: Duration = Duration::from_millis(138);

/// Latency above which a probe is reported as lag.
pub const DEFAULT_LAG_THRESHOLD: Duration = Duration::from_millis(400);

/// Severity tier of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatencyClass {
    /// At or below the slow threshold; not reported.
    Healthy,
    /// Above the slow threshold, at or below the lag threshold.
    Slow,
    /// Above the lag threshold.
    Lag,
}

/// Thresholds used to classify probe latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencyPolicy {
    pub slow_ms: i64,
    pub lag_ms: i64,
}

impl Default for LatencyPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_SLOW_THRESHOLD, DEFAULT_LAG_THRESHOLD)
    }
}

impl LatencyPolicy {
    pub fn new(slow: Duration, lag: Duration) -> Self {
        Self {
            slow_ms: slow.as_millis() as i64,
            lag_ms: lag.as_millis() as i64,
        }
    }

    /// Classify a latency in milliseconds. Total over all `i64` values.
    pub fn classify(&self, latency_ms: i64) -> LatencyClass {
        if latency_ms > self.lag_ms {
            LatencyClass::Lag
        } else if latency_ms > self.slow_ms {
            LatencyClass::Slow
        } else {
            LatencyClass::Healthy
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundaries() {
        let policy = LatencyPolicy::default();
        assert_eq!(policy.classify(138), LatencyClass::Healthy);
        assert_eq!(policy.classify(139), LatencyClass::Slow);
        assert_eq!(policy.classify(400), LatencyClass::Slow);
        assert_eq!(policy.classify(401), LatencyClass::Lag);
    }

    #[test]
    fn test_extremes() {
        let policy = LatencyPolicy::default();
        assert_eq!(policy.classify(0), LatencyClass::Healthy);
        assert_eq!(policy.classify(-20), LatencyClass::Healthy);
        assert_eq!(policy.classify(i64::MIN), LatencyClass::Healthy);
        assert_eq!(policy.classify(i64::MAX), LatencyClass::Lag);
    }

    #[test]
    fn test_custom_thresholds() {
        let policy = LatencyPolicy::new(Duration::from_millis(10), Duration::from_millis(20));
        assert_eq!(policy.classify(10), LatencyClass::Healthy);
        assert_eq!(policy.classify(15), LatencyClass::Slow);
        assert_eq!(policy.classify(21), LatencyClass::Lag);
    }
}
