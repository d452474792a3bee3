use std::time::Duration;

/// Quadratic backoff between dial attempts.
///
/// `wait(i) = i² + 2i + 2` units. The supervisor passes the 1-based number
/// of the attempt that just failed, so with the default one-second unit the
/// waits between attempts are 5s, 10s, 17s, 26s, ... No jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Length of one schedule step.
    pub unit: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            unit: Duration::from_secs(1),
        }
    }
}

impl BackoffPolicy {
    pub fn with_unit(unit: Duration) -> Self {
        Self { unit }
    }

    /// Wait to insert after failed attempt number `attempt`.
    pub fn wait(&self, attempt: u32) -> Duration {
        let i = u64::from(attempt);
        let steps = i
            .saturating_mul(i)
            .saturating_add(i.saturating_mul(2))
            .saturating_add(2);
        let steps = u32::try_from(steps).unwrap_or(u32::MAX);
        self.unit.saturating_mul(steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schedule_in_seconds() {
        let p = BackoffPolicy::default();
        assert_eq!(p.wait(0), Duration::from_secs(2));
        assert_eq!(p.wait(1), Duration::from_secs(5));
        assert_eq!(p.wait(2), Duration::from_secs(10));
        assert_eq!(p.wait(3), Duration::from_secs(17));
        assert_eq!(p.wait(4), Duration::from_secs(26));
    }

    #[test]
    fn schedule_is_strictly_increasing() {
        let p = BackoffPolicy::default();
        for i in 0..100 {
            assert!(p.wait(i + 1) > p.wait(i));
        }
    }

    #[test]
    fn unit_scales_schedule() {
        let p = BackoffPolicy::with_unit(Duration::from_millis(10));
        assert_eq!(p.wait(1), Duration::from_millis(50));
    }

    #[test]
    fn huge_index_saturates_instead_of_panicking() {
        let p = BackoffPolicy::default();
        let _ = p.wait(u32::MAX);
    }
}
