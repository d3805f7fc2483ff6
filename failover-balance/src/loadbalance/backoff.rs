use std::time::Duration;

/// 黄金分割比 (√5 + 1) / 2
pub const GOLDEN_RATIO: f64 = 1.618_033_988_749_895;

/// 退避策略
///
/// 等待时间为 `φ ^ (switch_count * failures_before_switching + failures_since_switch)` 毫秒，
/// 上限为 `max_backoff`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    failures_before_switching: u32,
    max_backoff: Duration,
}

impl BackoffPolicy {
    pub fn new(failures_before_switching: u32, max_backoff: Duration) -> Self {
        Self {
            failures_before_switching,
            max_backoff,
        }
    }

    /// 根据切换次数与当前节点上的失败次数计算等待时间
    pub fn delay(&self, switch_count: u32, failures_since_switch: u32) -> Duration {
        compute_delay(
            switch_count,
            failures_since_switch,
            self.failures_before_switching,
            self.max_backoff,
        )
    }

    pub fn max_backoff(&self) -> Duration {
        self.max_backoff
    }
}

pub fn compute_delay(
    switch_count: u32,
    failures_since_switch: u32,
    failures_before_switching: u32,
    max_backoff: Duration,
) -> Duration {
    let exponent = u64::from(switch_count)
        .saturating_mul(u64::from(failures_before_switching))
        .saturating_add(u64::from(failures_since_switch));

    let max_millis = u64::try_from(max_backoff.as_millis()).unwrap_or(u64::MAX);
    // 指数截断到 1024，φ^1024 仍是有限值且远大于任何上限
    let exponent = i32::try_from(exponent.min(1024)).unwrap_or(1024);
    let millis = GOLDEN_RATIO.powi(exponent).round();

    if !millis.is_finite() || millis >= max_millis as f64 {
        return max_backoff;
    }

    Duration::from_millis(millis as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: Duration = Duration::from_millis(3000);

    #[test]
    fn test_golden_ratio_constant() {
        assert!((GOLDEN_RATIO - (5f64.sqrt() + 1.0) / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_known_values() {
        assert_eq!(compute_delay(0, 0, 3, MAX), Duration::from_millis(1));
        assert_eq!(compute_delay(0, 1, 3, MAX), Duration::from_millis(2));
        assert_eq!(compute_delay(0, 2, 3, MAX), Duration::from_millis(3));
        assert_eq!(compute_delay(0, 3, 3, MAX), Duration::from_millis(4));
        // exponent = 1 * 3 + 2 = 5, φ^5 ≈ 11.09
        assert_eq!(compute_delay(1, 2, 3, MAX), Duration::from_millis(11));
        // exponent = 10, φ^10 ≈ 122.99
        assert_eq!(compute_delay(0, 10, 3, MAX), Duration::from_millis(123));
    }

    #[test]
    fn test_delay_is_capped() {
        assert_eq!(compute_delay(13, 3, 3, MAX), MAX);
        assert_eq!(compute_delay(u32::MAX, u32::MAX, u32::MAX, MAX), MAX);
        assert_eq!(compute_delay(5, 0, 3, Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn test_delay_is_monotonic_in_exponent() {
        let mut previous = Duration::ZERO;
        for exponent in 0..64 {
            let delay = compute_delay(0, exponent, 3, MAX);
            assert!(delay >= previous, "exponent {} decreased the delay", exponent);
            assert!(delay <= MAX);
            previous = delay;
        }
    }

    #[test]
    fn test_policy_uses_configured_threshold() {
        let policy = BackoffPolicy::new(3, MAX);
        assert_eq!(policy.delay(1, 2), compute_delay(1, 2, 3, MAX));
        assert_eq!(policy.max_backoff(), MAX);
    }
}
