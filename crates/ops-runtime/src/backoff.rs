//! Exponential retry backoff.

/// Delay before the k-th retry (k = number of failures so far, 1-based):
/// `min(base * 2^(k-1), max)`.
pub fn retry_delay_ms(failure_count: u32, base_ms: u64, max_ms: u64) -> u64 {
    if failure_count == 0 {
        return 0;
    }
    let shift = (failure_count - 1).min(32);
    base_ms.saturating_mul(1u64 << shift).min(max_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_schedule() {
        assert_eq!(retry_delay_ms(1, 2_000, 30_000), 2_000);
        assert_eq!(retry_delay_ms(2, 2_000, 30_000), 4_000);
        assert_eq!(retry_delay_ms(3, 2_000, 30_000), 8_000);
        assert_eq!(retry_delay_ms(4, 2_000, 30_000), 16_000);
        assert_eq!(retry_delay_ms(5, 2_000, 30_000), 30_000);
        assert_eq!(retry_delay_ms(50, 2_000, 30_000), 30_000);
    }

    #[test]
    fn zero_failures_means_no_delay() {
        assert_eq!(retry_delay_ms(0, 2_000, 30_000), 0);
    }
}
