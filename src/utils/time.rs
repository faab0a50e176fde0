use chrono::Utc;

/// Thirty days in seconds, the default raw price history window.
pub const THIRTY_DAYS_SECONDS: i64 = 60 * 60 * 24 * 30;

/// Current wall-clock time in whole unix seconds.
pub fn unix_now() -> i64 {
    Utc::now().timestamp()
}

/// Resolves optional bounds to `[now - 30 days, now]`, each independently.
pub fn default_window(from: Option<i64>, to: Option<i64>, now: i64) -> (i64, i64) {
    (from.unwrap_or(now - THIRTY_DAYS_SECONDS), to.unwrap_or(now))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_window_fills_each_bound_independently() {
        let now = 1_700_000_000;
        assert_eq!(default_window(None, None, now), (now - 2_592_000, now));
        assert_eq!(default_window(Some(5), None, now), (5, now));
        assert_eq!(default_window(None, Some(10), now), (now - 2_592_000, 10));
        assert_eq!(default_window(Some(1), Some(2), now), (1, 2));
    }
}
