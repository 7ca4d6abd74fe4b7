//! Time and timestamp utilities

/// Current Unix timestamp in milliseconds (wire timestamps)
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Milliseconds elapsed since `timestamp`, never negative
pub fn millis_since(timestamp: i64) -> f64 {
    (now_millis() - timestamp).max(0) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_millis_is_recent() {
        // 2020-01-01T00:00:00Z
        assert!(now_millis() > 1_577_836_800_000);
    }

    #[test]
    fn test_millis_since_clamps_future() {
        assert_eq!(millis_since(now_millis() + 60_000), 0.0);
        assert!(millis_since(now_millis() - 500) >= 500.0);
    }
}
