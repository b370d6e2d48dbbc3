//! Wall-clock helpers for record and envelope timestamps.

/// Returns the current Unix timestamp in milliseconds.
pub fn now_timestamp_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_millis_are_recent() {
        // 2023-11-14 in milliseconds
        assert!(now_timestamp_millis() > 1_700_000_000_000);
    }
}
