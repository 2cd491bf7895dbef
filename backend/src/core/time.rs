//! Simulated time
//!
//! All simulated times are `i64` milliseconds since midnight of the current
//! simulated day. A day is split into 48 half-hour intervals which are the
//! unit of every per-day time series.

/// Milliseconds per simulated day.
pub const DAY_MS: i64 = 86_400_000;

/// Milliseconds per half-hour interval.
pub const INTERVAL_MS: i64 = 1_800_000;

/// Number of half-hour intervals per day.
pub const INTERVAL_COUNT: usize = 48;

/// Time of the day-end guard event (24h + 1s).
pub const DAY_END_GUARD_MS: i64 = DAY_MS + 1_000;

/// Converts seconds (possibly fractional) to whole milliseconds.
///
/// # Example
/// ```
/// use callcenter_simulator_core_rs::core::time::seconds_to_ms;
///
/// assert_eq!(seconds_to_ms(1.5), 1_500);
/// assert_eq!(seconds_to_ms(30.0), 30_000);
/// ```
pub fn seconds_to_ms(seconds: f64) -> i64 {
    (seconds * 1000.0).round() as i64
}

/// Index of the half-hour interval containing `time_ms`, clamped to `0..48`.
///
/// # Example
/// ```
/// use callcenter_simulator_core_rs::core::time::interval_index;
///
/// assert_eq!(interval_index(0), 0);
/// assert_eq!(interval_index(1_799_999), 0);
/// assert_eq!(interval_index(1_800_000), 1);
/// assert_eq!(interval_index(-5), 0);
/// assert_eq!(interval_index(90_000_000), 47);
/// ```
pub fn interval_index(time_ms: i64) -> usize {
    if time_ms <= 0 {
        return 0;
    }
    ((time_ms / INTERVAL_MS) as usize).min(INTERVAL_COUNT - 1)
}

/// Formats a time of day as `HH:MM:SS`. Times past midnight keep counting hours.
///
/// # Example
/// ```
/// use callcenter_simulator_core_rs::core::time::format_clock;
///
/// assert_eq!(format_clock(0), "00:00:00");
/// assert_eq!(format_clock(34_200_000), "09:30:00");
/// assert_eq!(format_clock(86_401_000), "24:00:01");
/// ```
pub fn format_clock(time_ms: i64) -> String {
    let total_seconds = time_ms.max(0) / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_is_48_intervals() {
        assert_eq!(INTERVAL_MS * INTERVAL_COUNT as i64, DAY_MS);
    }

    #[test]
    fn test_interval_index_boundaries() {
        for i in 0..INTERVAL_COUNT {
            let start = i as i64 * INTERVAL_MS;
            assert_eq!(interval_index(start), i);
            assert_eq!(interval_index(start + INTERVAL_MS - 1), i);
        }
        assert_eq!(interval_index(DAY_MS), INTERVAL_COUNT - 1);
    }

    #[test]
    fn test_seconds_to_ms_rounds() {
        assert_eq!(seconds_to_ms(0.0004), 0);
        assert_eq!(seconds_to_ms(0.0006), 1);
    }
}
