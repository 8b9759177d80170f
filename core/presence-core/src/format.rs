//! Human-readable time formatting shared by the tracker and the renderer.

use chrono::{DateTime, Local, Timelike, Utc};

/// Shown instead of a duration when the elapsed time is not positive.
pub const UNKNOWN_DURATION: &str = "??";

/// Marker for facts the provider has not told us yet.
pub const NO_DATA: &str = "no data";

/// Formats whole seconds as `Nd Mh`, `Nh Mm`, or `Nm`. Negative input counts as zero.
pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let minutes = seconds / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if days > 0 {
        format!("{}d {}h", days, hours % 24)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes % 60)
    } else {
        format!("{}m", minutes)
    }
}

/// Coarse "how long ago" text with thresholds at 60s, 60m and 24h.
pub fn format_relative(from: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = now.signed_duration_since(from).num_seconds().max(0);
    let minutes = seconds / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if seconds < 60 {
        "moments ago".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if hours < 24 {
        format!("{}h ago", hours)
    } else {
        format!("{}d ago", days)
    }
}

/// Buckets the gap in whole days (`today`, `yesterday`, `N days ago`) and
/// appends the local clock time of `at`.
pub fn format_last_login(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let days = now.signed_duration_since(at).num_days().max(0);
    let bucket = match days {
        0 => "today".to_string(),
        1 => "yesterday".to_string(),
        n => format!("{} days ago", n),
    };
    format!("{} at {}", bucket, format_clock(at))
}

/// Local `HH:MM` for a timestamp.
pub fn format_clock(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%H:%M").to_string()
}

/// `HH:00` label for an hour-of-day slot.
pub fn format_hour(hour: usize) -> String {
    format!("{:02}:00", hour)
}

/// Local hour of day (0..=23) used for histogram bucketing.
pub fn local_hour(at: DateTime<Utc>) -> usize {
    at.with_timezone(&Local).hour() as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_format_duration_minutes_only() {
        assert_eq!(format_duration(0), "0m");
        assert_eq!(format_duration(59), "0m");
        assert_eq!(format_duration(600), "10m");
        assert_eq!(format_duration(3599), "59m");
    }

    #[test]
    fn test_format_duration_hours_and_days() {
        assert_eq!(format_duration(3600), "1h 0m");
        assert_eq!(format_duration(3600 + 5 * 60), "1h 5m");
        assert_eq!(format_duration(86_400), "1d 0h");
        assert_eq!(format_duration(2 * 86_400 + 3 * 3600 + 59), "2d 3h");
    }

    #[test]
    fn test_format_duration_negative_clamps() {
        assert_eq!(format_duration(-30), "0m");
    }

    #[test]
    fn test_format_relative_tiers() {
        let now = Utc::now();
        assert_eq!(format_relative(now - Duration::seconds(59), now), "moments ago");
        assert_eq!(format_relative(now - Duration::seconds(60), now), "1m ago");
        assert_eq!(format_relative(now - Duration::minutes(59), now), "59m ago");
        assert_eq!(format_relative(now - Duration::minutes(60), now), "1h ago");
        assert_eq!(format_relative(now - Duration::hours(23), now), "23h ago");
        assert_eq!(format_relative(now - Duration::hours(49), now), "2d ago");
        assert_eq!(format_relative(now + Duration::hours(1), now), "moments ago");
    }

    #[test]
    fn test_format_last_login_buckets() {
        let now = Utc::now();
        let recent = now - Duration::hours(3);
        assert_eq!(
            format_last_login(recent, now),
            format!("today at {}", format_clock(recent))
        );
        let yesterday = now - Duration::hours(30);
        assert_eq!(
            format_last_login(yesterday, now),
            format!("yesterday at {}", format_clock(yesterday))
        );
        let older = now - Duration::days(5);
        assert_eq!(
            format_last_login(older, now),
            format!("5 days ago at {}", format_clock(older))
        );
    }

    #[test]
    fn test_format_hour_pads() {
        assert_eq!(format_hour(7), "07:00");
        assert_eq!(format_hour(23), "23:00");
    }

    #[test]
    fn test_local_hour_in_range() {
        assert!(local_hour(Utc::now()) < 24);
    }
}
