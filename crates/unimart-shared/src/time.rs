//! Timestamp labels used by the inbox and the chat view.

use chrono::{DateTime, Utc};

/// Inbox label: "Just now", "5m", "3h", "2d", then "Mar 4".
pub fn relative_label(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(then);
    let minutes = elapsed.num_minutes();
    let hours = elapsed.num_hours();
    let days = elapsed.num_days();

    if minutes < 1 {
        "Just now".to_string()
    } else if minutes < 60 {
        format!("{minutes}m")
    } else if hours < 24 {
        format!("{hours}h")
    } else if days < 7 {
        format!("{days}d")
    } else {
        then.format("%b %-d").to_string()
    }
}

/// Chat bubble label such as "3:07 PM"; pending messages show "Now".
pub fn clock_label(ts: Option<DateTime<Utc>>) -> String {
    match ts {
        Some(ts) => ts.format("%-I:%M %p").to_string(),
        None => "Now".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn relative_buckets() {
        let now = Utc.with_ymd_and_hms(2024, 3, 20, 12, 0, 0).unwrap();
        assert_eq!(relative_label(now - Duration::seconds(30), now), "Just now");
        assert_eq!(relative_label(now - Duration::minutes(5), now), "5m");
        assert_eq!(relative_label(now - Duration::minutes(59), now), "59m");
        assert_eq!(relative_label(now - Duration::hours(3), now), "3h");
        assert_eq!(relative_label(now - Duration::days(2), now), "2d");
        assert_eq!(relative_label(now - Duration::days(16), now), "Mar 4");
    }

    #[test]
    fn future_timestamps_read_as_just_now() {
        let now = Utc.with_ymd_and_hms(2024, 3, 20, 12, 0, 0).unwrap();
        assert_eq!(relative_label(now + Duration::minutes(3), now), "Just now");
    }

    #[test]
    fn clock_labels() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 20, 15, 7, 0).unwrap();
        assert_eq!(clock_label(Some(ts)), "3:07 PM");
        assert_eq!(clock_label(None), "Now");
    }
}
