/// Render `timestamp` relative to `now` (both seconds since the epoch)
///
/// Produces phrases such as "Just now", "5 minutes ago", "Yesterday" or
/// "3 weeks ago". A timestamp in the future renders as an empty string.
///
/// # Example
/// ```ignore
/// assert_eq!(relative_time(1_000, 1_000 + 3 * 86_400), "3 days ago");
/// ```
pub fn relative_time(timestamp: i64, now: i64) -> String {
    let diff = now - timestamp;
    if diff < 0 {
        return String::new();
    }

    let days = diff / 86_400;
    let secs = diff % 86_400;

    if days == 0 {
        return match secs {
            0..=9 => "Just now".to_string(),
            10..=59 => format!("{} seconds ago", secs),
            60..=119 => "A minute ago".to_string(),
            120..=3_599 => format!("{} minutes ago", secs / 60),
            3_600..=7_199 => "An hour ago".to_string(),
            _ => format!("{} hours ago", secs / 3_600),
        };
    }

    match days {
        1 => "Yesterday".to_string(),
        2..=6 => format!("{} days ago", days),
        7..=30 => plural(days / 7, "week"),
        31..=364 => plural(days / 30, "month"),
        _ => plural(days / 365, "year"),
    }
}

fn plural(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("1 {} ago", unit)
    } else {
        format!("{} {}s ago", count, unit)
    }
}
