//! Text formatting helpers shared by display code.

use std::time::Duration;

/// Render a cache age for display ("just now", "5m ago", "2h ago").
///
/// `None` means the collection was never fetched. Rounds half-up at the
/// hour and day boundaries so an age of 1h 40m reads as "2h ago".
pub fn age_display(age: Option<Duration>) -> String {
    let Some(age) = age else {
        return "never".to_string();
    };
    let minutes = age.as_secs() / 60;
    if minutes < 1 {
        "just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if minutes < 1440 {
        let hours = minutes / 60;
        let remaining_minutes = minutes % 60;
        if remaining_minutes >= 30 {
            format!("{}h ago", hours + 1)
        } else {
            format!("{}h ago", hours)
        }
    } else {
        let days = minutes / 1440;
        let remaining_hours = (minutes % 1440) / 60;
        if remaining_hours >= 12 {
            format!("{}d ago", days + 1)
        } else {
            format!("{}d ago", days)
        }
    }
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Format a signed coin amount with an explicit sign ("+25", "-10").
pub fn coin_delta(amount: i64) -> String {
    if amount >= 0 {
        format!("+{}", amount)
    } else {
        amount.to_string()
    }
}
