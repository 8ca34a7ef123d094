//! Relative date phrases used in diary queries.
//!
//! Accepts ISO dates (`2025-01-31`) and phrases such as "today",
//! "day before yesterday", "3 days ago", "2 days from now", "next week" and
//! "last week". Week phrases resolve to the Monday of that week.

use regex::Regex;
use std::sync::LazyLock;
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime};

static DAYS_OFFSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\s+days?\s+(ago|from now)$").expect("valid day offset pattern")
});

const SECONDS_PER_DAY: i64 = 86_400;

/// Current date in UTC.
pub fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

/// Resolve `input` relative to `today`. `None` when the phrase is not recognised.
pub fn resolve_date(input: &str, today: Date) -> Option<Date> {
    let phrase = input.trim().to_lowercase();
    let weekday = i64::from(today.weekday().number_days_from_monday());

    let resolved = match phrase.as_str() {
        "today" => Some(today),
        "tomorrow" => today.checked_add(Duration::days(1)),
        "yesterday" => today.checked_sub(Duration::days(1)),
        "day before yesterday" | "the day before yesterday" => {
            today.checked_sub(Duration::days(2))
        }
        "next week" => today.checked_add(Duration::days(7 - weekday)),
        "last week" => today.checked_sub(Duration::days(weekday + 7)),
        _ => None,
    };
    if resolved.is_some() {
        return resolved;
    }

    if let Some(captures) = DAYS_OFFSET.captures(&phrase) {
        let days: i64 = captures[1].parse().ok()?;
        let offset = Duration::seconds(days.checked_mul(SECONDS_PER_DAY)?);
        return match &captures[2] {
            "ago" => today.checked_sub(offset),
            _ => today.checked_add(offset),
        };
    }

    parse_iso_date(&phrase)
}

pub fn parse_iso_date(input: &str) -> Option<Date> {
    Date::parse(input, format_description!("[year]-[month]-[day]")).ok()
}

pub fn format_date(date: Date) -> String {
    // Formatting with a fixed description cannot fail for in-range dates
    date.format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| date.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    // A Wednesday
    const TODAY: Date = date!(2025 - 01 - 15);

    #[test]
    fn test_named_days() {
        assert_eq!(resolve_date("today", TODAY), Some(TODAY));
        assert_eq!(resolve_date("Tomorrow", TODAY), Some(date!(2025 - 01 - 16)));
        assert_eq!(resolve_date("yesterday", TODAY), Some(date!(2025 - 01 - 14)));
        assert_eq!(
            resolve_date("Day before yesterday", TODAY),
            Some(date!(2025 - 01 - 13))
        );
    }

    #[test]
    fn test_weeks() {
        assert_eq!(resolve_date("next week", TODAY), Some(date!(2025 - 01 - 20)));
        assert_eq!(resolve_date("last week", TODAY), Some(date!(2025 - 01 - 06)));
    }

    #[test]
    fn test_day_offsets() {
        assert_eq!(resolve_date("5 days ago", TODAY), Some(date!(2025 - 01 - 10)));
        assert_eq!(resolve_date("1 day ago", TODAY), Some(date!(2025 - 01 - 14)));
        assert_eq!(
            resolve_date("10 days from now", TODAY),
            Some(date!(2025 - 01 - 25))
        );
    }

    #[test]
    fn test_huge_day_offsets_resolve_to_nothing() {
        assert_eq!(resolve_date("200000000000000 days ago", TODAY), None);
        assert_eq!(resolve_date("200000000000000 days from now", TODAY), None);
        assert_eq!(resolve_date("10000000 days ago", TODAY), None);
        assert_eq!(resolve_date("99999999999999999999 days ago", TODAY), None);
    }

    #[test]
    fn test_iso_and_unknown() {
        assert_eq!(resolve_date("2024-12-31", TODAY), Some(date!(2024 - 12 - 31)));
        assert_eq!(resolve_date("someday", TODAY), None);
        assert_eq!(resolve_date("2024-13-01", TODAY), None);
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date(date!(2025 - 03 - 07)), "2025-03-07");
    }
}
