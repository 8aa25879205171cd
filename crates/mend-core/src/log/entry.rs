//! Entry text convention.
//!
//! A stamped entry looks like:
//!
//! ```text
//! Tue, 1 Jul 2025 10:12:03 +0200 | MEND0.1.0//linux
//! ----------------------------------------------- (120 dashes)
//! <user text>
//! ```
//!
//! The codec never looks at this; only merge ordering reads the timestamp.

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, TimeZone};

/// Separator between the timestamp and the version tag.
pub const HEADER_SEPARATOR: &str = " | ";

/// Width of the rule line under the header.
pub const RULE_WIDTH: usize = 120;

/// Version tag written into every header.
pub fn version_tag() -> String {
    format!("MEND{}", crate::VERSION)
}

/// Platform tag written into every header.
pub fn platform_tag() -> &'static str {
    std::env::consts::OS
}

/// Prefix `text` with a header stamped at `now`.
pub fn stamp_entry<Tz: TimeZone>(text: &str, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "{}{}{}//{}\n{}\n{}",
        now.to_rfc2822(),
        HEADER_SEPARATOR,
        version_tag(),
        platform_tag(),
        "-".repeat(RULE_WIDTH),
        text
    )
}

/// Prefix `text` with a header stamped with the local time.
pub fn stamp_entry_now(text: &str) -> String {
    stamp_entry(text, &Local::now())
}

/// The leading timestamp of an entry, if it has a recognizable one.
///
/// The candidate is the text before the first header separator or newline.
/// RFC 2822, RFC 3339 and `%Y-%m-%d %H:%M:%S` (read as UTC) are accepted.
pub fn entry_timestamp(text: &str) -> Option<DateTime<FixedOffset>> {
    let line = text.split('\n').next().unwrap_or_default();
    let candidate = line
        .split(HEADER_SEPARATOR)
        .next()
        .unwrap_or_default()
        .trim();
    if candidate.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc2822(candidate) {
        return Some(parsed);
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(candidate) {
        return Some(parsed);
    }
    NaiveDateTime::parse_from_str(candidate, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc().fixed_offset())
}

/// The user text of a stamped entry, or the whole text if it has no header.
pub fn entry_body(text: &str) -> &str {
    let mut lines = text.splitn(3, '\n');
    match (lines.next(), lines.next(), lines.next()) {
        (Some(header), Some(rule), Some(body))
            if header.contains(HEADER_SEPARATOR) && is_rule(rule) =>
        {
            body
        }
        _ => text,
    }
}

fn is_rule(line: &str) -> bool {
    line.len() == RULE_WIDTH && line.bytes().all(|b| b == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Utc};

    #[test]
    fn test_stamp_layout() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 8, 30, 0).unwrap();
        let stamped = stamp_entry("hello", &now);
        let lines: Vec<&str> = stamped.split('\n').collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Sat, "));
        assert!(lines[0].contains("Mar 2024 08:30:00 +0000 | MEND"));
        assert!(lines[0].ends_with(&format!("//{}", platform_tag())));
        assert_eq!(lines[1], "-".repeat(RULE_WIDTH));
        assert_eq!(lines[2], "hello");
    }

    #[test]
    fn test_stamped_entry_timestamp_round_trip() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 8, 30, 0).unwrap();
        let parsed = entry_timestamp(&stamp_entry("x", &now)).unwrap();
        assert_eq!(parsed, now);
    }

    #[test]
    fn test_alternate_formats() {
        let rfc3339 = entry_timestamp("2024-01-02T03:04:05+01:00 | note").unwrap();
        assert_eq!(rfc3339.day(), 2);

        let plain = entry_timestamp("2024-01-02 03:04:05\nbody").unwrap();
        assert_eq!(plain, Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap());
    }

    #[test]
    fn test_dateless_text() {
        assert!(entry_timestamp("just some words").is_none());
        assert!(entry_timestamp("").is_none());
        assert!(entry_timestamp("\n2024-01-02 03:04:05").is_none());
    }

    #[test]
    fn test_entry_body() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 8, 30, 0).unwrap();
        assert_eq!(entry_body(&stamp_entry("line one\nline two", &now)), "line one\nline two");
        assert_eq!(entry_body("no header here"), "no header here");
    }

    #[test]
    fn test_stamp_now_is_parseable() {
        assert!(entry_timestamp(&stamp_entry_now("hi")).is_some());
    }
}
