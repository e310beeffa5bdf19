use chrono::{DateTime, NaiveDate};

/// Calendar day of a feed date. Feeds use RFC 2822, some use RFC 3339 or a bare date.
pub fn publish_day(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|dt| dt.date_naive())
        .ok()
        .or_else(|| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok())
}

/// `2023-04-15` style, as used by sitemap `lastmod`.
pub fn iso_day(raw: &str) -> Option<String> {
    publish_day(raw).map(|day| day.format("%Y-%m-%d").to_string())
}

/// `April 15, 2023` style for display.
pub fn display_date(raw: &str) -> Option<String> {
    publish_day(raw).map(|day| day.format("%B %-d, %Y").to_string())
}
