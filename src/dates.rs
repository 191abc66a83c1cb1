//! Review date normalization.
//!
//! Listing pages render dates in whatever shape the site's frontend
//! happens to emit: absolute strings ("March 3, 2024"), machine
//! timestamps from `<time datetime="...">` attributes, or relative
//! phrases ("2 days ago"). Everything funnels through [`normalize`],
//! which resolves to a calendar date or gives up with `None`.

use std::sync::LazyLock;

use chrono::{Datelike, Days, Months, NaiveDate};
use regex::Regex;

/// Boilerplate lead-ins some sites prepend to the visible date.
static PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:written|posted|reviewed|updated)\s+on\b[:\s]*").unwrap()
});

/// Relative phrases, matched after lowercasing.
static RELATIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(a|an|one|\d+)\s+(second|minute|hour|day|week|month|year)s?\s+ago$").unwrap()
});

/// Absolute date shapes paired with a format tag understood by
/// `parse_captured_date`. Order matters: more specific shapes first.
static DATE_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        // 2024-03-03, 2024/03/03, plus timestamp tails like T10:11:12Z
        (
            Regex::new(r"^(\d{4})[-/](\d{1,2})[-/](\d{1,2})(?:[T\s].*)?$").unwrap(),
            "ymd",
        ),
        // 03/03/2024 (month first, with a day-first retry for 15/03/2024)
        (
            Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4})$").unwrap(),
            "mdy",
        ),
        // March 3, 2024 / Mar. 3 2024 / March 3rd, 2024
        (
            Regex::new(r"^([A-Za-z]+)\.?\s+(\d{1,2})(?:st|nd|rd|th)?\s*,?\s*(\d{4})$").unwrap(),
            "month_dy",
        ),
        // 3 March 2024 / 3rd Mar, 2024
        (
            Regex::new(r"^(\d{1,2})(?:st|nd|rd|th)?\s+([A-Za-z]+)\.?\s*,?\s*(\d{4})$").unwrap(),
            "d_month_y",
        ),
        // March 2024 (month granularity resolves to the first)
        (
            Regex::new(r"^([A-Za-z]+)\.?\s*,?\s+(\d{4})$").unwrap(),
            "month_y",
        ),
    ]
});

/// Resolve raw date text to a calendar date.
///
/// `today` anchors relative phrases. Returns `None` for empty or
/// unrecognized input; callers are expected to skip such candidates
/// rather than guess.
pub fn normalize(raw: &str, today: NaiveDate) -> Option<NaiveDate> {
    let stripped = PREFIX_RE.replace(raw.trim(), "");
    let text = stripped.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(date) = parse_relative(text, today) {
        return Some(date);
    }

    for (pattern, format) in DATE_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(text) {
            if let Some(date) = parse_captured_date(&caps, format) {
                return Some(date);
            }
        }
    }

    None
}

fn parse_relative(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let lowered = text.to_ascii_lowercase();
    match lowered.as_str() {
        "today" | "just now" => return Some(today),
        "yesterday" => return today.checked_sub_days(Days::new(1)),
        _ => {}
    }

    let caps = RELATIVE_RE.captures(&lowered)?;
    let count: u64 = match caps.get(1)?.as_str() {
        "a" | "an" | "one" => 1,
        digits => digits.parse().ok()?,
    };
    match caps.get(2)?.as_str() {
        // sub-day granularity collapses to the anchor day
        "second" | "minute" | "hour" => Some(today),
        "day" => today.checked_sub_days(Days::new(count)),
        "week" => today.checked_sub_days(Days::new(count.checked_mul(7)?)),
        "month" => today.checked_sub_months(Months::new(u32::try_from(count).ok()?)),
        "year" => {
            let months = u32::try_from(count).ok()?.checked_mul(12)?;
            today.checked_sub_months(Months::new(months))
        }
        _ => None,
    }
}

fn parse_captured_date(caps: &regex::Captures<'_>, format: &str) -> Option<NaiveDate> {
    let field = |index: usize| caps.get(index).map(|m| m.as_str());

    let date = match format {
        "ymd" => NaiveDate::from_ymd_opt(
            field(1)?.parse().ok()?,
            field(2)?.parse().ok()?,
            field(3)?.parse().ok()?,
        )?,
        "mdy" => {
            let first: u32 = field(1)?.parse().ok()?;
            let second: u32 = field(2)?.parse().ok()?;
            let year: i32 = field(3)?.parse().ok()?;
            NaiveDate::from_ymd_opt(year, first, second)
                .or_else(|| NaiveDate::from_ymd_opt(year, second, first))?
        }
        "month_dy" => NaiveDate::from_ymd_opt(
            field(3)?.parse().ok()?,
            month_number(field(1)?)?,
            field(2)?.parse().ok()?,
        )?,
        "d_month_y" => NaiveDate::from_ymd_opt(
            field(3)?.parse().ok()?,
            month_number(field(2)?)?,
            field(1)?.parse().ok()?,
        )?,
        "month_y" => NaiveDate::from_ymd_opt(field(2)?.parse().ok()?, month_number(field(1)?)?, 1)?,
        _ => return None,
    };

    // Reject years no review site could plausibly emit.
    if (1900..=2100).contains(&date.year()) {
        Some(date)
    } else {
        None
    }
}

fn month_number(name: &str) -> Option<u32> {
    let lowered = name.to_ascii_lowercase();
    let prefix = lowered.get(..3)?;
    let month = match prefix {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}
