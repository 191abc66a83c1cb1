//! Core data types shared across the harvesting pipeline.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Inclusive calendar window a harvest run is constrained to.
///
/// Both bounds participate in membership checks, so a single-day range
/// (`start == end`) matches exactly that day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

/// Rejected range construction where the end bound precedes the start.
#[derive(Debug, Error)]
#[error("invalid date range: end {end} precedes start {start}")]
pub struct InvalidDateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Build a range from inclusive bounds, rejecting `end < start`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, InvalidDateRange> {
        if end < start {
            return Err(InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Inclusive on both ends.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// One extracted review.
///
/// Serialization preserves declaration order, and `date` renders as
/// ISO `YYYY-MM-DD`. `rating` holds the parsed value or the literal
/// `"N/A"`, never an empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub source: String,
    pub title: String,
    pub description: String,
    pub date: NaiveDate,
    pub rating: String,
}
