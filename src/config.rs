//! Timing knobs for bounded waits and human-like pacing.
//!
//! Every wait in the pipeline carries an explicit deadline from here;
//! nothing blocks indefinitely. Tests construct these directly with
//! near-zero values to keep fixture runs fast.

use std::time::Duration;

/// Deadlines for page interactions.
#[derive(Debug, Clone)]
pub struct Timeouts {
    /// Initial navigation. Overrunning this is logged, not fatal.
    pub navigation: Duration,
    /// Appearance wait for the first review card on each page.
    pub page_ready: Duration,
    /// Per-selector appearance wait while dismissing consent banners.
    pub consent_attempt: Duration,
    /// Appearance wait for the next-page control.
    pub next_button: Duration,
    /// Ceiling on waiting out a challenge wall.
    pub challenge_ceiling: Duration,
    /// Poll cadence bounds while a challenge wall is up.
    pub challenge_poll_min: Duration,
    pub challenge_poll_max: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation: Duration::from_secs(60),
            page_ready: Duration::from_secs(15),
            consent_attempt: Duration::from_millis(1500),
            next_button: Duration::from_secs(3),
            challenge_ceiling: Duration::from_secs(120),
            challenge_poll_min: Duration::from_secs(1),
            challenge_poll_max: Duration::from_secs(2),
        }
    }
}

/// Uniform delay ranges applied after rate-limit-sensitive actions.
#[derive(Debug, Clone)]
pub struct Pacing {
    /// Minor actions: scroll steps, consent clicks.
    pub short_min: Duration,
    pub short_max: Duration,
    /// Page transitions after clicking a pagination control.
    pub page_min: Duration,
    pub page_max: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            short_min: Duration::from_millis(400),
            short_max: Duration::from_millis(1800),
            page_min: Duration::from_secs(2),
            page_max: Duration::from_secs(6),
        }
    }
}

impl Pacing {
    /// Zero-delay pacing for fixture-driven tests.
    pub fn immediate() -> Self {
        Self {
            short_min: Duration::ZERO,
            short_max: Duration::ZERO,
            page_min: Duration::ZERO,
            page_max: Duration::ZERO,
        }
    }
}
