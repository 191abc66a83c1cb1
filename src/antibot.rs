//! Anti-automation mitigations: consent banners, challenge walls, and
//! human-like pacing.
//!
//! Nothing in here is allowed to fail a crawl. Probes swallow driver
//! errors, waits are bounded, and the worst case is always "proceed
//! and let the page loop discover there is nothing to extract".

use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{debug, info, warn};

use crate::config::{Pacing, Timeouts};
use crate::dom::PageDriver;

/// Accept-button candidates for common consent-management platforms,
/// tried in order. First successful click wins.
const CONSENT_SELECTORS: &[&str] = &[
    "button#onetrust-accept-btn-handler",
    "#truste-consent-button",
    "button[aria-label='Accept all']",
    "button[aria-label='Accept All']",
    "button[data-testid='uc-accept-all-button']",
    "button[id*='accept']",
    "button[class*='consent'][class*='accept']",
];

/// Markers that a challenge wall is being shown instead of content.
const CHALLENGE_SELECTORS: &[&str] = &[
    "iframe[src*='hcaptcha']",
    "iframe[src*='recaptcha']",
    "#challenge-stage",
    "#cf-challenge-running",
];

/// Result of a challenge-wall check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeOutcome {
    /// No challenge signals on the page.
    NotPresent,
    /// A challenge was present and went away within the ceiling.
    Cleared,
    /// The challenge outlived the ceiling. The crawl proceeds anyway
    /// and will stop naturally if no content renders.
    TimedOut,
}

/// Try to dismiss a consent banner, if one is up.
///
/// Each candidate selector gets one bounded appearance wait. Total
/// failure is silent; a banner that will not go away just means some
/// viewport pixels are wasted.
pub async fn dismiss_consent<D: PageDriver>(driver: &D, timeouts: &Timeouts, pacing: &Pacing) {
    for &selector in CONSENT_SELECTORS {
        let button = match driver.wait_for(selector, timeouts.consent_attempt).await {
            Ok(Some(button)) => button,
            Ok(None) => continue,
            Err(error) => {
                debug!("consent probe failed on {}: {}", selector, error);
                continue;
            }
        };
        match driver.click(&button).await {
            Ok(()) => {
                debug!("dismissed consent banner via {}", selector);
                pause_short(pacing).await;
                return;
            }
            Err(error) => debug!("consent click failed on {}: {}", selector, error),
        }
    }
}

/// Detect a challenge wall and, when present, poll at human-scale
/// intervals until it clears or the ceiling elapses.
///
/// Headful runs rely on the operator solving the challenge in the
/// browser window; this wait is what gives them the time to do it.
pub async fn wait_out_challenge<D: PageDriver>(
    driver: &D,
    timeouts: &Timeouts,
) -> ChallengeOutcome {
    let Some(signal) = challenge_signal(driver).await else {
        return ChallengeOutcome::NotPresent;
    };

    warn!(
        "challenge wall detected ({}); waiting up to {:?} for it to clear",
        signal, timeouts.challenge_ceiling
    );
    let deadline = Instant::now() + timeouts.challenge_ceiling;
    while Instant::now() < deadline {
        let pause = {
            let mut rng = rand::thread_rng();
            rng.gen_range(timeouts.challenge_poll_min..=timeouts.challenge_poll_max)
        };
        tokio::time::sleep(pause).await;
        if challenge_signal(driver).await.is_none() {
            info!("challenge cleared");
            return ChallengeOutcome::Cleared;
        }
    }

    warn!("challenge still up after the ceiling; proceeding");
    ChallengeOutcome::TimedOut
}

async fn challenge_signal<D: PageDriver>(driver: &D) -> Option<&'static str> {
    for &selector in CHALLENGE_SELECTORS {
        // Detection must never take a crawl down, so errors read as absence.
        match driver.query_all(selector).await {
            Ok(nodes) if !nodes.is_empty() => return Some(selector),
            _ => {}
        }
    }
    None
}

/// Nudge lazy-rendered content into the DOM with randomized scroll
/// steps. Also brings below-the-fold pagination controls into view.
pub async fn warm_up_scroll<D: PageDriver>(driver: &D, pacing: &Pacing, steps: usize) {
    for _ in 0..steps {
        let pixels = {
            let mut rng = rand::thread_rng();
            rng.gen_range(800..=1400)
        };
        if let Err(error) = driver.scroll_by(pixels).await {
            debug!("scroll step failed: {}", error);
            return;
        }
        pause_short(pacing).await;
    }
}

/// Short jittered pause after minor actions.
pub async fn pause_short(pacing: &Pacing) {
    sleep_between(pacing.short_min, pacing.short_max).await;
}

/// Longer jittered pause after a page transition.
pub async fn pause_page(pacing: &Pacing) {
    sleep_between(pacing.page_min, pacing.page_max).await;
}

async fn sleep_between(min: Duration, max: Duration) {
    // rng handles are not Send; sample before the await
    let pause = {
        let mut rng = rand::thread_rng();
        rng.gen_range(min..=max)
    };
    if !pause.is_zero() {
        tokio::time::sleep(pause).await;
    }
}
