//! Extraction and pagination controller.
//!
//! One browser page, one listing walk: wait for cards, classify every
//! candidate on the page against the date range, then either advance
//! through the pagination control or stop. The controller never trusts
//! the page. Markup is allowed to be missing, reordered, or broken,
//! and the answer to all of it is a verdict or a stop reason, not an
//! error.

use std::sync::LazyLock;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::antibot::{self, ChallengeOutcome};
use crate::config::{Pacing, Timeouts};
use crate::dates;
use crate::dom::{DomResult, PageDriver};
use crate::models::{DateRange, ReviewRecord};
use crate::sites::{Selectors, Source};

/// Placeholder rating for candidates without a readable one.
const RATING_FALLBACK: &str = "N/A";

/// Why a crawl stopped walking pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// No review cards rendered within the readiness deadline.
    NoReviews,
    /// A candidate predating the range start was seen. Listings are
    /// newest-first often enough that later pages would only be older;
    /// the current page is still processed in full before stopping.
    PassedRangeStart,
    /// The next-page control was missing, disabled, or refused the
    /// click.
    LastPage,
    /// The page backend failed at page granularity. Records collected
    /// before the failure survive.
    BrowserFailure,
}

impl StopReason {
    pub fn describe(&self) -> &'static str {
        match self {
            StopReason::NoReviews => "no reviews detected",
            StopReason::PassedRangeStart => "reached reviews older than the range",
            StopReason::LastPage => "no further pages",
            StopReason::BrowserFailure => "browser failure",
        }
    }
}

/// Per-candidate classification, decided before any extraction work.
#[derive(Debug)]
pub enum CardVerdict {
    /// In range; carries the extracted record.
    Keep(ReviewRecord),
    /// Dated before the range start. Raises the stop flag.
    TooOld,
    /// Dated after the range end.
    TooRecent,
    /// No date found, or the date text resisted normalization.
    Undated,
    /// The driver failed while reading this candidate. Neighbors are
    /// unaffected.
    Malformed,
}

/// Skip tallies for one crawl.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SkipCounts {
    pub undated: u32,
    pub older_than_range: u32,
    pub newer_than_range: u32,
    pub malformed: u32,
}

/// Everything a finished crawl has to say for itself.
#[derive(Debug)]
pub struct HarvestReport {
    pub records: Vec<ReviewRecord>,
    pub pages_visited: u32,
    pub skipped: SkipCounts,
    pub stop: StopReason,
}

/// Page-by-page review extractor, generic over the page driver so the
/// same state machine runs against live Chrome and static fixtures.
pub struct Harvester<D: PageDriver> {
    driver: D,
    source: Source,
    selectors: &'static Selectors,
    range: DateRange,
    timeouts: Timeouts,
    pacing: Pacing,
    settle: Option<Duration>,
    today: NaiveDate,
}

impl<D: PageDriver> Harvester<D> {
    pub fn new(driver: D, source: Source, range: DateRange) -> Self {
        Self {
            driver,
            source,
            selectors: source.selectors(),
            range,
            timeouts: Timeouts::default(),
            pacing: Pacing::default(),
            settle: None,
            today: Utc::now().date_naive(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Extra settle time after the initial navigation, for manual
    /// challenge solving or logging in.
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = Some(settle);
        self
    }

    /// Anchor relative date phrases to a fixed day instead of the
    /// current one. Fixture tests depend on this.
    pub fn with_reference_date(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// Walk listing pages from `start_url` until a stop condition.
    ///
    /// Infallible by design: every failure mode converts into a
    /// [`StopReason`], and whatever records were collected up to that
    /// point ride along in the report.
    pub async fn run(&self, start_url: &str) -> HarvestReport {
        let mut records = Vec::new();
        let mut skipped = SkipCounts::default();
        let mut pages_visited = 0u32;

        info!("navigating to {}", start_url);
        if let Err(error) = self.driver.goto(start_url).await {
            // Heavy pages overrun their deadline and still render; let
            // the readiness wait below make the call.
            warn!("initial navigation did not complete cleanly: {}", error);
        }

        if let Some(settle) = self.settle {
            info!("settling {}s for manual intervention", settle.as_secs());
            tokio::time::sleep(settle).await;
        }

        antibot::dismiss_consent(&self.driver, &self.timeouts, &self.pacing).await;
        antibot::warm_up_scroll(&self.driver, &self.pacing, 5).await;

        let mut older_seen = false;
        let stop = loop {
            if let ChallengeOutcome::TimedOut =
                antibot::wait_out_challenge(&self.driver, &self.timeouts).await
            {
                debug!("continuing despite an unresolved challenge");
            }

            let first_card = match self
                .driver
                .wait_for(self.selectors.review_card, self.timeouts.page_ready)
                .await
            {
                Ok(found) => found,
                Err(error) => {
                    warn!("page readiness probe failed: {}", error);
                    break StopReason::BrowserFailure;
                }
            };
            if first_card.is_none() {
                break StopReason::NoReviews;
            }

            let cards = match self.driver.query_all(self.selectors.review_card).await {
                Ok(cards) => cards,
                Err(error) => {
                    warn!("candidate enumeration failed: {}", error);
                    break StopReason::BrowserFailure;
                }
            };
            if cards.is_empty() {
                break StopReason::NoReviews;
            }

            pages_visited += 1;
            info!("page {}: {} review candidates", pages_visited, cards.len());

            for card in &cards {
                match self.classify(card).await {
                    CardVerdict::Keep(record) => records.push(record),
                    CardVerdict::TooOld => {
                        older_seen = true;
                        skipped.older_than_range += 1;
                    }
                    CardVerdict::TooRecent => skipped.newer_than_range += 1,
                    CardVerdict::Undated => skipped.undated += 1,
                    CardVerdict::Malformed => skipped.malformed += 1,
                }
            }

            if older_seen {
                break StopReason::PassedRangeStart;
            }
            if !self.advance().await {
                break StopReason::LastPage;
            }
            antibot::pause_page(&self.pacing).await;
        };

        info!(
            "harvest stopped after {} page(s): {} ({} records)",
            pages_visited,
            stop.describe(),
            records.len()
        );
        HarvestReport {
            records,
            pages_visited,
            skipped,
            stop,
        }
    }

    /// Classify one candidate. Date first: candidates without a usable
    /// date are skipped before any extraction effort.
    async fn classify(&self, card: &D::Node) -> CardVerdict {
        let raw_date = match self.date_text(card).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return CardVerdict::Undated,
            Err(error) => {
                debug!("candidate dropped, date read failed: {}", error);
                return CardVerdict::Malformed;
            }
        };

        let Some(date) = dates::normalize(&raw_date, self.today) else {
            debug!("candidate dropped, unrecognized date text {:?}", raw_date);
            return CardVerdict::Undated;
        };

        if date < self.range.start() {
            return CardVerdict::TooOld;
        }
        if !self.range.contains(date) {
            return CardVerdict::TooRecent;
        }

        let title = self
            .first_text(card, self.selectors.title)
            .await
            .unwrap_or_default();
        let description = self
            .first_text(card, self.selectors.body)
            .await
            .unwrap_or_default();
        let rating = self.rating_of(card).await;

        CardVerdict::Keep(ReviewRecord {
            source: self.source.as_str().to_string(),
            title,
            description,
            date,
            rating,
        })
    }

    /// Visible date text, falling back to the `datetime` attribute
    /// `<time>` elements carry.
    async fn date_text(&self, card: &D::Node) -> DomResult<Option<String>> {
        let nodes = self.driver.query_within(card, self.selectors.date).await?;
        let Some(node) = nodes.first() else {
            return Ok(None);
        };
        if let Some(text) = self.driver.text_of(node).await? {
            let text = collapse_whitespace(&text);
            if !text.is_empty() {
                return Ok(Some(text));
            }
        }
        Ok(self
            .driver
            .attr_of(node, "datetime")
            .await?
            .filter(|value| !value.trim().is_empty()))
    }

    /// First matching element's collapsed text. Read failures count as
    /// absence so one broken field cannot sink the candidate.
    async fn first_text(&self, card: &D::Node, css: &str) -> Option<String> {
        let nodes = self.driver.query_within(card, css).await.ok()?;
        let node = nodes.first()?;
        let text = self.driver.text_of(node).await.ok()??;
        let text = collapse_whitespace(&text);
        (!text.is_empty()).then_some(text)
    }

    async fn rating_of(&self, card: &D::Node) -> String {
        let Some(selector) = self.selectors.rating else {
            return RATING_FALLBACK.to_string();
        };
        let Ok(nodes) = self.driver.query_within(card, selector).await else {
            return RATING_FALLBACK.to_string();
        };
        let Some(node) = nodes.first() else {
            return RATING_FALLBACK.to_string();
        };

        if let Ok(Some(label)) = self.driver.attr_of(node, "aria-label").await {
            if let Some(value) = rating_from_label(&label) {
                return value;
            }
        }
        // meta[itemprop=ratingValue] keeps the number in `content`
        if let Ok(Some(content)) = self.driver.attr_of(node, "content").await {
            if let Some(value) = bare_number(&content) {
                return value;
            }
        }
        if let Ok(Some(text)) = self.driver.text_of(node).await {
            let text = collapse_whitespace(&text);
            if !text.is_empty() {
                return text;
            }
        }
        RATING_FALLBACK.to_string()
    }

    /// Move to the next listing page. Every way this can go wrong
    /// reads as "no further pages".
    async fn advance(&self) -> bool {
        let Some(selector) = self.selectors.next_button else {
            return false;
        };

        // The control usually sits below the last card.
        antibot::warm_up_scroll(&self.driver, &self.pacing, 2).await;

        let button = match self
            .driver
            .wait_for(selector, self.timeouts.next_button)
            .await
        {
            Ok(Some(button)) => button,
            Ok(None) => return false,
            Err(error) => {
                debug!("next-control probe failed: {}", error);
                return false;
            }
        };

        if self.is_disabled(&button).await {
            debug!("next control present but disabled");
            return false;
        }

        match self.driver.click(&button).await {
            Ok(()) => true,
            Err(error) => {
                debug!("next-control click failed: {}", error);
                false
            }
        }
    }

    async fn is_disabled(&self, button: &D::Node) -> bool {
        match self.driver.attr_of(button, "disabled").await {
            Ok(Some(_)) => return true,
            Ok(None) => {}
            Err(_) => return true,
        }
        matches!(
            self.driver.attr_of(button, "aria-disabled").await,
            Ok(Some(value)) if value.eq_ignore_ascii_case("true")
        )
    }
}

static RATING_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)([0-9]+(?:\.[0-9]+)?)\s*out of\s*[0-9]+(?:\.[0-9]+)?").unwrap()
});

static BARE_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([0-9]+(?:\.[0-9]+)?)\s*$").unwrap());

/// Pull the score out of "4.5 out of 5 stars" style labels.
fn rating_from_label(label: &str) -> Option<String> {
    RATING_LABEL_RE
        .captures(label)
        .map(|caps| caps[1].to_string())
}

fn bare_number(value: &str) -> Option<String> {
    BARE_NUMBER_RE
        .captures(value)
        .map(|caps| caps[1].to_string())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
