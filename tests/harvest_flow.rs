//! Harvest Flow Tests
//!
//! Runs the full pagination state machine against static HTML fixtures
//! through a scraper-backed driver, with no browser involved.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};

use reviewharvest::config::{Pacing, Timeouts};
use reviewharvest::dom::{DomError, DomResult, PageDriver};
use reviewharvest::harvest::{Harvester, SkipCounts, StopReason};
use reviewharvest::models::DateRange;
use reviewharvest::sites::Source;

/// Static-HTML stand-in for a live page. Nodes are serialized element
/// fragments; clicking an element that carries `rel="next"` flips the
/// driver to the next fixture page. A page index marked broken makes
/// every query on it fail, and nodes carrying `data-detached` refuse
/// reads, mimicking a dropped devtools connection and a node that left
/// the DOM mid-extraction.
struct FixtureDriver {
    pages: Vec<String>,
    cursor: Arc<Mutex<usize>>,
    clicks: Arc<AtomicU32>,
    broken_page: Option<usize>,
}

impl FixtureDriver {
    fn new(pages: Vec<String>) -> Self {
        Self {
            pages,
            cursor: Arc::new(Mutex::new(0)),
            clicks: Arc::new(AtomicU32::new(0)),
            broken_page: None,
        }
    }

    /// Make every query fail once the walk reaches this page index.
    fn with_broken_page(mut self, index: usize) -> Self {
        self.broken_page = Some(index);
        self
    }

    fn current_page(&self) -> String {
        let cursor = *self.cursor.lock().unwrap();
        self.pages.get(cursor).cloned().unwrap_or_default()
    }

    fn select_in(html: &str, css: &str) -> DomResult<Vec<String>> {
        let selector = Selector::parse(css)
            .map_err(|error| DomError::Backend(format!("bad selector {css:?}: {error:?}")))?;
        let document = Html::parse_fragment(html);
        Ok(document.select(&selector).map(|el| el.html()).collect())
    }

    fn first_element(document: &Html) -> Option<ElementRef<'_>> {
        document
            .root_element()
            .children()
            .filter_map(ElementRef::wrap)
            .next()
    }
}

#[async_trait]
impl PageDriver for FixtureDriver {
    type Node = String;

    async fn goto(&self, _url: &str) -> DomResult<()> {
        *self.cursor.lock().unwrap() = 0;
        Ok(())
    }

    async fn query_all(&self, css: &str) -> DomResult<Vec<String>> {
        let cursor = *self.cursor.lock().unwrap();
        if self.broken_page == Some(cursor) {
            return Err(DomError::Backend("devtools connection dropped".into()));
        }
        Self::select_in(&self.current_page(), css)
    }

    async fn query_within(&self, node: &String, css: &str) -> DomResult<Vec<String>> {
        if node.contains("data-detached") {
            return Err(DomError::Backend("node detached from document".into()));
        }
        Self::select_in(node, css)
    }

    async fn text_of(&self, node: &String) -> DomResult<Option<String>> {
        let document = Html::parse_fragment(node);
        let text: String = document.root_element().text().collect();
        Ok((!text.trim().is_empty()).then_some(text))
    }

    async fn attr_of(&self, node: &String, name: &str) -> DomResult<Option<String>> {
        let document = Html::parse_fragment(node);
        Ok(Self::first_element(&document)
            .and_then(|element| element.value().attr(name))
            .map(str::to_string))
    }

    async fn click(&self, node: &String) -> DomResult<()> {
        self.clicks.fetch_add(1, Ordering::SeqCst);
        if node.contains(r#"rel="next""#) {
            let mut cursor = self.cursor.lock().unwrap();
            if *cursor + 1 < self.pages.len() {
                *cursor += 1;
            }
        }
        Ok(())
    }

    async fn scroll_by(&self, _pixels: u32) -> DomResult<()> {
        Ok(())
    }

    async fn wait_for(&self, css: &str, timeout: Duration) -> DomResult<Option<String>> {
        let deadline = Instant::now() + timeout;
        loop {
            let mut found = self.query_all(css).await?;
            if !found.is_empty() {
                return Ok(Some(found.remove(0)));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn fixture_timeouts() -> Timeouts {
    Timeouts {
        navigation: Duration::from_millis(50),
        page_ready: Duration::from_millis(50),
        consent_attempt: Duration::ZERO,
        next_button: Duration::from_millis(50),
        challenge_ceiling: Duration::from_millis(20),
        challenge_poll_min: Duration::from_millis(1),
        challenge_poll_max: Duration::from_millis(2),
    }
}

/// February through March 2024, relative dates anchored to April 10.
fn harvester(driver: FixtureDriver) -> Harvester<FixtureDriver> {
    let range = DateRange::new(day(2024, 2, 1), day(2024, 3, 31)).unwrap();
    Harvester::new(driver, Source::G2, range)
        .with_timeouts(fixture_timeouts())
        .with_pacing(Pacing::immediate())
        .with_reference_date(day(2024, 4, 10))
}

fn card(title: &str, date: &str, body: &str) -> String {
    format!(
        r#"<div class="review">
  <h3>{title}</h3>
  <time>{date}</time>
  <div class="review-body">{body}</div>
  <span aria-label="4.5 out of 5 stars"></span>
</div>"#
    )
}

fn page(cards: &[String], next_control: Option<&str>) -> String {
    let mut html = String::from("<div class=\"listing\">\n");
    for card in cards {
        html.push_str(card);
        html.push('\n');
    }
    if let Some(next_control) = next_control {
        html.push_str(next_control);
        html.push('\n');
    }
    html.push_str("</div>");
    html
}

const NEXT_LINK: &str = r#"<a rel="next" href="?page=2">Next</a>"#;

fn three_page_listing() -> Vec<String> {
    let undated = r#"<div class="review">
  <h3>No date here</h3>
  <div class="review-body">Still counts as a candidate.</div>
</div>"#
        .to_string();

    vec![
        page(
            &[
                card("Fast onboarding", "March 25, 2024", "Setup took an afternoon."),
                card("Solid search", "2 weeks ago", "Search latency dropped."),
                card("Too pricey now", "April 2, 2024", "The new tier pricing stings."),
                card("Clean exports", "March 18, 2024", "CSV and JSON both work."),
                card("Decent support", "Written on March 10, 2024", "Answers within a day."),
                undated,
                card("Works offline", "2024-03-05", "Sync catches up fine."),
            ],
            Some(NEXT_LINK),
        ),
        page(
            &[
                card("Keyboard driven", "February 20, 2024", "Muscle memory transfers."),
                card("Good importer", "Feb 10, 2024", "Moved 12k items cleanly."),
                card("First impressions", "February 1, 2024", "Day-one setup notes."),
                card("Legacy version", "January 25, 2024", "Predates the window."),
                card("Ancient install", "January 10, 2024", "Also predates it."),
            ],
            Some(NEXT_LINK),
        ),
        page(
            &[card("Should never surface", "January 5, 2024", "Past the stop page.")],
            None,
        ),
    ]
}

#[tokio::test]
async fn walks_pages_until_older_reviews_appear() {
    let report = harvester(FixtureDriver::new(three_page_listing()))
        .run("https://fixture.test/reviews")
        .await;

    assert_eq!(report.stop, StopReason::PassedRangeStart);
    assert_eq!(report.pages_visited, 2);

    let titles: Vec<&str> = report.records.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(
        titles,
        [
            "Fast onboarding",
            "Solid search",
            "Clean exports",
            "Decent support",
            "Works offline",
            "Keyboard driven",
            "Good importer",
            "First impressions",
        ]
    );
    assert_eq!(report.records.len(), 8);
    assert!(report
        .records
        .iter()
        .all(|r| r.date >= day(2024, 2, 1) && r.date <= day(2024, 3, 31)));

    let first = &report.records[0];
    assert_eq!(first.source, "g2");
    assert_eq!(first.date, day(2024, 3, 25));
    assert_eq!(first.description, "Setup took an afternoon.");
    assert_eq!(first.rating, "4.5");

    // "2 weeks ago" resolves against the anchored reference date.
    assert_eq!(report.records[1].date, day(2024, 3, 27));

    assert_eq!(
        report.skipped,
        SkipCounts {
            undated: 1,
            older_than_range: 2,
            newer_than_range: 1,
            malformed: 0,
        }
    );
}

#[tokio::test]
async fn keeps_reviews_on_both_window_edges() {
    let pages = vec![page(
        &[
            card("Edge start", "February 1, 2024", "Kept."),
            card("Edge end", "March 31, 2024", "Also kept."),
        ],
        None,
    )];
    let report = harvester(FixtureDriver::new(pages))
        .run("https://fixture.test/reviews")
        .await;

    assert_eq!(report.stop, StopReason::LastPage);
    assert_eq!(report.pages_visited, 1);
    assert_eq!(report.records.len(), 2);
    assert_eq!(report.records[0].date, day(2024, 2, 1));
    assert_eq!(report.records[1].date, day(2024, 3, 31));
    assert_eq!(report.skipped, SkipCounts::default());
}

#[tokio::test]
async fn rerun_after_renavigation_matches() {
    let harvester = harvester(FixtureDriver::new(three_page_listing()));

    let first = harvester.run("https://fixture.test/reviews").await;
    let second = harvester.run("https://fixture.test/reviews").await;

    assert_eq!(first.stop, second.stop);
    assert_eq!(first.pages_visited, second.pages_visited);
    assert_eq!(first.records, second.records);
}

#[tokio::test]
async fn datetime_attribute_and_rating_fallbacks_apply() {
    let attr_dated = r#"<div class="review">
  <h3>Attr dated</h3>
  <time datetime="2024-03-05"></time>
  <div class="review-body">Text-free time tag.</div>
</div>"#
        .to_string();
    let meta_rated = r#"<div class="review">
  <h3>Meta rated</h3>
  <time>March 6, 2024</time>
  <div class="review-body">Body.</div>
  <meta itemprop="ratingValue" content="4">
</div>"#
        .to_string();

    let report = harvester(FixtureDriver::new(vec![page(&[attr_dated, meta_rated], None)]))
        .run("https://fixture.test/reviews")
        .await;

    assert_eq!(report.records.len(), 2);
    assert_eq!(report.records[0].date, day(2024, 3, 5));
    assert_eq!(report.records[0].rating, "N/A");
    assert_eq!(report.records[1].rating, "4");
}

#[tokio::test]
async fn disabled_next_control_ends_the_walk() {
    let in_range = card("Only page", "March 12, 2024", "Nothing follows.");
    let trailing = page(&[card("Unreachable", "March 1, 2024", "Never visited.")], None);

    for next_control in [
        r#"<button aria-label="Next" disabled>Next</button>"#,
        r##"<a rel="next" aria-disabled="true" href="#">Next</a>"##,
    ] {
        let pages = vec![page(&[in_range.clone()], Some(next_control)), trailing.clone()];
        let report = harvester(FixtureDriver::new(pages))
            .run("https://fixture.test/reviews")
            .await;

        assert_eq!(report.stop, StopReason::LastPage);
        assert_eq!(report.pages_visited, 1);
        assert_eq!(report.records.len(), 1);
    }
}

#[tokio::test]
async fn empty_listing_reports_no_reviews() {
    let pages = vec![
        r#"<div class="content">
  <button id="onetrust-accept-btn-handler">Accept all</button>
  <p>Nothing rendered.</p>
</div>"#
            .to_string(),
    ];
    let driver = FixtureDriver::new(pages);
    let clicks = driver.clicks.clone();

    let report = harvester(driver).run("https://fixture.test/reviews").await;

    assert_eq!(report.stop, StopReason::NoReviews);
    assert_eq!(report.pages_visited, 0);
    assert!(report.records.is_empty());
    // The consent banner was the only thing worth clicking.
    assert_eq!(clicks.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unreadable_dates_are_skipped_not_fatal() {
    let gibberish = r#"<div class="review">
  <h3>Gibberish date</h3>
  <time>sometime back</time>
  <div class="review-body">Unparseable.</div>
</div>"#
        .to_string();
    let missing = r#"<div class="review">
  <h3>No date at all</h3>
  <div class="review-body">Skipped too.</div>
</div>"#
        .to_string();
    let pages = vec![page(
        &[card("Dated fine", "March 12, 2024", "Kept."), gibberish, missing],
        None,
    )];

    let report = harvester(FixtureDriver::new(pages))
        .run("https://fixture.test/reviews")
        .await;

    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].title, "Dated fine");
    assert_eq!(report.skipped.undated, 2);
    assert_eq!(report.stop, StopReason::LastPage);
}

#[tokio::test]
async fn backend_failure_mid_crawl_keeps_earlier_records() {
    let driver = FixtureDriver::new(three_page_listing()).with_broken_page(1);

    let report = harvester(driver).run("https://fixture.test/reviews").await;

    assert_eq!(report.stop, StopReason::BrowserFailure);
    assert_eq!(report.pages_visited, 1);

    // Everything page 1 yielded before the backend died is kept.
    let titles: Vec<&str> = report.records.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(
        titles,
        [
            "Fast onboarding",
            "Solid search",
            "Clean exports",
            "Decent support",
            "Works offline",
        ]
    );
    assert!(report
        .records
        .iter()
        .all(|r| r.date >= day(2024, 2, 1) && r.date <= day(2024, 3, 31)));
}

#[tokio::test]
async fn detached_candidate_is_dropped_without_sinking_neighbors() {
    let detached = r#"<div class="review" data-detached>
  <h3>Gone mid-read</h3>
  <time>March 8, 2024</time>
  <div class="review-body">The driver loses this node.</div>
</div>"#
        .to_string();
    let pages = vec![page(
        &[
            card("Before the casualty", "March 12, 2024", "Kept."),
            detached,
            card("After the casualty", "March 4, 2024", "Also kept."),
        ],
        None,
    )];

    let report = harvester(FixtureDriver::new(pages))
        .run("https://fixture.test/reviews")
        .await;

    assert_eq!(report.stop, StopReason::LastPage);
    let titles: Vec<&str> = report.records.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, ["Before the casualty", "After the casualty"]);
    assert_eq!(
        report.skipped,
        SkipCounts {
            malformed: 1,
            ..SkipCounts::default()
        }
    );
}

#[tokio::test]
async fn stubborn_challenge_wall_still_ends_cleanly() {
    let pages = vec![r#"<div id="challenge-stage">Verifying you are human.</div>"#.to_string()];

    let report = harvester(FixtureDriver::new(pages))
        .run("https://fixture.test/reviews")
        .await;

    assert_eq!(report.stop, StopReason::NoReviews);
    assert!(report.records.is_empty());
}
