//! Site adapters: review-listing URLs and per-site CSS selector sets.

/// Review sites the harvester knows how to walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    G2,
    Capterra,
    SourceForge,
}

/// CSS queries for one site's listing markup.
///
/// Each field is a selector list ordered from current markup to older
/// fallbacks; the first alternative that matches wins. Review-site
/// frontends churn constantly, so none of these are load-bearing
/// individually.
#[derive(Debug, Clone, Copy)]
pub struct Selectors {
    pub review_card: &'static str,
    pub title: &'static str,
    pub body: &'static str,
    pub date: &'static str,
    pub rating: Option<&'static str>,
    pub next_button: Option<&'static str>,
}

static G2_SELECTORS: Selectors = Selectors {
    review_card: "div.paper, div.review",
    title: "div.review-content__title a, a.review-title, h3, h4",
    body: "[itemprop='reviewBody'], div.review-body, div.review-content__body",
    date: "time, span.time-ago, span.display-date",
    rating: Some("meta[itemprop='ratingValue'], [data-test='star-rating'], div.stars, span[aria-label*='star']"),
    next_button: Some(
        "a[aria-label='Next'], a.pagination__next, a[rel='next'], button[aria-label='Next'], a.pagination__named-link.js-log-click",
    ),
};

static CAPTERRA_SELECTORS: Selectors = Selectors {
    review_card: "div.review-card, article[data-testid='review-card'], div[data-automation='review-card']",
    title: "h3.review-card-title, h3[data-testid='review-title'], h3",
    body: "div.review-card-text, div[data-testid='review-text'], [itemprop='reviewBody']",
    date: "div.review-card-date, time, span[data-testid='review-date']",
    rating: Some("div.star-rating, [data-testid='star-rating'], span[aria-label*='star']"),
    next_button: Some("button[aria-label='Next'], button.pagination-next, a[rel='next']"),
};

static SOURCEFORGE_SELECTORS: Selectors = Selectors {
    review_card: "section.topic, div.review, article.review",
    title: "p.lead, h3, h4, a.title",
    body: "div.content, div.review-body, div.body",
    date: "span.posted-date, time, span.date",
    rating: Some("div.stars, span[aria-label*='star'], [itemprop='ratingValue']"),
    next_button: Some("a.pagination-next, a[rel='next'], a[aria-label='Next'], button[aria-label='Next']"),
};

impl Source {
    pub const ALL: [Source; 3] = [Source::G2, Source::Capterra, Source::SourceForge];

    /// Parse a user-supplied source id, case-insensitively.
    pub fn from_id(id: &str) -> Option<Source> {
        match id.trim().to_ascii_lowercase().as_str() {
            "g2" => Some(Source::G2),
            "capterra" => Some(Source::Capterra),
            "sourceforge" => Some(Source::SourceForge),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::G2 => "g2",
            Source::Capterra => "capterra",
            Source::SourceForge => "sourceforge",
        }
    }

    pub fn selectors(&self) -> &'static Selectors {
        match self {
            Source::G2 => &G2_SELECTORS,
            Source::Capterra => &CAPTERRA_SELECTORS,
            Source::SourceForge => &SOURCEFORGE_SELECTORS,
        }
    }

    /// Review-listing URL for a company.
    ///
    /// Slugs are best-effort (lowercased, spaces to dashes). Capterra
    /// in particular often wants an internal product id in the path;
    /// the CLI's start-url override exists for exactly that case.
    pub fn reviews_url(&self, company: &str) -> String {
        let slug = company.trim().to_lowercase().replace(' ', "-");
        match self {
            Source::G2 => format!("https://www.g2.com/products/{slug}/reviews"),
            Source::Capterra => format!("https://www.capterra.com/p/{slug}/reviews"),
            Source::SourceForge => {
                format!("https://sourceforge.net/software/product/{slug}/reviews")
            }
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
