//! Abstract surface over a rendered page.
//!
//! The harvest controller only ever talks to a [`PageDriver`]. The
//! production implementation wraps a Chrome DevTools session; tests
//! substitute a fixture driver over static HTML, which is what keeps
//! the pagination state machine testable without a browser.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Failures surfaced by a page driver.
#[derive(Debug, Error)]
pub enum DomError {
    /// Navigation did not complete.
    #[error("navigation failed: {0}")]
    Navigation(String),
    /// The backend rejected or dropped a query or interaction.
    #[error("page backend error: {0}")]
    Backend(String),
}

pub type DomResult<T> = Result<T, DomError>;

/// Minimal capability set the harvester needs from a live page.
///
/// Node handles are opaque: queries hand them out and the remaining
/// methods operate on them. Absence is data, not failure. Query
/// methods return empty collections or `None` when nothing matches,
/// so every `Err` is a real backend fault.
#[async_trait]
pub trait PageDriver: Send + Sync {
    type Node: Send + Sync;

    /// Navigate the page to `url`.
    async fn goto(&self, url: &str) -> DomResult<()>;

    /// All elements currently matching `css`, in document order.
    async fn query_all(&self, css: &str) -> DomResult<Vec<Self::Node>>;

    /// Elements matching `css` inside `node`, in document order.
    async fn query_within(&self, node: &Self::Node, css: &str) -> DomResult<Vec<Self::Node>>;

    /// Rendered text content of `node`, if any.
    async fn text_of(&self, node: &Self::Node) -> DomResult<Option<String>>;

    /// Attribute value on `node`, if present.
    async fn attr_of(&self, node: &Self::Node, name: &str) -> DomResult<Option<String>>;

    /// Click `node`.
    async fn click(&self, node: &Self::Node) -> DomResult<()>;

    /// Scroll the viewport down by `pixels`.
    async fn scroll_by(&self, pixels: u32) -> DomResult<()>;

    /// Wait up to `timeout` for a `css` match to appear.
    ///
    /// Resolves to `Ok(None)` when the deadline expires without a
    /// match.
    async fn wait_for(&self, css: &str, timeout: Duration) -> DomResult<Option<Self::Node>>;
}
