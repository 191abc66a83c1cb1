//! Live-Chrome implementation of the page driver.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::element::Element;
use chromiumoxide::Page;

use crate::dom::{DomError, DomResult, PageDriver};

/// How often appearance waits re-query the page.
const WAIT_POLL: Duration = Duration::from_millis(250);

/// [`PageDriver`] over one CDP page.
///
/// Queries go through `querySelectorAll`, which keeps "no match" an
/// empty result instead of a protocol error; everything else that goes
/// wrong here is a genuine backend fault.
pub struct CdpDriver {
    page: Page,
    navigation_timeout: Duration,
}

impl CdpDriver {
    pub fn new(page: Page, navigation_timeout: Duration) -> Self {
        Self {
            page,
            navigation_timeout,
        }
    }
}

fn backend(error: impl std::fmt::Display) -> DomError {
    DomError::Backend(error.to_string())
}

#[async_trait]
impl PageDriver for CdpDriver {
    type Node = Element;

    async fn goto(&self, url: &str) -> DomResult<()> {
        match tokio::time::timeout(self.navigation_timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(error)) => Err(DomError::Navigation(error.to_string())),
            Err(_) => Err(DomError::Navigation(format!(
                "timed out after {:?}",
                self.navigation_timeout
            ))),
        }
    }

    async fn query_all(&self, css: &str) -> DomResult<Vec<Element>> {
        self.page.find_elements(css).await.map_err(backend)
    }

    async fn query_within(&self, node: &Element, css: &str) -> DomResult<Vec<Element>> {
        node.find_elements(css).await.map_err(backend)
    }

    async fn text_of(&self, node: &Element) -> DomResult<Option<String>> {
        node.inner_text().await.map_err(backend)
    }

    async fn attr_of(&self, node: &Element, name: &str) -> DomResult<Option<String>> {
        node.attribute(name).await.map_err(backend)
    }

    async fn click(&self, node: &Element) -> DomResult<()> {
        node.click().await.map(|_| ()).map_err(backend)
    }

    async fn scroll_by(&self, pixels: u32) -> DomResult<()> {
        let script = format!("window.scrollBy(0, {});", pixels);
        self.page.evaluate(script).await.map(|_| ()).map_err(backend)
    }

    async fn wait_for(&self, css: &str, timeout: Duration) -> DomResult<Option<Element>> {
        let deadline = Instant::now() + timeout;
        loop {
            let mut matches = self.page.find_elements(css).await.map_err(backend)?;
            if !matches.is_empty() {
                return Ok(Some(matches.remove(0)));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(WAIT_POLL).await;
        }
    }
}
