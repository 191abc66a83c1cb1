//! Browser session lifecycle.
//!
//! Launches a local Chrome over the DevTools protocol with the usual
//! stealth accommodations: randomized user agent and window geometry,
//! automation fingerprints scrubbed before any page script runs, and a
//! teardown sequence that reaps the process on every exit path.

pub mod driver;

pub use driver::CdpDriver;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use chromiumoxide::cdp::browser_protocol::emulation::SetTimezoneOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::{Browser, BrowserConfig, Handler, Page};
use futures::StreamExt;
use rand::Rng;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Locale and timezone pinned per session. A user agent advertising
/// en-US while the host leaks another timezone is its own fingerprint,
/// so both are overridden together.
const BROWSER_LOCALE: &str = "en-US";
const BROWSER_TIMEZONE: &str = "UTC";

/// Realistic desktop user agents, one picked per session. All Chrome
/// flavored, since that is what actually runs underneath.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_6_3) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

/// Fingerprint scrubbing registered to run before any page script.
/// Condensed from the puppeteer-extra stealth plugin techniques.
const STEALTH_SCRIPTS: &[&str] = &[
    // webdriver flag is the first thing every detector reads, and a
    // missing window.chrome object is the second
    r#"
    Object.defineProperty(navigator, 'webdriver', { get: () => undefined, configurable: true });
    window.chrome = window.chrome || { runtime: {}, loadTimes: function() {}, csi: function() {}, app: {} };
    "#,
    // the notifications permission probe betrays automation
    r#"
    const realQuery = window.navigator.permissions.query;
    window.navigator.permissions.query = (p) =>
        p.name === 'notifications'
            ? Promise.resolve({ state: Notification.permission })
            : realQuery(p);
    "#,
    // an empty plugin list is another headless tell
    r#"
    Object.defineProperty(navigator, 'plugins', {
        get: () => [
            { name: 'Chrome PDF Viewer', filename: 'internal-pdf-viewer', description: 'Portable Document Format' },
            { name: 'Native Client', filename: 'internal-nacl-plugin', description: '' }
        ],
        configurable: true
    });
    Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'], configurable: true });
    "#,
    // chromedriver leftovers
    r#"
    for (const key of Object.keys(window)) {
        if (key.startsWith('cdc_')) { delete window[key]; }
    }
    "#,
];

/// Well-known Chrome/Chromium install locations, Linux first since
/// that is where harvest runs usually live.
const CHROME_PATHS: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/opt/google/chrome/google-chrome",
    "/snap/bin/chromium",
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
];

/// Launch knobs the CLI wires through.
#[derive(Debug, Clone, Default)]
pub struct BrowserOptions {
    /// Headless run. Off by default: a visible window both reduces
    /// detection and lets the operator solve challenges by hand.
    pub headless: bool,
    /// Explicit Chrome executable, skipping discovery.
    pub chrome: Option<PathBuf>,
    /// Persistent user-data dir, reused across runs so cookies from a
    /// solved challenge stick.
    pub profile_dir: Option<PathBuf>,
    /// Extra Chrome arguments, appended verbatim.
    pub chrome_args: Vec<String>,
}

/// One live Chrome plus its CDP event pump.
pub struct BrowserSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
    closed: Arc<AtomicBool>,
    user_agent: &'static str,
}

impl BrowserSession {
    /// Launch Chrome and start pumping CDP events.
    pub async fn launch(options: &BrowserOptions) -> Result<Self> {
        let chrome_path = match &options.chrome {
            Some(path) => path.clone(),
            None => find_chrome()?,
        };

        let (user_agent, width, height) = {
            let mut rng = rand::thread_rng();
            let agent = USER_AGENTS[rng.gen_range(0..USER_AGENTS.len())];
            let width: u32 = rng.gen_range(1280..=1680);
            let height: u32 = rng.gen_range(800..=1050);
            (agent, width, height)
        };

        info!(
            "launching chrome (headless={}) from {}",
            options.headless,
            chrome_path.display()
        );

        let mut builder = BrowserConfig::builder().chrome_executable(chrome_path);

        // with_head means NOT headless, confusingly
        if !options.headless {
            builder = builder.with_head();
        }

        if let Some(dir) = &options.profile_dir {
            builder = builder.arg(format!("--user-data-dir={}", dir.display()));
        }
        builder = builder
            .arg(format!("--window-size={},{}", width, height))
            .arg(format!("--lang={}", BROWSER_LOCALE));

        // Scrub the automation banner and everything Chrome phones home
        // with; --no-sandbox keeps containerized runs alive.
        for flag in [
            "--disable-blink-features=AutomationControlled",
            "--disable-infobars",
            "--no-first-run",
            "--no-default-browser-check",
            "--disable-background-networking",
            "--disable-sync",
            "--disable-dev-shm-usage",
            "--no-sandbox",
            "--disable-gpu",
        ] {
            builder = builder.arg(flag);
        }
        for arg in &options.chrome_args {
            builder = builder.arg(arg);
        }

        let config = builder
            .build()
            .map_err(|error| anyhow::anyhow!("browser config rejected: {}", error))?;

        let (browser, handler) = Browser::launch(config)
            .await
            .context("failed to launch chrome")?;

        let closed = Arc::new(AtomicBool::new(false));
        let handler_task = spawn_handler_task(handler, Arc::clone(&closed));

        Ok(Self {
            browser,
            handler_task,
            closed,
            user_agent,
        })
    }

    /// Open a tab with the session user agent applied and stealth
    /// patches registered ahead of any navigation.
    pub async fn new_page(&self) -> Result<Page> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("Failed to open page")?;

        page.execute(SetUserAgentOverrideParams::new(self.user_agent.to_string()))
            .await
            .context("Failed to set user agent")?;

        page.execute(SetTimezoneOverrideParams::new(BROWSER_TIMEZONE.to_string()))
            .await
            .context("Failed to pin timezone")?;

        for &script in STEALTH_SCRIPTS {
            page.execute(AddScriptToEvaluateOnNewDocumentParams::new(
                script.to_string(),
            ))
            .await
            .context("Failed to register stealth script")?;
        }

        Ok(page)
    }

    /// Tear the session down: close Chrome, reap the process, stop the
    /// event pump. Callers run this on every exit path.
    pub async fn shutdown(mut self) {
        if self.closed.load(Ordering::SeqCst) {
            debug!("browser already gone, skipping close");
        } else {
            if let Err(error) = self.browser.close().await {
                warn!("browser close failed: {}", error);
            }
            if let Err(error) = self.browser.wait().await {
                debug!("browser wait failed: {}", error);
            }
        }
        self.handler_task.abort();
        info!("browser session closed");
    }
}

fn spawn_handler_task(mut handler: Handler, closed: Arc<AtomicBool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if event.is_err() {
                break;
            }
        }
        closed.store(true, Ordering::SeqCst);
    })
}

/// Find a Chrome executable: well-known paths first, then PATH.
fn find_chrome() -> Result<PathBuf> {
    for path in CHROME_PATHS {
        let candidate = Path::new(path);
        if candidate.exists() {
            info!("found chrome at {}", path);
            return Ok(candidate.to_path_buf());
        }
    }

    for name in ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"] {
        let probe = std::process::Command::new("which").arg(name).output();
        if let Ok(output) = probe {
            if output.status.success() {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path.is_empty() {
                    info!("found chrome in PATH: {}", path);
                    return Ok(PathBuf::from(path));
                }
            }
        }
    }

    Err(anyhow::anyhow!(
        "no Chrome or Chromium executable found; install one or point \
         --chrome (or RVH_CHROME) at it"
    ))
}
