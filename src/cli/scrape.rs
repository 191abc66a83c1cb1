//! The scrape command: one harvest run end to end.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use clap::Args;
use console::style;
use url::Url;

use crate::browser::{BrowserOptions, BrowserSession, CdpDriver};
use crate::config::Timeouts;
use crate::harvest::{HarvestReport, Harvester, StopReason};
use crate::models::DateRange;
use crate::output;
use crate::sites::Source;

#[derive(Args)]
pub struct ScrapeArgs {
    /// Company or product name (e.g. "slack"); becomes the URL slug
    pub company: String,

    /// Review site to harvest (g2, capterra, sourceforge)
    #[arg(short, long)]
    pub source: String,

    /// First day of the window, inclusive
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub from: NaiveDate,

    /// Last day of the window, inclusive
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub to: NaiveDate,

    /// Run Chrome headless (headful is the default; it draws less
    /// bot-detection heat and lets you solve challenges by hand)
    #[arg(long)]
    pub headless: bool,

    /// Override the auto-built listing URL, e.g. when a slug needs an
    /// internal product id
    #[arg(long, value_name = "URL")]
    pub start_url: Option<String>,

    /// Seconds to wait after the initial navigation for manual
    /// challenge solving or logging in
    #[arg(long, default_value = "0", value_name = "SECS")]
    pub settle: u64,

    /// Persistent Chrome profile directory; cookies survive between
    /// runs, so a solved challenge sticks
    #[arg(long, env = "RVH_PROFILE_DIR", value_name = "DIR")]
    pub profile_dir: Option<PathBuf>,

    /// Chrome executable to use instead of auto-discovery
    #[arg(long, env = "RVH_CHROME", value_name = "PATH")]
    pub chrome: Option<PathBuf>,

    /// Extra Chrome argument, passed through verbatim (repeatable),
    /// e.g. --chrome-arg=--proxy-server=socks5://127.0.0.1:1080
    #[arg(long = "chrome-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub chrome_args: Vec<String>,

    /// Output file (default: {company}_{source}_reviews.json)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

pub async fn cmd_scrape(args: ScrapeArgs) -> anyhow::Result<()> {
    // Every configuration problem has to surface before a browser exists.
    let source = Source::from_id(&args.source).ok_or_else(|| {
        anyhow::anyhow!(
            "unknown source '{}'; expected one of: g2, capterra, sourceforge",
            args.source
        )
    })?;
    let range = DateRange::new(args.from, args.to)?;
    let start_url = match &args.start_url {
        Some(raw) => Url::parse(raw)
            .map(|url| url.to_string())
            .map_err(|error| anyhow::anyhow!("invalid --start-url: {}", error))?,
        None => source.reviews_url(&args.company),
    };
    let output_path = args
        .output
        .clone()
        .unwrap_or_else(|| output::default_path(&args.company, source));

    println!(
        "{} Harvesting {} reviews for {} within {}",
        style("→").cyan(),
        style(source.as_str()).bold(),
        style(&args.company).bold(),
        range
    );

    let session = BrowserSession::launch(&BrowserOptions {
        headless: args.headless,
        chrome: args.chrome.clone(),
        profile_dir: args.profile_dir.clone(),
        chrome_args: args.chrome_args.clone(),
    })
    .await?;

    // From here on the session gets torn down no matter what.
    let report = match run_harvest(&session, source, range, &args, &start_url).await {
        Ok(report) => {
            session.shutdown().await;
            report
        }
        Err(error) => {
            session.shutdown().await;
            return Err(error);
        }
    };

    output::write_records(&output_path, &report.records).await?;
    print_summary(&report, &output_path);
    Ok(())
}

async fn run_harvest(
    session: &BrowserSession,
    source: Source,
    range: DateRange,
    args: &ScrapeArgs,
    start_url: &str,
) -> anyhow::Result<HarvestReport> {
    let page = session.new_page().await?;
    let driver = CdpDriver::new(page, Timeouts::default().navigation);

    let mut harvester = Harvester::new(driver, source, range);
    if args.settle > 0 {
        println!(
            "{} Waiting {}s after navigation for manual actions",
            style("!").yellow(),
            args.settle
        );
        harvester = harvester.with_settle(Duration::from_secs(args.settle));
    }

    Ok(harvester.run(start_url).await)
}

fn print_summary(report: &HarvestReport, output_path: &Path) {
    let mark = match report.stop {
        StopReason::BrowserFailure => style("!").yellow(),
        _ => style("✓").green(),
    };
    println!(
        "{} Saved {} review(s) to {} ({} page(s), stopped: {})",
        mark,
        style(report.records.len()).bold(),
        output_path.display(),
        report.pages_visited,
        report.stop.describe()
    );

    let skipped = report.skipped;
    let ignored = skipped.undated
        + skipped.older_than_range
        + skipped.newer_than_range
        + skipped.malformed;
    if ignored > 0 {
        println!(
            "  {} skipped {}: {} undated, {} older, {} newer, {} unreadable",
            style("→").dim(),
            ignored,
            skipped.undated,
            skipped.older_than_range,
            skipped.newer_than_range,
            skipped.malformed
        );
    }
}
