//! rvh - date-bounded review harvesting.
//!
//! A tool for collecting product reviews from SaaS listing sites within
//! a caller-supplied date window, driving a real Chrome instance.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reviewharvest::cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    // Initialize logging based on verbosity
    let default_filter = if cli::is_verbose() {
        "reviewharvest=info"
    } else {
        "reviewharvest=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Run CLI
    cli::run().await
}
