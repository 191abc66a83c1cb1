//! CLI commands implementation.

mod scrape;

use clap::{Parser, Subcommand};
use console::style;

use crate::sites::Source;

#[derive(Parser)]
#[command(name = "rvh")]
#[command(about = "Date-bounded review harvesting from SaaS listing sites")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Harvest reviews for a company within a date window
    Scrape(scrape::ScrapeArgs),

    /// List supported review sources and their listing URL shapes
    Sources,
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scrape(args) => scrape::cmd_scrape(args).await,
        Commands::Sources => cmd_sources(),
    }
}

fn cmd_sources() -> anyhow::Result<()> {
    println!("{}", style("Supported review sources").bold());
    for source in Source::ALL {
        println!(
            "  {} {:<12} {}",
            style("→").cyan(),
            source.as_str(),
            source.reviews_url("<company>")
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_scrape(extra: &[&str]) -> scrape::ScrapeArgs {
        let mut argv = vec![
            "rvh",
            "scrape",
            "slack",
            "--source",
            "g2",
            "--from",
            "2024-02-01",
            "--to",
            "2024-03-31",
        ];
        argv.extend_from_slice(extra);
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Commands::Scrape(args) => args,
            Commands::Sources => panic!("parsed the wrong subcommand"),
        }
    }

    #[test]
    fn repeated_chrome_args_accumulate_in_order() {
        let args = parse_scrape(&[
            "--chrome-arg",
            "--proxy-server=socks5://127.0.0.1:1080",
            "--chrome-arg",
            "--disable-extensions",
        ]);
        assert_eq!(
            args.chrome_args,
            ["--proxy-server=socks5://127.0.0.1:1080", "--disable-extensions"]
        );
    }

    #[test]
    fn chrome_args_default_to_none() {
        let args = parse_scrape(&[]);
        assert!(args.chrome_args.is_empty());
        assert!(!args.headless);
        assert_eq!(args.settle, 0);
    }
}
