//! JSON persistence for harvested records.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::models::ReviewRecord;
use crate::sites::Source;

/// Default output filename for a run.
pub fn default_path(company: &str, source: Source) -> PathBuf {
    PathBuf::from(format!(
        "{}_{}_reviews.json",
        company.trim(),
        source.as_str()
    ))
}

/// Write records as a pretty-printed JSON array.
///
/// Partial results get written exactly like complete ones; the file
/// exists whenever the crawl ran far enough to produce a report.
pub async fn write_records(path: &Path, records: &[ReviewRecord]) -> Result<()> {
    let json = serde_json::to_string_pretty(records).context("Failed to serialize records")?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    info!("wrote {} record(s) to {}", records.len(), path.display());
    Ok(())
}
