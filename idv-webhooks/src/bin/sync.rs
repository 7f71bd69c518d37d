//! IDV Sync - bulk pull of stored resources from the vendor API.
//!
//! Usage:
//!
//! ```text
//! idv-sync record --exclude accepted rejected
//! idv-sync client --filter pending
//! ```
//!
//! Individual pull failures are logged and counted; the exit status is
//! non-zero only when configuration or the store is unusable.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use idv::{ApiClient, Config, FileStore, Mirror, ResourceKind, StatusFilter};

#[derive(Debug, Parser)]
#[command(name = "idv-sync", about = "Pull the latest state of stored resources from the vendor")]
struct Args {
    /// Resource kind to sync: client, record or check
    model: ResourceKind,

    /// Only sync resources with one of these statuses
    #[arg(long, num_args = 1..)]
    filter: Vec<String>,

    /// Skip resources with one of these statuses
    #[arg(long, num_args = 1..)]
    exclude: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    let config = Config::from_env();
    config
        .require_access_token()
        .context("The sync command needs API access")?;

    let data_dir = config
        .data_dir
        .clone()
        .context("AMIQUS_DATA_DIR must point at the store to sync")?;
    let store = FileStore::open(&data_dir)
        .await
        .context("Failed to open data directory")?;
    let api = ApiClient::from_config(&config).context("Failed to build API client")?;
    let mirror = Mirror::new(Arc::new(api), Arc::new(store)).with_scrubbers(config.scrubbers());

    let status_filter = StatusFilter::new(args.filter, args.exclude);
    info!(
        model = %args.model,
        include = ?status_filter.include,
        exclude = ?status_filter.exclude,
        "sync_starting"
    );

    let report = mirror
        .pull_all(args.model, &status_filter)
        .await
        .context("Failed to list resources")?;

    info!(
        model = %args.model,
        pulled = report.pulled,
        failed = report.failed,
        "sync_complete"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args() {
        let args = Args::try_parse_from([
            "idv-sync", "record", "--filter", "pending", "started", "--exclude", "accepted",
        ])
        .unwrap();
        assert_eq!(args.model, ResourceKind::Record);
        assert_eq!(args.filter, vec!["pending", "started"]);
        assert_eq!(args.exclude, vec!["accepted"]);

        assert!(Args::try_parse_from(["idv-sync", "applicant"]).is_err());
    }
}
