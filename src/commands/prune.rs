use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::info;

use airwatch::TrackerConfig;
use airwatch::db::open_store;
use airwatch::flights_repo::FlightsRepository;

pub async fn handle_prune(config: &TrackerConfig, older_than_hours: u64) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    let Some(max_age) = i64::try_from(older_than_hours)
        .ok()
        .and_then(chrono::Duration::try_hours)
    else {
        bail!("--older-than-hours {} is out of range", older_than_hours);
    };

    let pool = open_store(&config.database_path)?;
    let repo = FlightsRepository::new(pool);

    let cutoff = Utc::now() - max_age;
    let removed = repo
        .prune_seen_before(cutoff)
        .await
        .context("Failed to prune flights")?;
    let remaining = repo.count().await.context("Failed to count flights")?;

    info!(
        "Pruned {} flight(s) last seen before {}; {} remain",
        removed,
        cutoff.format("%Y-%m-%d %H:%M:%S UTC"),
        remaining
    );
    println!("Removed {} flight(s), {} remaining", removed, remaining);
    Ok(())
}
