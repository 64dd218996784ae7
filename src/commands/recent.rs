use anyhow::{Context, Result};
use chrono::Utc;

use airwatch::TrackerConfig;
use airwatch::db::open_store;
use airwatch::flights::FlightView;
use airwatch::flights_repo::FlightsRepository;

fn format_optional(value: Option<f64>, unit: &str) -> String {
    value
        .map(|v| format!("{:.0}{}", v, unit))
        .unwrap_or_else(|| "-".to_string())
}

pub async fn handle_recent(config: &TrackerConfig, limit: usize, json: bool) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    let pool = open_store(&config.database_path)?;
    let repo = FlightsRepository::new(pool);

    let now = Utc::now();
    let flights: Vec<FlightView> = repo
        .recent(limit)
        .await
        .context("Failed to read recent flights")?
        .into_iter()
        .map(|flight| FlightView::from_state(flight, now, config.stale_after()))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&flights)?);
        return Ok(());
    }

    if flights.is_empty() {
        println!("No flights stored in {:?}", config.database_path);
        return Ok(());
    }

    println!(
        "{:<8} {:<9} {:>9} {:>10} {:>8} {:>7}  {:<20}",
        "ICAO24", "CALLSIGN", "LAT", "LON", "ALT", "SPEED", "LAST SEEN (UTC)"
    );
    for flight in &flights {
        println!(
            "{:<8} {:<9} {:>9.4} {:>10.4} {:>8} {:>7}  {:<20}{}",
            flight.identifier,
            flight.callsign,
            flight.latitude,
            flight.longitude,
            format_optional(flight.altitude, "m"),
            format_optional(flight.velocity, ""),
            flight.last_seen.format("%Y-%m-%d %H:%M:%S"),
            if flight.stale { "  (stale)" } else { "" }
        );
    }

    Ok(())
}
