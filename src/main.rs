mod alert;
mod config;
mod db;
mod discord;
mod error;
mod logging;
mod riot;
mod tracker;

use tokio::sync::watch;
use tracing::{error, info};

use alert::{AlertDispatcher, AlertFormatter};
use config::Config;
use db::Database;
use discord::DiscordSink;
use error::AppError;
use riot::RiotClient;
use tracker::{SpectatorTracker, TrackerTiming};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    logging::init();

    let config = Config::from_env()?;
    info!(
        "🚀 Starting SourceStalker for {}#{} on {}",
        config.game_name, config.tag_line, config.platform
    );

    let db = Database::connect(&config.database_url, config.max_db_connections).await?;
    let api = RiotClient::from_config(&config);

    let sink = DiscordSink::new(&config.discord_token, config.alert_channel_id);
    let formatter = AlertFormatter::new(config.messages.clone(), config.display_name().to_string());
    let alerts = AlertDispatcher::new(sink, formatter);

    let timing = TrackerTiming {
        poll_interval: config.poll_interval,
        rank_sample_interval: config.rank_sample_interval,
        ..TrackerTiming::default()
    };
    let tracker = SpectatorTracker::new(
        api,
        db.clone(),
        alerts,
        config.game_name.clone(),
        config.tag_line.clone(),
        timing,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let tracker_handle = tokio::spawn(async move { tracker.run(shutdown_rx).await });

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
    }

    info!("🛑 Shutting down...");
    let _ = shutdown_tx.send(true);
    let _ = tracker_handle.await;
    db.close().await;

    Ok(())
}
