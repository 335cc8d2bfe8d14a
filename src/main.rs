use anyhow::Result;
use std::sync::Arc;
use teslagram::config::Config;
use teslagram::mqtt::MqttIngest;
use teslagram::places::{NominatimClient, PlaceResolver};
use teslagram::router::FleetRouter;
use teslagram::telegram::TelegramBot;
use teslagram::{Notifier, logging};
use tokio::sync::mpsc;
use tokio::time::Duration;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;
    config.validate_for_bot()?;
    logging::init_logging(&config.logging)?;

    info!("Teslagram {} starting up", env!("APP_VERSION"));
    debug!("Effective configuration:\n{}", config.to_yaml()?);

    let lookup = Arc::new(NominatimClient::new(&config.geocoder)?);
    let notifier = Arc::new(Notifier::new(PlaceResolver::new(lookup), config.tz()?));

    let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();
    let router = FleetRouter::new(
        notifier,
        outbox_tx,
        Duration::from_millis(config.debounce_ms),
    );
    let status = router.status_board();

    let bot = TelegramBot::connect(&config.telegram)
        .await
        .map_err(|e| anyhow::anyhow!("Error connecting to telegram: {}", e))?;
    let ingest = MqttIngest::new(&config.mqtt);

    tokio::select! {
        res = ingest.run(router) => {
            if let Err(e) = &res {
                error!("MQTT ingest failed: {}", e);
            }
            res?;
        }
        res = bot.run(outbox_rx, status) => {
            if let Err(e) = &res {
                error!("Telegram bot failed: {}", e);
            }
            res?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }
    Ok(())
}
