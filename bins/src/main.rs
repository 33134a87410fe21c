use std::env;

use bson::oid::ObjectId;
use dotenv::dotenv;
use eyre::Context;
use ledger::{Ledger, LedgerConfig, DEFAULT_SAFE_CANCELLATION_HOURS};
use log::info;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    if let Err(err) = dotenv() {
        info!("Failed to load .env file: {}", err);
    }
    pretty_env_logger::init();
    color_eyre::install()?;

    info!("connecting to mongo");
    let mongo_url = env::var("MONGO_URL").context("Failed to get MONGO_URL from env")?;
    let storage = storage::Storage::new(&mongo_url)
        .await
        .context("Failed to create storage")?;

    let api_key = env::var("CRON_API_KEY").context("Failed to get CRON_API_KEY from env")?;
    let actor = env::var("CRON_ACTOR")
        .context("Failed to get CRON_ACTOR from env")?
        .parse::<ObjectId>()
        .context("CRON_ACTOR must be an ObjectId")?;
    let safe_hours = match env::var("SAFE_CANCELLATION_HOURS") {
        Ok(value) => value
            .parse::<u32>()
            .context("SAFE_CANCELLATION_HOURS must be a number")?,
        Err(_) => DEFAULT_SAFE_CANCELLATION_HOURS,
    };
    let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    info!("creating ledger");
    let ledger = Ledger::new(
        storage,
        LedgerConfig {
            safe_cancellation_hours: safe_hours,
        },
    );

    info!("Starting trigger api...");
    let state = api::AppState::new(ledger, api_key, actor);
    api::serve(&bind_addr, state).await?;

    Ok(())
}
