mod config;
mod tg;
mod tmdb;

use dotenvy::dotenv;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Arc::new(config::Config::from_env()?);
    let bot = Bot::new(config.bot_token.clone());
    let tmdb = tmdb::TmdbClient::new(config.tmdb_api_key.clone())?;

    tracing::info!("starting poster bot");
    tg::run(bot, config, tmdb).await;
    Ok(())
}
