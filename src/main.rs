use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{error, info, warn};
use tracing_subscriber::prelude::*;

use diary_bot::alerts::AlertLayer;
use diary_bot::bot::{self, App, Command};
use diary_bot::config::Config;
use diary_bot::estimator::Estimator;
use diary_bot::openrouter;
use diary_bot::store::Database;
use diary_bot::weather::WeatherClient;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    let bot = Bot::new(&config.telegram_bot_token);

    // Setup logging
    std::fs::create_dir_all(&config.log_dir).ok();
    let log_file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(config.log_dir.join("diary-bot.log"))
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Failed to open log file in {}: {e}", config.log_dir.display());
            std::process::exit(1);
        }
    };
    let (non_blocking, _guard) = tracing_appender::non_blocking(log_file);

    let registry = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        );

    if let Some(log_chat_id) = config.log_chat_id {
        registry.with(AlertLayer::new(bot.clone(), log_chat_id)).init();
    } else {
        registry.init();
    }

    info!("🚀 Starting diary bot...");

    let db = match Database::open(&config.database_path) {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to open database {}: {e}", config.database_path.display());
            std::process::exit(1);
        }
    };
    info!("📂 Database at {}", config.database_path.display());

    let llm = match &config.openrouter_api_key {
        Some(key) => match openrouter::Client::new(key.clone(), config.llm_timeout) {
            Ok(client) => Some(client),
            Err(e) => {
                warn!("OpenRouter client unavailable: {e}");
                None
            }
        },
        None => {
            info!("OPENROUTER_API_KEY not set, remote estimates and /ask are off");
            None
        }
    };

    let weather = match WeatherClient::new(config.weather.clone(), config.timezone.name()) {
        Ok(weather) => weather,
        Err(e) => {
            error!("Failed to build weather client: {e}");
            std::process::exit(1);
        }
    };

    let bot_name = match bot.get_me().await {
        Ok(me) => {
            info!("Bot user ID: {}, username: @{}", me.id, me.username());
            me.username().to_string()
        }
        Err(e) => {
            warn!("Failed to get bot info: {e}");
            String::new()
        }
    };

    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!("Failed to register command list: {e}");
    }

    let app = Arc::new(
        App::new(db, Estimator::new(llm.clone()), weather, llm, config.timezone, bot_name),
    );

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(bot::handle_message))
        .branch(Update::filter_callback_query().endpoint(bot::handle_callback));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![app])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}
