#![allow(missing_docs)]

//! Doorman binary: load config, initialise logging, run the dispatcher.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use teloxide::Bot;
use tracing::info;

use doorman::config::Config;
use doorman::gateway::TelegramGateway;
use doorman::moderation::blacklist::Blacklist;
use doorman::verify::{PendingRegistry, Verifier};

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "doorman", about = "Telegram group moderation bot", version)]
struct Args {
    /// Path to the configuration file (default: ./doorman.toml).
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // Precedence: env vars > config file > defaults.
    let config = Config::load(args.config.as_deref()).context("failed to load configuration")?;

    // Keep the guard alive for the lifetime of the process.
    let _logging_guard = match config.bot.logs_dir.as_deref() {
        Some(dir) => Some(doorman::logging::init_with_file(
            Path::new(dir),
            &config.bot.log_level,
        )?),
        None => {
            doorman::logging::init_console(&config.bot.log_level);
            None
        }
    };

    info!(version = env!("CARGO_PKG_VERSION"), "doorman starting");

    let token = config
        .bot
        .token
        .clone()
        .context("bot token missing: set [bot] token or DOORMAN_BOT_TOKEN")?;
    let bot = Bot::new(token);

    let registry = Arc::new(PendingRegistry::new());
    let gateway = Arc::new(TelegramGateway::new(bot.clone()));
    let verifier = Arc::new(Verifier::new(
        registry,
        gateway,
        config.verification.clone(),
        config.messages.clone(),
    ));

    let blacklist = Arc::new(Blacklist::compile(&config.blacklist.patterns));
    info!(patterns = blacklist.len(), "blacklist compiled");

    doorman::telegram::run_bot(
        bot,
        verifier,
        blacklist,
        Duration::from_millis(config.verification.delete_delay_ms),
        config.messages.blacklist_warning.clone(),
    )
    .await
}
