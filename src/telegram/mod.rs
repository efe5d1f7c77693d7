//! Telegram dispatcher: join events, slash commands, greetings, blacklist.
//!
//! One teloxide endpoint handles all messages; routing happens inside the
//! handler. Shared dependencies are injected via `dptree::deps!`, never held
//! in ambient globals.

use std::sync::Arc;
use std::time::Duration;

use teloxide::dispatching::UpdateFilterExt;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{debug, info};

use crate::moderation::{self, blacklist::Blacklist};
use crate::verify::Verifier;

// ---------------------------------------------------------------------------
// Shared state for handler injection
// ---------------------------------------------------------------------------

/// Shared dependencies injected into teloxide handlers via `dptree::deps!`.
#[derive(Clone)]
struct SharedState {
    verifier: Arc<Verifier>,
    blacklist: Arc<Blacklist>,
    delete_delay: Duration,
    blacklist_warning: String,
    bot_username: String,
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Slash commands understood by the bot.
///
/// Moderation commands pick their target from the replied-to message.
#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase")]
pub enum Command {
    /// Greet the sender.
    #[command(description = "say hello")]
    Start,
    /// List available commands.
    #[command(description = "show this message")]
    Help,
    /// Mute the author of the replied-to message.
    #[command(description = "mute the replied-to user")]
    Mute,
    /// Unmute the author of the replied-to message.
    #[command(description = "unmute the replied-to user")]
    Unmute,
    /// Ban the author of the replied-to message.
    #[command(description = "ban the replied-to user")]
    Ban,
    /// Unban the author of the replied-to message.
    #[command(description = "unban the replied-to user")]
    Unban,
    /// Delete the replied-to message.
    #[command(description = "delete the replied-to message")]
    D,
    /// Bulk delete from the replied-to message through the command.
    #[command(description = "delete everything from the replied-to message onward")]
    Mdel,
    /// Pin the replied-to message.
    #[command(description = "pin the replied-to message")]
    Pin,
    /// Unpin the most recently pinned message.
    #[command(description = "unpin the latest pinned message")]
    Unpin,
    /// Promote the author of the replied-to message.
    #[command(description = "make the replied-to user an administrator")]
    Admin,
    /// Demote the author of the replied-to message.
    #[command(description = "remove the replied-to user's admin rights")]
    Unadmin,
}

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

/// Run the bot dispatcher until stopped (Ctrl+C).
///
/// Fetches the bot's username once for command parsing, then dispatches
/// every incoming message through [`handle_message`].
pub async fn run_bot(
    bot: Bot,
    verifier: Arc<Verifier>,
    blacklist: Arc<Blacklist>,
    delete_delay: Duration,
    blacklist_warning: String,
) -> anyhow::Result<()> {
    let me = bot.get_me().await?;
    let shared = SharedState {
        verifier,
        blacklist,
        delete_delay,
        blacklist_warning,
        bot_username: me.username().to_owned(),
    };

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handle_message));

    info!(username = %shared.bot_username, "telegram dispatcher starting");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![shared])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

// ---------------------------------------------------------------------------
// Message handler
// ---------------------------------------------------------------------------

/// Handle an incoming Telegram message.
///
/// Routing order: member-join service messages feed the verifier, slash
/// commands go to moderation, then the greeting token, then the blacklist.
async fn handle_message(bot: Bot, msg: Message, state: SharedState) -> ResponseResult<()> {
    let chat = msg.chat.id;

    if let Some(members) = msg.new_chat_members() {
        for member in members {
            state
                .verifier
                .handle_join(chat, member.id, &member.full_name(), member.is_bot)
                .await;
        }
        return Ok(());
    }

    let Some(text) = msg.text() else {
        return Ok(());
    };
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };

    if text.starts_with('/') {
        match Command::parse(text, &state.bot_username) {
            Ok(command) => dispatch_command(&bot, &msg, command, &state).await,
            Err(_) => debug!(%chat, "ignoring unknown command"),
        }
        return Ok(());
    }

    if state.verifier.is_greeting(text) {
        state.verifier.handle_greeting(chat, from.id, msg.id).await;
        return Ok(());
    }

    if state.blacklist.matches(text) {
        info!(%chat, user = %from.id, "removing blacklisted message");
        moderation::delete_now(&bot, chat, msg.id).await;
        moderation::reply_ephemeral(&bot, chat, &state.blacklist_warning, state.delete_delay)
            .await;
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Command dispatcher
// ---------------------------------------------------------------------------

/// Dispatch a parsed command to its handler.
async fn dispatch_command(bot: &Bot, msg: &Message, command: Command, state: &SharedState) {
    let chat = msg.chat.id;
    let delay = state.delete_delay;

    match command {
        Command::Start => {
            moderation::delete_now(bot, chat, msg.id).await;
            moderation::reply_ephemeral(bot, chat, "Hello, I keep this group tidy.", delay).await;
        }
        Command::Help => {
            moderation::delete_now(bot, chat, msg.id).await;
            moderation::reply_ephemeral(bot, chat, &Command::descriptions().to_string(), delay)
                .await;
        }
        Command::Mute => moderation::handle_mute(bot, msg, delay).await,
        Command::Unmute => moderation::handle_unmute(bot, msg, delay).await,
        Command::Ban => moderation::handle_ban(bot, msg, delay).await,
        Command::Unban => moderation::handle_unban(bot, msg, delay).await,
        Command::D => moderation::handle_delete(bot, msg, delay).await,
        Command::Mdel => moderation::handle_multi_delete(bot, msg, delay).await,
        Command::Pin => moderation::handle_pin(bot, msg, delay).await,
        Command::Unpin => moderation::handle_unpin(bot, msg, delay).await,
        Command::Admin => moderation::handle_promote(bot, msg, delay).await,
        Command::Unadmin => moderation::handle_demote(bot, msg, delay).await,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
