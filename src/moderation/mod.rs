//! Admin command handlers.
//!
//! Every moderation command targets the author of a replied-to message:
//! reply to someone, then `/mute`, `/ban`, `/pin` and so on. Commands from
//! non-admins are deleted silently. Confirmation replies are ephemeral; they
//! are removed again after the configured delete delay so the chat stays
//! clean.
//!
//! Command failures (missing bot rights, member already gone) produce an
//! ephemeral error reply and a warning log, never a crash.

use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::{ChatPermissions, Message, MessageId, User};
use tracing::warn;

use crate::gateway::telegram::send_allowed;

pub mod blacklist;

/// Whether `user` may run moderation commands in `chat`.
///
/// Owner and administrators qualify. A failed lookup counts as not-admin.
pub async fn is_admin(bot: &Bot, chat: ChatId, user: UserId) -> bool {
    match bot.get_chat_member(chat, user).await {
        Ok(member) => member.is_privileged(),
        Err(e) => {
            warn!(%chat, %user, error = %e, "failed to query chat member status");
            false
        }
    }
}

/// Delete `messages` from `chat` after `delay`, best effort.
pub fn schedule_delete(bot: Bot, chat: ChatId, messages: Vec<MessageId>, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        for message in messages {
            if let Err(e) = bot.delete_message(chat, message).await {
                warn!(%chat, message = message.0, error = %e, "failed to delete message");
            }
        }
    });
}

/// Send an ephemeral reply that deletes itself after `delay`.
pub(crate) async fn reply_ephemeral(bot: &Bot, chat: ChatId, text: &str, delay: Duration) {
    match bot.send_message(chat, text).await {
        Ok(sent) => schedule_delete(bot.clone(), chat, vec![sent.id], delay),
        Err(e) => warn!(%chat, error = %e, "failed to send reply"),
    }
}

/// Delete a message immediately, best effort.
pub(crate) async fn delete_now(bot: &Bot, chat: ChatId, message: MessageId) {
    if let Err(e) = bot.delete_message(chat, message).await {
        warn!(%chat, message = message.0, error = %e, "failed to delete message");
    }
}

/// The member a reply-targeted command acts on.
fn target_user(reply: &Message) -> Option<&User> {
    reply.from.as_ref()
}

/// Admin gate plus reply-target extraction shared by most commands.
///
/// Returns the replied-to message when the command may proceed. On a missing
/// reply the sender gets an ephemeral hint; a non-admin sender just has their
/// command removed. The command message itself is always deleted.
async fn require_admin_reply<'a>(
    bot: &Bot,
    msg: &'a Message,
    missing_reply_hint: &str,
    delay: Duration,
) -> Option<&'a Message> {
    let chat = msg.chat.id;
    let from = msg.from.as_ref()?;

    let Some(reply) = msg.reply_to_message() else {
        reply_ephemeral(bot, chat, missing_reply_hint, delay).await;
        delete_now(bot, chat, msg.id).await;
        return None;
    };

    if !is_admin(bot, chat, from.id).await {
        delete_now(bot, chat, msg.id).await;
        return None;
    }

    delete_now(bot, chat, msg.id).await;
    Some(reply)
}

/// `/mute`: revoke the target's permission to send messages.
pub async fn handle_mute(bot: &Bot, msg: &Message, delay: Duration) {
    let chat = msg.chat.id;
    let Some(reply) =
        require_admin_reply(bot, msg, "Reply to a message to mute that user.", delay).await
    else {
        return;
    };
    let Some(target) = target_user(reply) else {
        return;
    };

    match bot
        .restrict_chat_member(chat, target.id, ChatPermissions::empty())
        .await
    {
        Ok(_) => {
            reply_ephemeral(
                bot,
                chat,
                &format!("{} has been muted.", target.full_name()),
                delay,
            )
            .await;
        }
        Err(e) => {
            warn!(%chat, user = %target.id, error = %e, "mute failed");
            reply_ephemeral(bot, chat, "Failed to mute the user, check my rights.", delay).await;
        }
    }
}

/// `/unmute`: restore the target's permission to send messages.
pub async fn handle_unmute(bot: &Bot, msg: &Message, delay: Duration) {
    let chat = msg.chat.id;
    let Some(reply) =
        require_admin_reply(bot, msg, "Reply to a message to unmute that user.", delay).await
    else {
        return;
    };
    let Some(target) = target_user(reply) else {
        return;
    };

    match bot
        .restrict_chat_member(chat, target.id, send_allowed())
        .await
    {
        Ok(_) => {
            reply_ephemeral(
                bot,
                chat,
                &format!("{} has been unmuted.", target.full_name()),
                delay,
            )
            .await;
        }
        Err(e) => {
            warn!(%chat, user = %target.id, error = %e, "unmute failed");
            reply_ephemeral(bot, chat, "Failed to unmute the user, check my rights.", delay).await;
        }
    }
}

/// `/ban`: remove the target from the chat permanently.
pub async fn handle_ban(bot: &Bot, msg: &Message, delay: Duration) {
    let chat = msg.chat.id;
    let Some(reply) =
        require_admin_reply(bot, msg, "Reply to a message to ban that user.", delay).await
    else {
        return;
    };
    let Some(target) = target_user(reply) else {
        return;
    };

    match bot.ban_chat_member(chat, target.id).await {
        Ok(_) => {
            reply_ephemeral(
                bot,
                chat,
                &format!("{} has been banned.", target.full_name()),
                delay,
            )
            .await;
        }
        Err(e) => {
            warn!(%chat, user = %target.id, error = %e, "ban failed");
            reply_ephemeral(bot, chat, "Failed to ban the user, check my rights.", delay).await;
        }
    }
}

/// `/unban`: lift a ban, if the target is actually banned.
pub async fn handle_unban(bot: &Bot, msg: &Message, delay: Duration) {
    let chat = msg.chat.id;
    let Some(reply) =
        require_admin_reply(bot, msg, "Reply to a message to unban that user.", delay).await
    else {
        return;
    };
    let Some(target) = target_user(reply) else {
        return;
    };

    match bot.get_chat_member(chat, target.id).await {
        Ok(member) if !member.is_banned() => {
            reply_ephemeral(bot, chat, "That user is not banned.", delay).await;
            return;
        }
        Ok(_) => {}
        Err(e) => {
            warn!(%chat, user = %target.id, error = %e, "member lookup failed");
        }
    }

    match bot.unban_chat_member(chat, target.id).await {
        Ok(_) => {
            reply_ephemeral(
                bot,
                chat,
                &format!("{} has been unbanned.", target.full_name()),
                delay,
            )
            .await;
        }
        Err(e) => {
            warn!(%chat, user = %target.id, error = %e, "unban failed");
            reply_ephemeral(bot, chat, "Failed to unban the user, check my rights.", delay).await;
        }
    }
}

/// `/d`: delete the replied-to message.
pub async fn handle_delete(bot: &Bot, msg: &Message, delay: Duration) {
    let chat = msg.chat.id;
    let Some(reply) =
        require_admin_reply(bot, msg, "Reply to the message you want deleted.", delay).await
    else {
        return;
    };

    match bot.delete_message(chat, reply.id).await {
        Ok(_) => reply_ephemeral(bot, chat, "Message deleted.", delay).await,
        Err(e) => {
            warn!(%chat, message = reply.id.0, error = %e, "delete failed");
            reply_ephemeral(bot, chat, "Failed to delete the message.", delay).await;
        }
    }
}

/// `/mdel`: delete every message from the replied-to message through the
/// command message. Gaps (already-deleted or service messages) are skipped.
pub async fn handle_multi_delete(bot: &Bot, msg: &Message, delay: Duration) {
    let chat = msg.chat.id;
    let command_id = msg.id;
    let Some(reply) = require_admin_reply(
        bot,
        msg,
        "Reply to a message; everything from it up to your command gets deleted.",
        delay,
    )
    .await
    else {
        return;
    };

    for id in reply.id.0..=command_id.0 {
        if bot.delete_message(chat, MessageId(id)).await.is_err() {
            continue;
        }
    }

    reply_ephemeral(bot, chat, "Bulk delete finished.", delay).await;
}

/// `/pin`: pin the replied-to message.
pub async fn handle_pin(bot: &Bot, msg: &Message, delay: Duration) {
    let chat = msg.chat.id;
    let Some(reply) =
        require_admin_reply(bot, msg, "Reply to the message you want pinned.", delay).await
    else {
        return;
    };

    match bot.pin_chat_message(chat, reply.id).await {
        Ok(_) => reply_ephemeral(bot, chat, "Message pinned.", delay).await,
        Err(e) => {
            warn!(%chat, message = reply.id.0, error = %e, "pin failed");
            reply_ephemeral(bot, chat, "Failed to pin the message, check my rights.", delay).await;
        }
    }
}

/// `/unpin`: unpin the most recently pinned message.
pub async fn handle_unpin(bot: &Bot, msg: &Message, delay: Duration) {
    let chat = msg.chat.id;
    let Some(from) = msg.from.as_ref() else {
        return;
    };

    if !is_admin(bot, chat, from.id).await {
        delete_now(bot, chat, msg.id).await;
        return;
    }
    delete_now(bot, chat, msg.id).await;

    match bot.unpin_chat_message(chat).await {
        Ok(_) => reply_ephemeral(bot, chat, "Message unpinned.", delay).await,
        Err(e) => {
            warn!(%chat, error = %e, "unpin failed");
            reply_ephemeral(bot, chat, "Failed to unpin, check my rights.", delay).await;
        }
    }
}

/// `/admin`: promote the target to administrator with moderation rights.
pub async fn handle_promote(bot: &Bot, msg: &Message, delay: Duration) {
    let chat = msg.chat.id;
    let Some(reply) =
        require_admin_reply(bot, msg, "Reply to a message to promote that user.", delay).await
    else {
        return;
    };
    let Some(target) = target_user(reply) else {
        return;
    };

    match bot
        .promote_chat_member(chat, target.id)
        .can_manage_chat(true)
        .can_delete_messages(true)
        .can_restrict_members(true)
        .can_pin_messages(true)
        .await
    {
        Ok(_) => {
            reply_ephemeral(
                bot,
                chat,
                &format!("{} is now an administrator.", target.full_name()),
                delay,
            )
            .await;
        }
        Err(e) => {
            warn!(%chat, user = %target.id, error = %e, "promote failed");
            reply_ephemeral(bot, chat, "Failed to promote the user, check my rights.", delay)
                .await;
        }
    }
}

/// `/unadmin`: strip the target's administrator rights.
pub async fn handle_demote(bot: &Bot, msg: &Message, delay: Duration) {
    let chat = msg.chat.id;
    let Some(reply) =
        require_admin_reply(bot, msg, "Reply to a message to demote that user.", delay).await
    else {
        return;
    };
    let Some(target) = target_user(reply) else {
        return;
    };

    match bot
        .promote_chat_member(chat, target.id)
        .can_manage_chat(false)
        .can_delete_messages(false)
        .can_restrict_members(false)
        .can_pin_messages(false)
        .await
    {
        Ok(_) => {
            reply_ephemeral(
                bot,
                chat,
                &format!("{} is no longer an administrator.", target.full_name()),
                delay,
            )
            .await;
        }
        Err(e) => {
            warn!(%chat, user = %target.id, error = %e, "demote failed");
            reply_ephemeral(bot, chat, "Failed to demote the user, check my rights.", delay).await;
        }
    }
}
