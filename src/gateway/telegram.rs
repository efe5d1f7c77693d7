//! Teloxide-backed [`ChatGateway`] implementation.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatPermissions, MessageId};

use super::{ChatGateway, GatewayError};

/// [`ChatGateway`] backed by a live `teloxide::Bot`.
#[derive(Clone)]
pub struct TelegramGateway {
    bot: Bot,
}

impl TelegramGateway {
    /// Wrap a teloxide bot handle.
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

/// Permissions restored when a member may send again.
///
/// Pinning and changing chat info stay disabled, matching the restriction
/// profile applied to unverified members.
pub(crate) fn send_allowed() -> ChatPermissions {
    ChatPermissions::SEND_MESSAGES
        | ChatPermissions::SEND_MEDIA_MESSAGES
        | ChatPermissions::SEND_POLLS
        | ChatPermissions::SEND_OTHER_MESSAGES
        | ChatPermissions::ADD_WEB_PAGE_PREVIEWS
        | ChatPermissions::INVITE_USERS
}

#[async_trait]
impl ChatGateway for TelegramGateway {
    async fn send_message(&self, chat: ChatId, text: &str) -> Result<MessageId, GatewayError> {
        let message = self.bot.send_message(chat, text).await?;
        Ok(message.id)
    }

    async fn delete_message(&self, chat: ChatId, message: MessageId) -> Result<(), GatewayError> {
        self.bot.delete_message(chat, message).await?;
        Ok(())
    }

    async fn restrict_member(
        &self,
        chat: ChatId,
        user: UserId,
        can_send: bool,
    ) -> Result<(), GatewayError> {
        let permissions = if can_send {
            send_allowed()
        } else {
            ChatPermissions::empty()
        };
        self.bot.restrict_chat_member(chat, user, permissions).await?;
        Ok(())
    }

    async fn chat_title(&self, chat: ChatId) -> Result<Option<String>, GatewayError> {
        let info = self.bot.get_chat(chat).await?;
        Ok(info.title().map(str::to_owned))
    }
}
