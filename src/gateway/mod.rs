//! Chat gateway abstraction over the messaging platform.
//!
//! The verification core talks to the platform only through [`ChatGateway`],
//! so tests can substitute a recording mock and the core never depends on a
//! live Telegram connection.

use async_trait::async_trait;
use teloxide::types::{ChatId, MessageId, UserId};
use thiserror::Error;

pub mod telegram;

pub use telegram::TelegramGateway;

/// Errors from outbound gateway calls.
///
/// Callers in the verification core log these and carry on; a failed send or
/// restriction never blocks a state transition.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The platform API rejected or failed the call.
    #[error("chat API error: {0}")]
    Api(String),
}

impl From<teloxide::RequestError> for GatewayError {
    fn from(e: teloxide::RequestError) -> Self {
        GatewayError::Api(e.to_string())
    }
}

/// Outbound operations the verification core needs from the platform.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Send a text message to a chat, returning the new message's id.
    async fn send_message(&self, chat: ChatId, text: &str) -> Result<MessageId, GatewayError>;

    /// Delete a message from a chat.
    async fn delete_message(&self, chat: ChatId, message: MessageId) -> Result<(), GatewayError>;

    /// Grant or revoke a member's permission to send messages.
    async fn restrict_member(
        &self,
        chat: ChatId,
        user: UserId,
        can_send: bool,
    ) -> Result<(), GatewayError>;

    /// Fetch the chat's display title, if it has one.
    async fn chat_title(&self, chat: ChatId) -> Result<Option<String>, GatewayError>;
}
