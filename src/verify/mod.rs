//! New-member verification state machine.
//!
//! A non-automated member joining the chat gets a welcome prompt and a
//! deadline. Sending the greeting token in time verifies them; silence gets
//! them muted when the deadline fires. The two resolution paths race through
//! the same atomic registry removal, so exactly one of them runs its side
//! effects.
//!
//! Every outbound gateway call here is logged-and-swallowed on failure: the
//! registry mutation always completes first, and a failed send or restriction
//! never leaves a stale entry behind.

use std::sync::Arc;
use std::time::Duration;

use teloxide::types::{ChatId, MessageId, UserId};
use tracing::{debug, info, warn};

use crate::config::{MessagesConfig, VerificationConfig};
use crate::gateway::ChatGateway;

pub mod registry;

pub use registry::{DeadlineHandle, PendingRegistry, PendingVerification};

/// Fallback chat name when the title cannot be fetched.
const FALLBACK_GROUP_NAME: &str = "the group";

/// Drives join, greeting and deadline transitions for pending members.
///
/// Owned state is injected at construction; the registry and gateway are
/// shared with the dispatcher, never ambient globals.
pub struct Verifier {
    registry: Arc<PendingRegistry>,
    gateway: Arc<dyn ChatGateway>,
    verification: VerificationConfig,
    messages: MessagesConfig,
}

impl Verifier {
    /// Build a verifier over a shared registry and gateway.
    pub fn new(
        registry: Arc<PendingRegistry>,
        gateway: Arc<dyn ChatGateway>,
        verification: VerificationConfig,
        messages: MessagesConfig,
    ) -> Self {
        Self {
            registry,
            gateway,
            verification,
            messages,
        }
    }

    /// The shared pending-verification table.
    pub fn registry(&self) -> &PendingRegistry {
        &self.registry
    }

    /// Whether `text` is the recognized greeting token.
    ///
    /// Compared case-insensitively after trimming whitespace.
    pub fn is_greeting(&self, text: &str) -> bool {
        text.trim()
            .eq_ignore_ascii_case(self.verification.greeting.trim())
    }

    /// The configured housekeeping delay before prompt/notice deletion.
    fn delete_delay(&self) -> Duration {
        Duration::from_millis(self.verification.delete_delay_ms)
    }

    /// Handle a member joining the chat.
    ///
    /// Automated accounts are skipped entirely. Otherwise sends the welcome
    /// prompt, schedules the deadline, and registers the pending entry. A
    /// repeat join of a still-pending user replaces the old entry: its
    /// deadline is cancelled and its prompt scheduled for deletion.
    pub async fn handle_join(
        &self,
        chat: ChatId,
        user: UserId,
        display_name: &str,
        is_automated: bool,
    ) {
        if is_automated {
            debug!(%user, "skipping automated account");
            return;
        }

        let group_name = match self.gateway.chat_title(chat).await {
            Ok(Some(title)) => title,
            Ok(None) => FALLBACK_GROUP_NAME.to_string(),
            Err(e) => {
                warn!(%chat, error = %e, "failed to fetch chat title");
                FALLBACK_GROUP_NAME.to_string()
            }
        };

        let seconds = self.verification.timeout_ms.checked_div(1_000).unwrap_or(0);
        let text = self.messages.render_welcome(
            display_name,
            &group_name,
            seconds,
            &self.verification.greeting,
        );
        let prompt_message = match self.gateway.send_message(chat, &text).await {
            Ok(id) => id,
            Err(e) => {
                // Without a prompt there is nothing to track or clean up.
                warn!(%chat, %user, error = %e, "failed to send welcome prompt, join not tracked");
                return;
            }
        };

        let registry = Arc::clone(&self.registry);
        let gateway = Arc::clone(&self.gateway);
        let messages = self.messages.clone();
        let delete_delay = self.delete_delay();
        let timeout = Duration::from_millis(self.verification.timeout_ms);
        let name = display_name.to_owned();
        let task = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            deadline_fired(&registry, &gateway, &messages, delete_delay, user, &name).await;
        });

        let displaced = self.registry.register(
            user,
            PendingVerification {
                chat,
                deadline: DeadlineHandle::new(task),
                prompt_message,
                group_name,
            },
        );
        if let Some(old) = displaced {
            // Rejoin while still pending: the fresh entry supersedes the old
            // window.
            old.deadline.cancel();
            schedule_delete(&self.gateway, old.chat, vec![old.prompt_message], delete_delay);
            info!(%user, "replaced pending verification after repeat join");
        }

        info!(%chat, %user, timeout_ms = self.verification.timeout_ms, "verification started");
    }

    /// Handle a greeting token sent by `user`.
    ///
    /// If the user is pending, cancels their deadline, confirms the
    /// verification, and schedules cleanup of the prompt, the greeting and
    /// the confirmation. Anyone else gets the neutral acknowledgment and no
    /// state changes.
    pub async fn handle_greeting(&self, chat: ChatId, user: UserId, greeting_message: MessageId) {
        // Remove-first: a concurrently firing deadline must observe the
        // post-transition state.
        match self.registry.resolve(user) {
            Some(entry) => {
                entry.deadline.cancel();

                let text = self.messages.render_success(&entry.group_name);
                let mut cleanup = vec![entry.prompt_message, greeting_message];
                match self.gateway.send_message(entry.chat, &text).await {
                    Ok(id) => cleanup.push(id),
                    Err(e) => warn!(%user, error = %e, "failed to send success message"),
                }
                schedule_delete(&self.gateway, entry.chat, cleanup, self.delete_delay());

                info!(%user, "member verified");
            }
            None => {
                // Already verified or never tracked; acknowledge and move on.
                if let Err(e) = self
                    .gateway
                    .send_message(chat, &self.messages.not_pending)
                    .await
                {
                    warn!(%chat, error = %e, "failed to send acknowledgment");
                }
            }
        }
    }
}

/// Deadline body: restrict the member if they are still pending.
///
/// A `None` resolve means the greeting won the race; nothing to do.
async fn deadline_fired(
    registry: &PendingRegistry,
    gateway: &Arc<dyn ChatGateway>,
    messages: &MessagesConfig,
    delete_delay: Duration,
    user: UserId,
    display_name: &str,
) {
    let Some(entry) = registry.resolve(user) else {
        debug!(%user, "deadline fired for already-resolved user");
        return;
    };

    if let Err(e) = gateway.restrict_member(entry.chat, user, false).await {
        warn!(%user, error = %e, "failed to restrict member");
    }

    let text = messages.render_timeout_notice(display_name, &entry.group_name);
    let mut cleanup = vec![entry.prompt_message];
    match gateway.send_message(entry.chat, &text).await {
        Ok(id) => cleanup.push(id),
        Err(e) => warn!(%user, error = %e, "failed to send timeout notice"),
    }
    schedule_delete(gateway, entry.chat, cleanup, delete_delay);

    info!(%user, "verification timed out, member restricted");
}

/// Delete `messages` from `chat` after `delay`, best effort.
fn schedule_delete(
    gateway: &Arc<dyn ChatGateway>,
    chat: ChatId,
    messages: Vec<MessageId>,
    delay: Duration,
) {
    let gateway = Arc::clone(gateway);
    // Capture the deadline now so the delay counts from scheduling, not from
    // the spawned task's first poll.
    let deadline = tokio::time::Instant::now() + delay;
    tokio::spawn(async move {
        tokio::time::sleep_until(deadline).await;
        for message in messages {
            if let Err(e) = gateway.delete_message(chat, message).await {
                warn!(%chat, message = message.0, error = %e, "failed to delete message");
            }
        }
    });
}
