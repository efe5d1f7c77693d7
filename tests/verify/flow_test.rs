//! End-to-end verification scenarios against a recording mock gateway.
//!
//! Time is paused (`start_paused = true`); deadlines fire via
//! `tokio::time::advance`.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use teloxide::types::{ChatId, MessageId, UserId};

use doorman::config::{MessagesConfig, VerificationConfig};
use doorman::gateway::{ChatGateway, GatewayError};
use doorman::verify::{PendingRegistry, Verifier};

const CHAT: ChatId = ChatId(-1_000);

/// One recorded outbound gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Send {
        chat: ChatId,
        id: MessageId,
        text: String,
    },
    Delete {
        chat: ChatId,
        message: MessageId,
    },
    Restrict {
        chat: ChatId,
        user: UserId,
        can_send: bool,
    },
}

/// Recording [`ChatGateway`] double with optional failure injection.
struct MockGateway {
    calls: Mutex<Vec<Call>>,
    next_id: AtomicI32,
    title: Option<String>,
    fail_sends: bool,
    fail_restricts: bool,
}

impl MockGateway {
    fn new(title: &str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            next_id: AtomicI32::new(1),
            title: Some(title.to_string()),
            fail_sends: false,
            fail_restricts: false,
        }
    }

    fn failing_sends(mut self) -> Self {
        self.fail_sends = true;
        self
    }

    fn failing_restricts(mut self) -> Self {
        self.fail_restricts = true;
        self
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn sent_texts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Send { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    fn restrictions(&self) -> Vec<(UserId, bool)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Restrict { user, can_send, .. } => Some((user, can_send)),
                _ => None,
            })
            .collect()
    }

    fn deleted(&self) -> Vec<MessageId> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Delete { message, .. } => Some(message),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl ChatGateway for MockGateway {
    async fn send_message(&self, chat: ChatId, text: &str) -> Result<MessageId, GatewayError> {
        if self.fail_sends {
            return Err(GatewayError::Api("send rejected".to_string()));
        }
        let id = MessageId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.calls.lock().expect("calls lock").push(Call::Send {
            chat,
            id,
            text: text.to_string(),
        });
        Ok(id)
    }

    async fn delete_message(&self, chat: ChatId, message: MessageId) -> Result<(), GatewayError> {
        self.calls
            .lock()
            .expect("calls lock")
            .push(Call::Delete { chat, message });
        Ok(())
    }

    async fn restrict_member(
        &self,
        chat: ChatId,
        user: UserId,
        can_send: bool,
    ) -> Result<(), GatewayError> {
        if self.fail_restricts {
            return Err(GatewayError::Api("restrict rejected".to_string()));
        }
        self.calls.lock().expect("calls lock").push(Call::Restrict {
            chat,
            user,
            can_send,
        });
        Ok(())
    }

    async fn chat_title(&self, _chat: ChatId) -> Result<Option<String>, GatewayError> {
        Ok(self.title.clone())
    }
}

fn make_verifier(gateway: Arc<MockGateway>) -> Arc<Verifier> {
    Arc::new(Verifier::new(
        Arc::new(PendingRegistry::new()),
        gateway,
        VerificationConfig::default(),
        MessagesConfig::default(),
    ))
}

/// Let spawned deadline and cleanup tasks run between time jumps.
async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

// ---------------------------------------------------------------------------
// Scenario A: greeting in time
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn greeting_in_time_verifies_member() {
    let gateway = Arc::new(MockGateway::new("Test"));
    let verifier = make_verifier(Arc::clone(&gateway));
    let alice = UserId(1);

    verifier.handle_join(CHAT, alice, "Alice", false).await;
    settle().await;
    assert!(verifier.registry().is_pending(alice));

    let prompts = gateway.sent_texts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Alice"));
    assert!(prompts[0].contains("Test"));
    assert!(prompts[0].contains("30"));

    tokio::time::advance(Duration::from_secs(5)).await;
    settle().await;
    verifier.handle_greeting(CHAT, alice, MessageId(500)).await;
    assert!(!verifier.registry().is_pending(alice));

    let texts = gateway.sent_texts();
    assert!(
        texts.iter().any(|t| t.contains("Verification passed") && t.contains("Test")),
        "success message should name the group"
    );

    // Well past the original deadline: no restriction may fire.
    tokio::time::advance(Duration::from_secs(120)).await;
    settle().await;
    assert!(gateway.restrictions().is_empty());

    // Cleanup removed the prompt, the greeting and the success message.
    let deleted = gateway.deleted();
    assert!(deleted.contains(&MessageId(1)), "prompt should be deleted");
    assert!(deleted.contains(&MessageId(500)), "greeting should be deleted");
    assert!(deleted.contains(&MessageId(2)), "success message should be deleted");
}

// ---------------------------------------------------------------------------
// Scenario B: deadline fires
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn silence_past_deadline_restricts_member() {
    let gateway = Arc::new(MockGateway::new("Test"));
    let verifier = make_verifier(Arc::clone(&gateway));
    let bob = UserId(2);

    verifier.handle_join(CHAT, bob, "Bob", false).await;
    settle().await;
    assert!(verifier.registry().is_pending(bob));

    tokio::time::advance(Duration::from_secs(31)).await;
    settle().await;

    assert!(!verifier.registry().is_pending(bob));
    assert_eq!(gateway.restrictions(), vec![(bob, false)]);
    assert!(
        gateway
            .sent_texts()
            .iter()
            .any(|t| t.contains("Bob") && t.contains("muted")),
        "timeout notice should name the member"
    );

    // Notice and prompt are cleaned up after the delete delay.
    tokio::time::advance(Duration::from_secs(11)).await;
    settle().await;
    let deleted = gateway.deleted();
    assert!(deleted.contains(&MessageId(1)), "prompt should be deleted");
    assert!(deleted.contains(&MessageId(2)), "notice should be deleted");
}

// ---------------------------------------------------------------------------
// Scenario C: unrelated sender
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn greeting_from_unrelated_user_does_not_resolve() {
    let gateway = Arc::new(MockGateway::new("Test"));
    let verifier = make_verifier(Arc::clone(&gateway));
    let carol = UserId(3);
    let dave = UserId(4);

    verifier.handle_join(CHAT, carol, "Carol", false).await;
    settle().await;

    verifier.handle_greeting(CHAT, dave, MessageId(600)).await;

    // Dave gets the neutral reply; Carol's window is untouched.
    assert!(gateway.sent_texts().iter().any(|t| t == "Hey there"));
    assert!(verifier.registry().is_pending(carol));
    assert!(gateway.restrictions().is_empty());

    // Carol's deadline still fires on schedule.
    tokio::time::advance(Duration::from_secs(31)).await;
    settle().await;
    assert_eq!(gateway.restrictions(), vec![(carol, false)]);
}

// ---------------------------------------------------------------------------
// Scenario D: concurrent joins are independent
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn concurrent_joins_resolve_independently() {
    let gateway = Arc::new(MockGateway::new("Test"));
    let verifier = make_verifier(Arc::clone(&gateway));
    let alice = UserId(5);
    let bob = UserId(6);

    verifier.handle_join(CHAT, alice, "Alice", false).await;
    verifier.handle_join(CHAT, bob, "Bob", false).await;
    settle().await;
    assert!(verifier.registry().is_pending(alice));
    assert!(verifier.registry().is_pending(bob));

    verifier.handle_greeting(CHAT, alice, MessageId(700)).await;
    assert!(!verifier.registry().is_pending(alice));
    assert!(verifier.registry().is_pending(bob), "Bob's entry must survive");

    tokio::time::advance(Duration::from_secs(31)).await;
    settle().await;
    assert_eq!(gateway.restrictions(), vec![(bob, false)]);
}

// ---------------------------------------------------------------------------
// Idempotence and races
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn greeting_after_deadline_is_neutral_noop() {
    let gateway = Arc::new(MockGateway::new("Test"));
    let verifier = make_verifier(Arc::clone(&gateway));
    let user = UserId(7);

    verifier.handle_join(CHAT, user, "Eve", false).await;
    settle().await;
    tokio::time::advance(Duration::from_secs(31)).await;
    settle().await;
    assert_eq!(gateway.restrictions().len(), 1);

    // The late greeting takes the no-op path: no success message, no second
    // side-effect run.
    verifier.handle_greeting(CHAT, user, MessageId(800)).await;
    assert_eq!(gateway.restrictions().len(), 1);
    assert!(!gateway.sent_texts().iter().any(|t| t.contains("Verification passed")));
    assert!(gateway.sent_texts().iter().any(|t| t == "Hey there"));
}

#[tokio::test(start_paused = true)]
async fn automated_accounts_are_skipped() {
    let gateway = Arc::new(MockGateway::new("Test"));
    let verifier = make_verifier(Arc::clone(&gateway));
    let bot_user = UserId(8);

    verifier.handle_join(CHAT, bot_user, "SomeBot", true).await;
    settle().await;

    assert!(!verifier.registry().is_pending(bot_user));
    assert!(gateway.sent_texts().is_empty(), "no welcome for automated accounts");
}

#[tokio::test(start_paused = true)]
async fn repeat_join_replaces_pending_entry() {
    let gateway = Arc::new(MockGateway::new("Test"));
    let verifier = make_verifier(Arc::clone(&gateway));
    let user = UserId(9);

    verifier.handle_join(CHAT, user, "Flaky", false).await;
    settle().await;
    tokio::time::advance(Duration::from_secs(20)).await;
    settle().await;

    // Rejoin 20s in: fresh prompt, fresh deadline.
    verifier.handle_join(CHAT, user, "Flaky", false).await;
    settle().await;
    assert!(verifier.registry().is_pending(user));

    // The original deadline (due at t=30s) was cancelled with the old entry.
    tokio::time::advance(Duration::from_secs(15)).await;
    settle().await;
    assert!(gateway.restrictions().is_empty());
    assert!(verifier.registry().is_pending(user));

    // The old prompt was scheduled for deletion when it was displaced.
    assert!(gateway.deleted().contains(&MessageId(1)));

    // The replacement window still expires on its own schedule (t=50s).
    tokio::time::advance(Duration::from_secs(20)).await;
    settle().await;
    assert_eq!(gateway.restrictions(), vec![(user, false)]);
}

// ---------------------------------------------------------------------------
// Gateway failure tolerance
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn failed_restriction_still_removes_entry() {
    let gateway = Arc::new(MockGateway::new("Test").failing_restricts());
    let verifier = make_verifier(Arc::clone(&gateway));
    let user = UserId(10);

    verifier.handle_join(CHAT, user, "Ghost", false).await;
    settle().await;
    tokio::time::advance(Duration::from_secs(31)).await;
    settle().await;

    // Restriction call failed, but the registry is consistent and the notice
    // still went out.
    assert!(!verifier.registry().is_pending(user));
    assert!(gateway.sent_texts().iter().any(|t| t.contains("muted")));
}

#[tokio::test(start_paused = true)]
async fn failed_prompt_send_leaves_join_untracked() {
    let gateway = Arc::new(MockGateway::new("Test").failing_sends());
    let verifier = make_verifier(Arc::clone(&gateway));
    let user = UserId(11);

    verifier.handle_join(CHAT, user, "Unlucky", false).await;
    settle().await;

    assert!(!verifier.registry().is_pending(user));

    // No deadline was scheduled, so nothing fires later.
    tokio::time::advance(Duration::from_secs(60)).await;
    settle().await;
    assert!(gateway.restrictions().is_empty());
}

// ---------------------------------------------------------------------------
// Greeting token matching
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn greeting_match_is_trimmed_and_case_insensitive() {
    let gateway = Arc::new(MockGateway::new("Test"));
    let verifier = make_verifier(gateway);

    assert!(verifier.is_greeting("Hi"));
    assert!(verifier.is_greeting("hi"));
    assert!(verifier.is_greeting("  HI  "));
    assert!(!verifier.is_greeting("hi there"));
    assert!(!verifier.is_greeting(""));
}
