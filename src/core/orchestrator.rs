//! Conversation orchestration
//!
//! A user turn is recorded before any provider work starts. The reply is
//! produced on its own task and always ends in a recorded AI message: the
//! reply source's answer, or a local fallback when the source errors or
//! panics.
//!
//! Turns in the same room are not serialized. Each reply is appended when
//! it completes, so overlapping turns may interleave.
//!
//! Replies still being generated are tracked per room. Resetting a room
//! aborts them, so a deleted room never receives a late reply.

use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::{AbortHandle, JoinHandle};

use crate::conversation::{Message, NewMessage};

use super::gateway::{local_fallback, ReplySource};
use super::message_log::MessageLog;
use super::ChatError;

/// One in-flight turn
pub struct Turn {
    /// The recorded user message
    pub user_message: Message,
    reply: JoinHandle<Message>,
}

impl Turn {
    /// Wait for the AI message. `None` if the turn was cancelled.
    pub async fn reply(self) -> Option<Message> {
        self.reply.await.ok()
    }

    /// Abandon the reply. Nothing further is recorded for this turn.
    pub fn cancel(&self) {
        self.reply.abort();
    }
}

/// Reply tasks that have not finished yet, keyed by room
#[derive(Default)]
struct PendingReplies {
    next_id: u64,
    by_room: HashMap<String, HashMap<u64, AbortHandle>>,
}

impl PendingReplies {
    fn finish(&mut self, room_id: &str, id: u64) {
        if let Some(tasks) = self.by_room.get_mut(room_id) {
            tasks.remove(&id);
            if tasks.is_empty() {
                self.by_room.remove(room_id);
            }
        }
    }
}

fn lock(pending: &Mutex<PendingReplies>) -> MutexGuard<'_, PendingReplies> {
    // answer() never unwinds, so a poisoned lock still holds consistent data
    pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct ConversationOrchestrator {
    messages: Arc<MessageLog>,
    replies: Arc<dyn ReplySource>,
    pending: Arc<Mutex<PendingReplies>>,
}

impl ConversationOrchestrator {
    pub fn new(messages: Arc<MessageLog>, replies: Arc<dyn ReplySource>) -> Self {
        Self {
            messages,
            replies,
            pending: Arc::new(Mutex::new(PendingReplies::default())),
        }
    }

    /// Record the user's message and start generating the reply.
    ///
    /// Invalid input is rejected before anything is stored. The room id is
    /// not checked here.
    pub async fn send(&self, room_id: &str, input: NewMessage) -> Result<Turn, ChatError> {
        let input = input.validate()?;
        let user_message = Message::user(room_id, input);

        self.messages.append(user_message.clone()).await;

        let text = user_message.text.clone().unwrap_or_default();
        let has_image = user_message.has_image();

        tracing::debug!(room_id, has_image, "User turn recorded, requesting reply");

        let reply = {
            let mut pending = lock(&self.pending);
            let id = pending.next_id;
            pending.next_id += 1;

            let generate = answer(
                self.messages.clone(),
                self.replies.clone(),
                room_id.to_string(),
                text,
                has_image,
            );
            let tracker = self.pending.clone();
            let room = room_id.to_string();

            let task = tokio::spawn(async move {
                let message = generate.await;
                lock(&tracker).finish(&room, id);
                message
            });

            let tasks = pending.by_room.entry(room_id.to_string()).or_default();
            // cancelled turns never reach finish()
            tasks.retain(|_, handle| !handle.is_finished());
            tasks.insert(id, task.abort_handle());
            task
        };

        Ok(Turn {
            user_message,
            reply,
        })
    }

    /// Abort the room's pending replies and forget reply-source state for it
    pub fn reset_room(&self, room_id: &str) {
        let aborted = lock(&self.pending).by_room.remove(room_id);
        if let Some(tasks) = aborted {
            tracing::debug!(room_id, count = tasks.len(), "Aborting pending replies");
            for handle in tasks.into_values() {
                handle.abort();
            }
        }

        self.replies.reset(room_id);
    }

    #[cfg(test)]
    fn in_flight(&self, room_id: &str) -> usize {
        lock(&self.pending)
            .by_room
            .get(room_id)
            .map_or(0, |tasks| tasks.len())
    }

    pub fn reset_all(&self) {
        self.replies.reset_all();
    }
}

async fn answer(
    messages: Arc<MessageLog>,
    replies: Arc<dyn ReplySource>,
    room_id: String,
    text: String,
    has_image: bool,
) -> Message {
    let outcome = AssertUnwindSafe(replies.respond(&text, has_image))
        .catch_unwind()
        .await;

    let reply = match outcome {
        Ok(Ok(reply)) => reply,
        Ok(Err(e)) => {
            tracing::warn!(room_id = %room_id, error = %e, "Reply source failed, using local fallback");
            local_fallback(has_image).to_string()
        }
        Err(_) => {
            tracing::error!(room_id = %room_id, "Reply source panicked, using local fallback");
            local_fallback(has_image).to_string()
        }
    };

    let message = Message::ai(&room_id, reply);
    messages.append(message.clone()).await;
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio::sync::Notify;

    use crate::config::prompts_builtin::FALLBACK_REPLIES;
    use crate::conversation::Sender;
    use crate::core::gateway::tests::{endpoints, FakeClient, Scripted};
    use crate::core::gateway::AiGateway;
    use crate::core::registry::ChatroomRegistry;
    use crate::core::store::PersistentStore;
    use crate::providers::ProviderError;

    struct FailingSource;

    #[async_trait]
    impl ReplySource for FailingSource {
        async fn respond(&self, _text: &str, _has_image: bool) -> Result<String, ProviderError> {
            Err(ProviderError::Unavailable("broken".to_string()))
        }
    }

    struct PanickingSource;

    #[async_trait]
    impl ReplySource for PanickingSource {
        async fn respond(&self, _text: &str, _has_image: bool) -> Result<String, ProviderError> {
            panic!("reply source defect");
        }
    }

    /// Holds every reply until released
    struct GatedSource {
        gate: Notify,
    }

    #[async_trait]
    impl ReplySource for GatedSource {
        async fn respond(&self, text: &str, _has_image: bool) -> Result<String, ProviderError> {
            self.gate.notified().await;
            Ok(format!("echo: {}", text))
        }
    }

    async fn log() -> Arc<MessageLog> {
        Arc::new(MessageLog::open(PersistentStore::in_memory()).await)
    }

    #[tokio::test]
    async fn test_end_to_end_with_failing_provider() {
        let store = PersistentStore::in_memory();
        let registry = ChatroomRegistry::open(store.clone()).await;
        let messages = Arc::new(MessageLog::open(store).await);

        let client = FakeClient::new(
            true,
            vec![Scripted::ServerError, Scripted::ServerError, Scripted::ServerError],
        );
        let gateway = Arc::new(AiGateway::new(client, endpoints()));
        let orchestrator = ConversationOrchestrator::new(messages.clone(), gateway);

        let room = registry.create("Test").await.unwrap();
        let turn = orchestrator
            .send(&room.id, NewMessage::text("Hello"))
            .await
            .unwrap();

        // user message is visible before the reply resolves
        let history = messages.by_room(&room.id).await;
        assert!(!history.is_empty());
        assert_eq!(history[0].sender, Sender::User);
        assert_eq!(history[0].text.as_deref(), Some("Hello"));

        let reply = turn.reply().await.unwrap();
        let history = messages.by_room(&room.id).await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[1], reply);
        assert_eq!(reply.sender, Sender::Ai);
        assert!(FALLBACK_REPLIES.contains(&reply.text.as_deref().unwrap()));
    }

    #[tokio::test]
    async fn test_user_message_recorded_before_reply() {
        let messages = log().await;
        let source = Arc::new(GatedSource {
            gate: Notify::new(),
        });
        let orchestrator = ConversationOrchestrator::new(messages.clone(), source.clone());

        let turn = orchestrator
            .send("room", NewMessage::text("ping"))
            .await
            .unwrap();

        let history = messages.by_room("room").await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0], turn.user_message);

        source.gate.notify_one();
        let reply = turn.reply().await.unwrap();
        assert_eq!(reply.text.as_deref(), Some("echo: ping"));
        assert_eq!(messages.by_room("room").await.len(), 2);
    }

    #[tokio::test]
    async fn test_source_error_gets_local_fallback() {
        let messages = log().await;
        let orchestrator = ConversationOrchestrator::new(messages.clone(), Arc::new(FailingSource));

        let turn = orchestrator
            .send("room", NewMessage::text("hi"))
            .await
            .unwrap();
        let reply = turn.reply().await.unwrap();

        assert_eq!(reply.text.as_deref(), Some(local_fallback(false)));
        assert_eq!(messages.by_room("room").await.len(), 2);
    }

    #[tokio::test]
    async fn test_source_panic_gets_local_fallback() {
        let messages = log().await;
        let orchestrator =
            ConversationOrchestrator::new(messages.clone(), Arc::new(PanickingSource));

        let input = NewMessage::text("look").with_image("data:image/png;base64,AAAA");
        let turn = orchestrator.send("room", input).await.unwrap();
        let reply = turn.reply().await.unwrap();

        assert_eq!(reply.text.as_deref(), Some(local_fallback(true)));
        assert_eq!(messages.by_room("room").await.len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_input_stores_nothing() {
        let messages = log().await;
        let orchestrator = ConversationOrchestrator::new(messages.clone(), Arc::new(FailingSource));

        let result = orchestrator.send("room", NewMessage::text("  ")).await;
        assert!(matches!(result, Err(ChatError::InvalidInput(_))));
        assert!(messages.by_room("room").await.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_turn_records_no_reply() {
        let messages = log().await;
        let source = Arc::new(GatedSource {
            gate: Notify::new(),
        });
        let orchestrator = ConversationOrchestrator::new(messages.clone(), source);

        let turn = orchestrator
            .send("room", NewMessage::text("never mind"))
            .await
            .unwrap();
        turn.cancel();

        assert!(turn.reply().await.is_none());
        assert_eq!(messages.by_room("room").await.len(), 1);
    }

    #[tokio::test]
    async fn test_reset_room_drops_pending_reply() {
        let store = PersistentStore::in_memory();
        let registry = ChatroomRegistry::open(store.clone()).await;
        let messages = Arc::new(MessageLog::open(store.clone()).await);
        let source = Arc::new(GatedSource {
            gate: Notify::new(),
        });
        let orchestrator = ConversationOrchestrator::new(messages.clone(), source.clone());

        let room = registry.create("Doomed").await.unwrap();
        let turn = orchestrator
            .send(&room.id, NewMessage::text("anyone there?"))
            .await
            .unwrap();
        assert_eq!(orchestrator.in_flight(&room.id), 1);

        registry.delete(&room.id).await;
        orchestrator.reset_room(&room.id);
        messages.clear_by_room(&room.id).await;
        source.gate.notify_one();

        assert!(turn.reply().await.is_none());
        assert_eq!(orchestrator.in_flight(&room.id), 0);
        assert!(messages.by_room(&room.id).await.is_empty());

        let reopened = MessageLog::open(store).await;
        assert!(reopened.by_room(&room.id).await.is_empty());
    }

    #[tokio::test]
    async fn test_reset_room_leaves_other_rooms_alone() {
        let messages = log().await;
        let source = Arc::new(GatedSource {
            gate: Notify::new(),
        });
        let orchestrator = ConversationOrchestrator::new(messages.clone(), source.clone());

        let doomed = orchestrator
            .send("a", NewMessage::text("first"))
            .await
            .unwrap();
        let kept = orchestrator
            .send("b", NewMessage::text("second"))
            .await
            .unwrap();

        orchestrator.reset_room("a");
        assert!(doomed.reply().await.is_none());

        source.gate.notify_one();
        let reply = kept.reply().await.unwrap();
        assert_eq!(reply.text.as_deref(), Some("echo: second"));
        assert_eq!(orchestrator.in_flight("b"), 0);
        assert_eq!(messages.by_room("b").await.len(), 2);
    }
}
