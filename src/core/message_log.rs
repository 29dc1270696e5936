//! Append-only message history
//!
//! All rooms share one flat collection in insertion order. Queries filter
//! by room; nothing is ever updated in place.

use tokio::sync::Mutex;

use crate::conversation::Message;

use super::store::{PersistentStore, MESSAGES_KEY};

pub struct MessageLog {
    store: PersistentStore,
    messages: Mutex<Vec<Message>>,
}

impl MessageLog {
    /// Load the log from the store
    pub async fn open(store: PersistentStore) -> Self {
        let messages = store.load(MESSAGES_KEY).await;
        Self {
            store,
            messages: Mutex::new(messages),
        }
    }

    /// Record a message. The room id is not checked against the registry.
    ///
    /// The cache only changes once the save has returned, so a caller
    /// dropped mid-save leaves it matching the store.
    pub async fn append(&self, message: Message) {
        let mut messages = self.messages.lock().await;
        tracing::debug!(room_id = %message.room_id, sender = ?message.sender, "Appending message");

        let mut updated = messages.clone();
        updated.push(message);
        self.store.save(MESSAGES_KEY, updated.as_slice()).await;
        *messages = updated;
    }

    /// Every message in the room, oldest first
    pub async fn by_room(&self, room_id: &str) -> Vec<Message> {
        self.messages
            .lock()
            .await
            .iter()
            .filter(|m| m.room_id == room_id)
            .cloned()
            .collect()
    }

    /// One page of the room's history, counted from the oldest message.
    ///
    /// Pages start at 1. Page 1 holds the oldest `page_size` messages. An
    /// empty result means the page is past the end (page 0 is always empty).
    pub async fn by_room_paged(&self, room_id: &str, page: usize, page_size: usize) -> Vec<Message> {
        if page == 0 {
            return Vec::new();
        }

        let start = (page - 1).saturating_mul(page_size);
        self.messages
            .lock()
            .await
            .iter()
            .filter(|m| m.room_id == room_id)
            .skip(start)
            .take(page_size)
            .cloned()
            .collect()
    }

    /// Remove every message in the room
    pub async fn clear_by_room(&self, room_id: &str) {
        let mut messages = self.messages.lock().await;
        let kept: Vec<Message> = messages
            .iter()
            .filter(|m| m.room_id != room_id)
            .cloned()
            .collect();
        self.store.save(MESSAGES_KEY, kept.as_slice()).await;

        tracing::info!(room_id, removed = messages.len() - kept.len(), "Cleared room history");
        *messages = kept;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::conversation::{NewMessage, Sender};
    use crate::core::store::{StorageBackend, StoreError};

    /// Reads succeed, writes never complete
    struct StalledWrites;

    #[async_trait]
    impl StorageBackend for StalledWrites {
        async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Ok(None)
        }

        async fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
            std::future::pending().await
        }

        async fn remove(&self, _key: &str) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn user_text(room: &str, text: &str) -> Message {
        Message::user(room, NewMessage::text(text))
    }

    #[tokio::test]
    async fn test_by_room_keeps_insertion_order() {
        let log = MessageLog::open(PersistentStore::in_memory()).await;

        log.append(user_text("r1", "one")).await;
        log.append(user_text("r2", "elsewhere")).await;
        log.append(Message::ai("r1", "two")).await;
        log.append(user_text("r1", "three")).await;

        let texts: Vec<_> = log
            .by_room("r1")
            .await
            .into_iter()
            .map(|m| m.text.unwrap())
            .collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_paging_from_oldest() {
        let log = MessageLog::open(PersistentStore::in_memory()).await;
        for i in 0..25 {
            log.append(user_text("room", &format!("msg {}", i))).await;
        }

        let first = log.by_room_paged("room", 1, 20).await;
        assert_eq!(first.len(), 20);
        assert_eq!(first[0].text.as_deref(), Some("msg 0"));
        assert_eq!(first[19].text.as_deref(), Some("msg 19"));

        let second = log.by_room_paged("room", 2, 20).await;
        assert_eq!(second.len(), 5);
        assert_eq!(second[0].text.as_deref(), Some("msg 20"));

        assert!(log.by_room_paged("room", 3, 20).await.is_empty());
        assert!(log.by_room_paged("room", 0, 20).await.is_empty());
    }

    #[tokio::test]
    async fn test_clear_by_room_only_touches_that_room() {
        let store = PersistentStore::in_memory();
        let log = MessageLog::open(store.clone()).await;

        log.append(user_text("a", "a1")).await;
        log.append(user_text("b", "b1")).await;
        log.append(Message::ai("a", "a2")).await;

        log.clear_by_room("a").await;

        assert!(log.by_room("a").await.is_empty());
        let b = log.by_room("b").await;
        assert_eq!(b.len(), 1);
        assert_eq!(b[0].sender, Sender::User);

        let reopened = MessageLog::open(store).await;
        assert_eq!(reopened.by_room("b").await, b);
        assert!(reopened.by_room("a").await.is_empty());
    }

    #[tokio::test]
    async fn test_orphan_messages_tolerated() {
        let log = MessageLog::open(PersistentStore::in_memory()).await;
        log.append(user_text("no-such-room", "hello")).await;
        assert_eq!(log.by_room("no-such-room").await.len(), 1);
    }

    #[tokio::test]
    async fn test_append_dropped_mid_save_leaves_cache_unchanged() {
        let log = MessageLog::open(PersistentStore::new(Arc::new(StalledWrites))).await;

        let write = log.append(user_text("room", "lost"));
        let result = tokio::time::timeout(Duration::from_millis(20), write).await;
        assert!(result.is_err());

        assert!(log.by_room("room").await.is_empty());
    }
}
