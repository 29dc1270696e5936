//! Chatroom registry
//!
//! Rooms are kept in creation order. Each mutation rewrites the whole
//! collection while holding the lock, so concurrent writers cannot lose
//! updates.

use tokio::sync::Mutex;

use crate::conversation::Chatroom;

use super::store::{PersistentStore, CHATROOMS_KEY};
use super::ChatError;

pub struct ChatroomRegistry {
    store: PersistentStore,
    rooms: Mutex<Vec<Chatroom>>,
}

impl ChatroomRegistry {
    /// Load the registry from the store
    pub async fn open(store: PersistentStore) -> Self {
        let rooms = store.load(CHATROOMS_KEY).await;
        Self {
            store,
            rooms: Mutex::new(rooms),
        }
    }

    /// Create a room. The title is trimmed and must not be empty.
    pub async fn create(&self, title: &str) -> Result<Chatroom, ChatError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ChatError::InvalidInput(
                "chatroom title must not be empty".to_string(),
            ));
        }

        let room = Chatroom::new(title);

        let mut rooms = self.rooms.lock().await;
        rooms.push(room.clone());
        self.store.save(CHATROOMS_KEY, rooms.as_slice()).await;

        tracing::info!(room_id = %room.id, title = %room.title, "Created chatroom");
        Ok(room)
    }

    /// Remove a room. Unknown ids are ignored.
    ///
    /// Messages are not touched; callers clear them through the message log.
    pub async fn delete(&self, id: &str) {
        let mut rooms = self.rooms.lock().await;
        let before = rooms.len();
        rooms.retain(|r| r.id != id);

        if rooms.len() == before {
            tracing::debug!(room_id = id, "Delete of unknown chatroom ignored");
            return;
        }

        self.store.save(CHATROOMS_KEY, rooms.as_slice()).await;
        tracing::info!(room_id = id, "Deleted chatroom");
    }

    /// All rooms in creation order
    pub async fn list(&self) -> Vec<Chatroom> {
        self.rooms.lock().await.clone()
    }

    pub async fn get(&self, id: &str) -> Option<Chatroom> {
        self.rooms.lock().await.iter().find(|r| r.id == id).cloned()
    }

    /// Rooms whose title contains `substring`
    pub async fn find_by_title(&self, substring: &str, case_insensitive: bool) -> Vec<Chatroom> {
        let rooms = self.rooms.lock().await;

        if case_insensitive {
            let needle = substring.to_lowercase();
            rooms
                .iter()
                .filter(|r| r.title.to_lowercase().contains(&needle))
                .cloned()
                .collect()
        } else {
            rooms
                .iter()
                .filter(|r| r.title.contains(substring))
                .cloned()
                .collect()
        }
    }
}
