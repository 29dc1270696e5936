//! Chatroom and message types

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::ChatError;

/// Largest accepted decoded image payload (5 MiB)
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

const IMAGE_URI_PREFIX: &str = "data:image/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chatroom {
    pub id: String,
    pub title: String,
    pub created_at: i64,
}

impl Chatroom {
    pub fn new(title: &str) -> Self {
        Self {
            id: new_id(),
            title: title.to_string(),
            created_at: now_millis(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
}

/// One turn in a chatroom. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub room_id: String,
    pub sender: Sender,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Image as a data URI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub timestamp: i64,
}

impl Message {
    pub fn user(room_id: &str, input: NewMessage) -> Self {
        Self {
            id: new_id(),
            room_id: room_id.to_string(),
            sender: Sender::User,
            text: input.text,
            image: input.image,
            timestamp: now_millis(),
        }
    }

    pub fn ai(room_id: &str, text: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            room_id: room_id.to_string(),
            sender: Sender::Ai,
            text: Some(text.into()),
            image: None,
            timestamp: now_millis(),
        }
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }
}

/// User input for a new message, before validation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewMessage {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

impl NewMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            image: None,
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Normalize and check the input.
    ///
    /// Blank text counts as absent. At least one of text or image must
    /// remain, and an image must be a `data:image/...` URI within
    /// [`MAX_IMAGE_BYTES`].
    pub fn validate(self) -> Result<Self, ChatError> {
        let text = self.text.filter(|t| !t.trim().is_empty());
        let image = self.image.filter(|i| !i.is_empty());

        if text.is_none() && image.is_none() {
            return Err(ChatError::InvalidInput(
                "message needs text or an image".to_string(),
            ));
        }

        if let Some(ref uri) = image {
            validate_image(uri)?;
        }

        Ok(Self { text, image })
    }
}

fn validate_image(uri: &str) -> Result<(), ChatError> {
    if !uri.starts_with(IMAGE_URI_PREFIX) {
        return Err(ChatError::InvalidInput(
            "image must be a data:image URI".to_string(),
        ));
    }

    let payload = uri
        .split_once(',')
        .map(|(_, data)| data)
        .ok_or_else(|| ChatError::InvalidInput("image data URI has no payload".to_string()))?;

    // base64 expands 3 bytes into 4 characters
    if payload.len() / 4 * 3 > MAX_IMAGE_BYTES {
        return Err(ChatError::InvalidInput(
            "image exceeds the 5 MiB limit".to_string(),
        ));
    }

    Ok(())
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
