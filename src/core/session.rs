//! Demo phone login
//!
//! There is no real verification: one fixed code unlocks any phone
//! number. The signed-in user is persisted so a restart keeps the session.

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::store::{PersistentStore, AUTH_KEY};
use super::ChatError;

const MIN_PHONE_DIGITS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub phone: String,
    pub country_code: String,
}

/// Returned after an OTP is "sent"
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpChallenge {
    pub phone: String,
    pub country_code: String,
    pub hint: String,
}

pub struct SessionManager {
    store: PersistentStore,
    demo_code: String,
    current: RwLock<Option<User>>,
}

impl SessionManager {
    /// Restore the persisted session, if any
    pub async fn open(store: PersistentStore, demo_code: impl Into<String>) -> Self {
        let current = store.load_value::<User>(AUTH_KEY).await;
        if let Some(ref user) = current {
            tracing::debug!(phone = %user.phone, "Restored session");
        }

        Self {
            store,
            demo_code: demo_code.into(),
            current: RwLock::new(current),
        }
    }

    /// Start a login. Nothing is actually sent.
    pub fn request_otp(&self, phone: &str, country_code: &str) -> Result<OtpChallenge, ChatError> {
        let user = validate(phone, country_code)?;
        tracing::info!(phone = %user.phone, "OTP requested");

        Ok(OtpChallenge {
            phone: user.phone,
            country_code: user.country_code,
            hint: format!("Enter {} to verify!", self.demo_code),
        })
    }

    /// Finish a login with the code and persist the user
    pub async fn verify(&self, phone: &str, country_code: &str, otp: &str) -> Result<User, ChatError> {
        let user = validate(phone, country_code)?;

        if otp.trim() != self.demo_code {
            tracing::warn!(phone = %user.phone, "Rejected OTP");
            return Err(ChatError::InvalidOtp);
        }

        self.store.save_value(AUTH_KEY, &user).await;
        *self.current.write().await = Some(user.clone());

        tracing::info!(phone = %user.phone, "Signed in");
        Ok(user)
    }

    pub async fn current(&self) -> Option<User> {
        self.current.read().await.clone()
    }

    pub async fn logout(&self) {
        self.store.remove(AUTH_KEY).await;
        if let Some(user) = self.current.write().await.take() {
            tracing::info!(phone = %user.phone, "Signed out");
        }
    }
}

fn validate(phone: &str, country_code: &str) -> Result<User, ChatError> {
    let country_code = country_code.trim();
    if country_code.is_empty() {
        return Err(ChatError::InvalidInput("Please select a country".to_string()));
    }

    let phone = phone.trim();
    if phone.chars().filter(|c| c.is_ascii_digit()).count() < MIN_PHONE_DIGITS {
        return Err(ChatError::InvalidInput(
            "Phone number must be at least 10 digits".to_string(),
        ));
    }

    Ok(User {
        phone: phone.to_string(),
        country_code: country_code.to_string(),
    })
}
