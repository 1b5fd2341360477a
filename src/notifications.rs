#![cfg(feature = "web")]
//! Push notifications sent to the establishment's registered devices

use chrono::{DateTime, Utc};
use log::{info, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;

use crate::config::PushConfig;
use crate::error::{NackError, Result};
use crate::models::Profile;
use crate::store::Store;

/// Devices remembered per establishment
pub const MAX_PUSH_TOKENS: usize = 20;

/// A notification for one device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushMessage {
    pub token: String,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl PushMessage {
    /// Body of the send request
    fn payload(&self) -> serde_json::Value {
        json!({
            "message": {
                "token": self.token,
                "notification": {
                    "title": self.title,
                    "body": self.body,
                },
                "data": self.data,
            }
        })
    }
}

#[derive(Clone)]
pub struct PushDispatcher {
    client: Client,
    config: PushConfig,
}

impl PushDispatcher {
    pub fn new(client: Client, config: PushConfig) -> Self {
        Self { client, config }
    }

    pub fn is_configured(&self) -> bool {
        !self.config.access_token.is_empty()
    }

    /// Deliver one message; a single attempt
    pub async fn send(&self, message: &PushMessage) -> Result<()> {
        if !self.is_configured() {
            return Err(NackError::Upstream("push service is not configured".to_string()));
        }
        if message.token.trim().is_empty() || message.title.trim().is_empty() {
            return Err(NackError::invalid("a push message needs a token and a title"));
        }

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.access_token)
            .json(&message.payload())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NackError::Upstream(format!("push service returned {}", status)));
        }
        Ok(())
    }

    /// Send to every device of an establishment and return how many accepted
    ///
    /// Failures are logged and skipped.
    pub async fn notify_establishment(
        &self,
        store: &Store,
        establishment_id: &str,
        title: &str,
        body: &str,
        data: BTreeMap<String, String>,
    ) -> usize {
        let Some(profile) = store.get::<Profile>(establishment_id, establishment_id) else {
            return 0;
        };

        let mut delivered = 0;
        for token in &profile.push_tokens {
            let message = PushMessage {
                token: token.clone(),
                title: title.to_string(),
                body: body.to_string(),
                data: data.clone(),
            };
            match self.send(&message).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!("Push to a device of {} failed: {}", establishment_id, e),
            }
        }

        if delivered > 0 {
            info!("Notified {} device(s) of {}: {}", delivered, establishment_id, title);
        }
        delivered
    }
}

/// Remember a device token; the oldest tokens are forgotten past the limit
pub fn register_token(
    store: &Store,
    establishment_id: &str,
    token: &str,
    now: DateTime<Utc>,
) -> Result<Profile> {
    let token = token.trim();
    if token.is_empty() {
        return Err(NackError::invalid("device token is empty"));
    }
    store.update::<Profile, _>(establishment_id, establishment_id, |profile| {
        profile.push_tokens.retain(|t| t != token);
        profile.push_tokens.push(token.to_string());
        let excess = profile.push_tokens.len().saturating_sub(MAX_PUSH_TOKENS);
        profile.push_tokens.drain(..excess);
        profile.updated_at = now;
        Ok(())
    })
}

pub fn unregister_token(
    store: &Store,
    establishment_id: &str,
    token: &str,
    now: DateTime<Utc>,
) -> Result<Profile> {
    store.update::<Profile, _>(establishment_id, establishment_id, |profile| {
        profile.push_tokens.retain(|t| t != token);
        profile.updated_at = now;
        Ok(())
    })
}
