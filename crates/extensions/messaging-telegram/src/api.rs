//! Bot API wire types and the HTTP call helper.

use std::collections::BTreeMap;
use std::time::Duration;

use ratewatch_protocols::GroupInfo;
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::trace;

use crate::error::ApiError;

/// Envelope of every Bot API response.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<i64>,
}

/// A Telegram user or bot.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: String,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: Option<String>,
}

impl Chat {
    pub fn is_group(&self) -> bool {
        matches!(self.kind.as_str(), "group" | "supergroup")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatMember {
    pub status: String,
    pub user: User,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatMemberUpdated {
    pub chat: Chat,
    pub new_chat_member: ChatMember,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub my_chat_member: Option<ChatMemberUpdated>,
}

/// Fold a batch of updates into the known group set.
///
/// Groups are keyed by chat id. A later title replaces an earlier one, and
/// a `my_chat_member` update that removes the bot drops the group.
pub fn groups_from_updates(known: &mut BTreeMap<i64, GroupInfo>, updates: &[Update]) {
    for update in updates {
        if let Some(member) = &update.my_chat_member {
            if !member.chat.is_group() {
                continue;
            }
            match member.new_chat_member.status.as_str() {
                "left" | "kicked" => {
                    known.remove(&member.chat.id);
                }
                _ => remember(known, &member.chat),
            }
        } else if let Some(message) = &update.message {
            if message.chat.is_group() {
                remember(known, &message.chat);
            }
        }
    }
}

fn remember(known: &mut BTreeMap<i64, GroupInfo>, chat: &Chat) {
    let name = chat.title.clone().unwrap_or_default();
    known
        .entry(chat.id)
        .and_modify(|g| g.name = name.clone())
        .or_insert_with(|| GroupInfo::new(chat.id.to_string(), name));
}

/// Thin Bot API caller.
#[derive(Debug, Clone)]
pub(crate) struct BotApi {
    http: reqwest::Client,
    base: String,
}

impl BotApi {
    pub(crate) fn new(base: &str, timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    pub(crate) fn method_url(&self, token: &str, method: &str) -> String {
        format!("{}/bot{}/{}", self.base, token, method)
    }

    /// POST `body` to `method` and unwrap the response envelope.
    pub(crate) async fn call<T: DeserializeOwned>(
        &self,
        token: &str,
        method: &str,
        body: &Value,
    ) -> Result<T, ApiError> {
        trace!("Bot API call: {}", method);
        let resp = self
            .http
            .post(self.method_url(token, method))
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        let envelope: ApiResponse<T> = match resp.json().await {
            Ok(envelope) => envelope,
            Err(_) if status == StatusCode::UNAUTHORIZED => {
                return Err(ApiError::Unauthorized(status.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        unwrap_envelope(method, status, envelope)
    }
}

fn unwrap_envelope<T>(
    method: &str,
    status: StatusCode,
    envelope: ApiResponse<T>,
) -> Result<T, ApiError> {
    if envelope.ok {
        return envelope
            .result
            .ok_or_else(|| ApiError::InvalidResponse(method.to_string()));
    }

    let code = envelope.error_code.unwrap_or(i64::from(status.as_u16()));
    let description = envelope
        .description
        .unwrap_or_else(|| status.to_string());
    if code == 401 {
        Err(ApiError::Unauthorized(description))
    } else {
        Err(ApiError::Rejected { code, description })
    }
}

#[cfg(test)]
#[path = "api_tests.rs"]
mod tests;
