//! Bot API client
//!
//! [`ChatClient`] is the outbound contract the bridge core depends on;
//! [`BotApiClient`] implements it with reqwest against the HTTP Bot
//! API. The trait seam keeps the core testable without network access.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use super::types::Update;
use crate::error::AppError;

/// Outbound chat operations consumed by the bridge core.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Send a plain text message to a chat.
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), AppError>;

    /// Send a text message with a single URL button attached.
    async fn send_message_with_url_button(
        &self,
        chat_id: i64,
        text: &str,
        label: &str,
        url: &str,
    ) -> Result<(), AppError>;

    /// Forward a message to another chat.
    ///
    /// # Returns
    /// The message id of the forwarded copy in the destination chat.
    async fn forward_message(
        &self,
        from_chat_id: i64,
        to_chat_id: i64,
        message_id: i64,
    ) -> Result<i64, AppError>;

    /// Resolve a Telegram file id to a directly fetchable URL.
    async fn file_download_url(&self, file_id: &str) -> Result<String, AppError>;
}

/// Bot API envelope; `result` is absent when `ok` is false.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

#[derive(Debug, Deserialize)]
struct ApiFile {
    #[serde(default)]
    file_path: Option<String>,
}

/// reqwest-backed Bot API client.
pub struct BotApiClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
    poll_timeout: Duration,
}

impl BotApiClient {
    pub fn new(
        api_base: &str,
        token: &str,
        poll_timeout: Duration,
    ) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .user_agent("WebBridge/0.1.0")
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Internal(e.into()))?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
            poll_timeout,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &serde_json::Value,
        timeout: Option<Duration>,
    ) -> Result<T, AppError> {
        let mut request = self.http.post(self.method_url(method)).json(params);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response: ApiResponse<T> = request.send().await?.json().await?;
        if !response.ok {
            return Err(AppError::Telegram(format!(
                "{} failed: {}",
                method,
                response
                    .description
                    .unwrap_or_else(|| "no description".to_string())
            )));
        }

        response
            .result
            .ok_or_else(|| AppError::Telegram(format!("{} returned empty result", method)))
    }

    /// Long-poll for the next batch of updates.
    ///
    /// `offset` must be one past the highest update id already handled.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, AppError> {
        let poll_secs = self.poll_timeout.as_secs();
        self.call(
            "getUpdates",
            &serde_json::json!({
                "offset": offset,
                "timeout": poll_secs,
                "allowed_updates": ["message"],
            }),
            // Request deadline must outlive the server-side hold.
            Some(self.poll_timeout + Duration::from_secs(10)),
        )
        .await
    }

    /// Identify the bot account; used as a startup connectivity check.
    pub async fn get_me(&self) -> Result<super::types::TgUser, AppError> {
        self.call("getMe", &serde_json::json!({}), None).await
    }
}

#[async_trait]
impl ChatClient for BotApiClient {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), AppError> {
        let _: SentMessage = self
            .call(
                "sendMessage",
                &serde_json::json!({ "chat_id": chat_id, "text": text }),
                None,
            )
            .await?;
        Ok(())
    }

    async fn send_message_with_url_button(
        &self,
        chat_id: i64,
        text: &str,
        label: &str,
        url: &str,
    ) -> Result<(), AppError> {
        let _: SentMessage = self
            .call(
                "sendMessage",
                &serde_json::json!({
                    "chat_id": chat_id,
                    "text": text,
                    "reply_markup": {
                        "inline_keyboard": [[{ "text": label, "url": url }]]
                    }
                }),
                None,
            )
            .await?;
        Ok(())
    }

    async fn forward_message(
        &self,
        from_chat_id: i64,
        to_chat_id: i64,
        message_id: i64,
    ) -> Result<i64, AppError> {
        let forwarded: SentMessage = self
            .call(
                "forwardMessage",
                &serde_json::json!({
                    "chat_id": to_chat_id,
                    "from_chat_id": from_chat_id,
                    "message_id": message_id,
                }),
                None,
            )
            .await?;
        Ok(forwarded.message_id)
    }

    async fn file_download_url(&self, file_id: &str) -> Result<String, AppError> {
        let file: ApiFile = self
            .call("getFile", &serde_json::json!({ "file_id": file_id }), None)
            .await?;

        let file_path = file
            .file_path
            .ok_or_else(|| AppError::Telegram("getFile returned no file_path".to_string()))?;

        Ok(format!(
            "{}/file/bot{}/{}",
            self.api_base, self.token, file_path
        ))
    }
}
