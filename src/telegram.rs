//! Telegram Bot API transport
//!
//! Sends session notifications to the configured chat and answers commands
//! received through long polling. Only the handful of Bot API methods the bot
//! needs are modelled.

use crate::config::TelegramConfig;
use crate::error::{Result, TeslagramError};
use crate::logging::get_logger;
use crate::router::{Notification, StatusBoard};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;

/// Reply to `status` before any vehicle has reported
pub const NO_VEHICLE_TEXT: &str = "No vehicle data yet";

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

/// Bot account returned by `getMe`
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to_message_id: Option<i64>,
}

#[derive(Debug, Serialize)]
struct GetUpdates {
    offset: i64,
    timeout: u64,
}

/// Command name of a message, without the leading slash or `@botname`
pub fn command_of(text: &str) -> Option<&str> {
    let word = text.split_whitespace().next()?.strip_prefix('/')?;
    let name = word.split('@').next().unwrap_or(word);
    (!name.is_empty()).then_some(name)
}

/// Text answering an incoming message
pub fn reply_for(message: &Message, status: &StatusBoard) -> String {
    match message.text.as_deref().and_then(command_of) {
        Some("status") => status
            .status_text()
            .unwrap_or_else(|| NO_VEHICLE_TEXT.to_string()),
        _ => format!("Hello. Set TELEGRAM_CHAT_ID={}", message.chat.id),
    }
}

/// Minimal Telegram Bot API client
pub struct TelegramBot {
    http: reqwest::Client,
    base: String,
    chat_id: i64,
    poll_timeout_secs: u64,
    logger: crate::logging::StructuredLogger,
}

impl TelegramBot {
    /// Authenticate with `getMe`; failure here is fatal for the process
    pub async fn connect(config: &TelegramConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            // Long polls must outlive the server-side timeout
            .timeout(Duration::from_secs(config.poll_timeout_secs + 15))
            .build()?;
        let bot = Self {
            http,
            base: format!(
                "{}/bot{}",
                config.api_base.trim_end_matches('/'),
                config.token.trim()
            ),
            chat_id: config.chat_id,
            poll_timeout_secs: config.poll_timeout_secs,
            logger: get_logger("telegram"),
        };

        let me: User = bot.call("getMe", &serde_json::json!({})).await?;
        bot.logger.info(&format!(
            "Telegram authorized on account {}",
            me.username.as_deref().unwrap_or("?")
        ));
        Ok(bot)
    }

    async fn call<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<T> {
        let resp: ApiResponse<T> = self
            .http
            .post(format!("{}/{}", self.base, method))
            .json(body)
            .send()
            .await?
            .json()
            .await?;
        match resp {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse { description, .. } => Err(TeslagramError::telegram(format!(
                "{} failed: {}",
                method,
                description.unwrap_or_else(|| "no description".to_string())
            ))),
        }
    }

    /// Send a message; `html` enables HTML parse mode
    pub async fn send(
        &self,
        chat_id: i64,
        text: &str,
        html: bool,
        reply_to: Option<i64>,
    ) -> Result<()> {
        let body = SendMessage {
            chat_id,
            text,
            parse_mode: html.then_some("HTML"),
            reply_to_message_id: reply_to,
        };
        let _: serde_json::Value = self.call("sendMessage", &body).await?;
        Ok(())
    }

    async fn updates(&self, offset: i64) -> Result<Vec<Update>> {
        self.call(
            "getUpdates",
            &GetUpdates {
                offset,
                timeout: self.poll_timeout_secs,
            },
        )
        .await
    }

    async fn handle(&self, message: &Message, status: &StatusBoard) {
        let user = message
            .from
            .as_ref()
            .and_then(|u| u.username.as_deref())
            .unwrap_or("?");
        self.logger.info(&format!(
            "[{}] {}",
            user,
            message.text.as_deref().unwrap_or("")
        ));

        let text = reply_for(message, status);
        let is_status = message.text.as_deref().and_then(command_of) == Some("status");
        let reply_to = (!is_status).then_some(message.message_id);
        if let Err(e) = self.send(message.chat.id, &text, false, reply_to).await {
            self.logger.error(&format!("Failed to reply: {}", e));
        }
    }

    /// Deliver notifications and answer commands until the outbox closes
    pub async fn run(
        self,
        mut outbox: mpsc::UnboundedReceiver<Notification>,
        status: StatusBoard,
    ) -> Result<()> {
        let mut offset = 0;
        loop {
            tokio::select! {
                note = outbox.recv() => {
                    let Some(note) = note else {
                        self.logger.info("Outbox closed, stopping bot");
                        return Ok(());
                    };
                    if let Err(e) = self.send(self.chat_id, &note.text, true, None).await {
                        self.logger.error(&format!(
                            "Failed to send notification for vehicle {}: {}",
                            note.vehicle_id, e
                        ));
                    }
                }
                updates = self.updates(offset) => match updates {
                    Ok(updates) => {
                        for update in updates {
                            offset = offset.max(update.update_id + 1);
                            if let Some(message) = &update.message {
                                self.handle(message, &status).await;
                            }
                        }
                    }
                    Err(e) => {
                        self.logger.warn(&format!("getUpdates failed: {}", e));
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                },
            }
        }
    }
}
