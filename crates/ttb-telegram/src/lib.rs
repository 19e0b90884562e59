//! Telegram adapter (teloxide).
//!
//! Implements the `ttb-core` ChatClient over the Telegram Bot API.

use std::time::Duration;

use async_trait::async_trait;
use teloxide::{
    prelude::*,
    types::{ParseMode, UpdateKind},
    RequestError,
};

use ttb_core::{
    domain::{ChatId, ChatUpdate},
    errors::Error,
    ports::{ChatClient, Markup},
    Result,
};

#[derive(Clone)]
pub struct TelegramChat {
    bot: Bot,
}

impl TelegramChat {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            bot: Bot::new(token),
        }
    }

    fn map_err(e: RequestError) -> Error {
        match e {
            RequestError::Network(e) if e.is_timeout() => Error::Timeout,
            RequestError::Network(e) => Error::Transport(format!("telegram network error: {e}")),
            RequestError::Io(e) => Error::Transport(format!("telegram i/o error: {e}")),
            RequestError::RetryAfter(d) => {
                Error::Transport(format!("telegram rate limit, retry after {}s", d.as_secs()))
            }
            RequestError::InvalidJson { source, .. } => {
                Error::Protocol(format!("telegram sent undecodable json: {source}"))
            }
            other => Error::Protocol(format!("telegram error: {other}")),
        }
    }

    fn to_update(u: teloxide::types::Update) -> ChatUpdate {
        let chat_id = u.chat().map(|c| ChatId(c.id.0));
        let text = match &u.kind {
            UpdateKind::Message(m) => m.text().map(str::to_string),
            _ => None,
        };
        ChatUpdate {
            update_id: u.id as i64,
            chat_id,
            text,
        }
    }
}

#[async_trait]
impl ChatClient for TelegramChat {
    async fn self_identity(&self) -> Result<String> {
        let me = self.bot.get_me().await.map_err(Self::map_err)?;
        Ok(format!("@{}", me.username()))
    }

    async fn poll_updates(&self, offset: i64, timeout: Duration) -> Result<Vec<ChatUpdate>> {
        let updates = self
            .bot
            .get_updates()
            .offset(offset as i32)
            .timeout(timeout.as_secs() as u32)
            .await
            .map_err(Self::map_err)?;

        Ok(updates.into_iter().map(Self::to_update).collect())
    }

    async fn send_message(&self, chat: ChatId, text: &str, markup: Markup) -> Result<()> {
        let mut req = self
            .bot
            .send_message(teloxide::types::ChatId(chat.0), text.to_string())
            .disable_web_page_preview(true);
        if markup == Markup::Html {
            req = req.parse_mode(ParseMode::Html);
        }

        req.await.map_err(Self::map_err)?;
        Ok(())
    }
}
