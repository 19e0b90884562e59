//! Message formatting and dispatch.
//!
//! Every outbound message of the bridge is rendered here and handed to the
//! chat capability. Sends are fire-and-forget: a failed send is logged and
//! never retried or escalated.

use std::sync::Arc;

use tracing::warn;

use crate::{
    domain::{AccountInfo, ChatId, Transaction, TransactionKind},
    formatting::{escape_html, format_eur, text_or_dash, yes_no},
    ports::{ChatClient, Markup},
};

#[derive(Clone)]
pub struct Notifier {
    chat: Arc<dyn ChatClient>,
}

impl Notifier {
    pub fn new(chat: Arc<dyn ChatClient>) -> Self {
        Self { chat }
    }

    pub async fn send_html(&self, chat_id: ChatId, text: &str) {
        if let Err(e) = self.chat.send_message(chat_id, text, Markup::Html).await {
            warn!(chat = chat_id.0, error = %e, "failed to send message");
        }
    }

    pub async fn send_plain(&self, chat_id: ChatId, text: &str) {
        if let Err(e) = self.chat.send_message(chat_id, text, Markup::Plain).await {
            warn!(chat = chat_id.0, error = %e, "failed to send message");
        }
    }

    /// One notification per observed transaction. `Unclassified` renders
    /// nothing; the watcher already logged it.
    pub async fn transaction(&self, chat_id: ChatId, kind: TransactionKind, t: &Transaction) {
        let Some(text) = render_transaction(kind, t) else {
            return;
        };
        self.send_html(chat_id, &text).await;
    }

    /// Confirmation sent to the chat that just got linked via a token.
    pub async fn linked(&self, chat_id: ChatId, account_name: &str) {
        let text = format!(
            "Hello {}, you are now getting transaction notifications for your tally account here.",
            escape_html(account_name)
        );
        self.send_html(chat_id, &text).await;
    }

    pub async fn welcome(&self, chat_id: ChatId) {
        self.send_html(
            chat_id,
            "Welcome to the <b>Tally Telegram Bridge</b>!\nEnter / in the chat or click on the [/] to see all available commands.",
        )
        .await;
    }

    /// `/map` reply: where to put the freshly issued token.
    pub async fn token_instructions(&self, chat_id: ChatId, token: &str) {
        let text = format!(
            "Send money to another user within the next <b>two</b> minutes (can be undone immediately) with the following token in the note:\n\n<code>{}</code>",
            escape_html(token)
        );
        self.send_html(chat_id, &text).await;
    }

    pub async fn authorization_error(&self, chat_id: ChatId) {
        self.send_plain(
            chat_id,
            "You are not allowed to do this!\nYou must first /map your Telegram to your tally account!",
        )
        .await;
    }

    pub async fn unknown_command(&self, chat_id: ChatId) {
        self.send_plain(
            chat_id,
            "Unknown command. Enter / in the chat or click on the [/] to see all available commands.",
        )
        .await;
    }

    pub async fn unmap_farewell(&self, chat_id: ChatId) {
        self.send_html(chat_id, "You won't get any more notifications from now on.")
            .await;
    }

    /// `/me` reply: the full account card.
    pub async fn account_info(&self, chat_id: ChatId, info: &AccountInfo) {
        let text = format!(
            "User-ID: <b>{}</b>\n\
             Username: <b>{}</b>\n\
             eMail: <b>{}</b>\n\
             Balance: <b>{}</b>\n\
             Active: <b>{}</b>\n\
             Disabled: <b>{}</b>\n\
             User created: <b>{}</b>\n\
             Last activity: <b>{}</b>",
            info.id.0,
            escape_html(&info.name),
            text_or_dash(info.email.as_deref()),
            format_eur(info.balance),
            yes_no(info.is_active),
            yes_no(info.is_disabled),
            escape_html(&info.created),
            text_or_dash(info.updated.as_deref()),
        );
        self.send_html(chat_id, &text).await;
    }

    pub async fn balance(&self, chat_id: ChatId, balance: i64) {
        let text = format!("Your current balance is <b>{}</b>", format_eur(balance));
        self.send_html(chat_id, &text).await;
    }
}

fn render_transaction(kind: TransactionKind, t: &Transaction) -> Option<String> {
    match kind {
        TransactionKind::Recharge => Some(format!(
            "<b>💵 You recharged your account!</b>\n\n\
             Amount: <b>{}</b>\n\
             New balance: <b>{}</b>",
            format_eur(t.amount),
            format_eur(t.account.balance),
        )),
        TransactionKind::PurchaseArticle => {
            let article = t.article.as_ref()?;
            Some(format!(
                "<b>💵 You have purchased an item!</b>\n\n\
                 Amount: <b>{}</b>\n\
                 Item: <b>{}</b>\n\
                 New balance: <b>{}</b>",
                format_eur(article.amount),
                escape_html(&article.name),
                format_eur(t.account.balance),
            ))
        }
        TransactionKind::SendMoney => {
            let recipient = t.recipient.as_ref()?;
            Some(format!(
                "<b>💵 You sent money!</b>\n\n\
                 Recipient: <b>{}</b>\n\
                 Amount: <b>{}</b>\n\
                 Note: <b>{}</b>\n\
                 New balance: <b>{}</b>",
                escape_html(&recipient.name),
                format_eur(t.amount),
                text_or_dash(t.comment.as_deref()),
                format_eur(t.account.balance),
            ))
        }
        TransactionKind::ReceiveMoney => {
            let sender = t.sender.as_ref()?;
            Some(format!(
                "<b>💵 You received money!</b>\n\n\
                 Sender: <b>{}</b>\n\
                 Amount: <b>{}</b>\n\
                 Note: <b>{}</b>\n\
                 New balance: <b>{}</b>",
                escape_html(&sender.name),
                format_eur(t.amount),
                text_or_dash(t.comment.as_deref()),
                format_eur(t.account.balance),
            ))
        }
        TransactionKind::Unclassified => None,
    }
}
