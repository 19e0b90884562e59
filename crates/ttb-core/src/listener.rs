//! Command listener: long-polls the chat service and drives the linking
//! workflow plus the account queries.

use std::{sync::Arc, time::Duration};

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    config::Config,
    domain::{ChatId, ChatUpdate},
    errors::Error,
    notify::Notifier,
    pairing::PairingManager,
    ports::{ChatClient, LedgerClient},
    Result,
};

/// Long-running update loop over the chat service.
///
/// Connects (identity check with retry), then long-polls with a monotonic
/// update cursor. A long-poll timeout means "no updates this cycle" and the
/// loop continues immediately; any other error sleeps the retry interval.
/// Nothing below the per-update boundary can stop the loop.
pub struct CommandListener {
    chat: Arc<dyn ChatClient>,
    ledger: Arc<dyn LedgerClient>,
    pairing: Arc<PairingManager>,
    notifier: Notifier,
    retry_interval: Duration,
    poll_timeout: Duration,
    cancel: CancellationToken,
    update_offset: i64,
}

impl CommandListener {
    pub fn new(
        chat: Arc<dyn ChatClient>,
        ledger: Arc<dyn LedgerClient>,
        pairing: Arc<PairingManager>,
        notifier: Notifier,
        cfg: &Config,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            chat,
            ledger,
            pairing,
            notifier,
            retry_interval: cfg.retry_interval,
            poll_timeout: cfg.poll_timeout,
            cancel,
            update_offset: 0,
        }
    }

    pub async fn run(mut self) {
        if !self.connect().await {
            return;
        }

        info!("command listener is running");
        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            match self
                .chat
                .poll_updates(self.update_offset, self.poll_timeout)
                .await
            {
                Ok(updates) => {
                    for update in updates {
                        self.advance_offset(update.update_id);
                        self.handle_update(&update).await;
                    }
                }
                // The long poll simply ran out without updates.
                Err(Error::Timeout) => {}
                Err(e) => {
                    warn!(error = %e, "update poll failed");
                    self.pause().await;
                }
            }
        }
        info!("command listener stopped");
    }

    /// Repeat the identity check until the chat API answers. Returns false
    /// only when cancelled first.
    async fn connect(&self) -> bool {
        loop {
            if self.cancel.is_cancelled() {
                return false;
            }
            match self.chat.self_identity().await {
                Ok(username) => {
                    info!(username = %username, "connected to chat service");
                    return true;
                }
                Err(e) => {
                    warn!(error = %e, "chat service not reachable yet");
                    self.pause().await;
                }
            }
        }
    }

    async fn pause(&self) {
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = sleep(self.retry_interval) => {}
        }
    }

    /// The cursor only ever moves forward, one past the last seen update.
    fn advance_offset(&mut self, update_id: i64) {
        let next = update_id + 1;
        if next > self.update_offset {
            self.update_offset = next;
        }
    }

    async fn handle_update(&self, update: &ChatUpdate) {
        let (Some(chat_id), Some(text)) = (update.chat_id, update.text.as_deref()) else {
            warn!(update = update.update_id, "update carries no text message, skipping");
            return;
        };

        // Group chats address commands as `/cmd@BotName`.
        let command = text.trim().split('@').next().unwrap_or("").to_string();
        info!(chat = chat_id.0, command = %command, "received command");

        if let Err(e) = self.dispatch(chat_id, &command).await {
            warn!(chat = chat_id.0, error = %e, "command handling failed");
        }
    }

    async fn dispatch(&self, chat_id: ChatId, command: &str) -> Result<()> {
        match command {
            "/start" | "/help" => {
                self.notifier.welcome(chat_id).await;
            }
            "/map" => {
                let token = self.pairing.issue_token(chat_id);
                self.notifier.token_instructions(chat_id, &token).await;
            }
            "/unmap" | "/me" | "/balance" => {
                let Some(account) = self.pairing.account_for_chat(chat_id) else {
                    self.notifier.authorization_error(chat_id).await;
                    return Ok(());
                };

                match command {
                    "/unmap" => {
                        self.notifier.unmap_farewell(chat_id).await;
                        self.pairing.unlink(account);
                    }
                    "/me" => {
                        let info = self.ledger.account_detail(account).await?;
                        self.notifier.account_info(chat_id, &info).await;
                    }
                    _ => {
                        let info = self.ledger.account_detail(account).await?;
                        self.notifier.balance(chat_id, info.balance).await;
                    }
                }
            }
            _ => {
                self.notifier.unknown_command(chat_id).await;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AccountId, AccountInfo, LinkedChat, Transaction};
    use crate::ports::{Markup, PairingStore};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeChat {
        sent: Mutex<Vec<(ChatId, String)>>,
    }

    impl FakeChat {
        fn sent(&self) -> Vec<(ChatId, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatClient for FakeChat {
        async fn self_identity(&self) -> crate::Result<String> {
            Ok("@testbot".to_string())
        }

        async fn poll_updates(
            &self,
            _offset: i64,
            _timeout: Duration,
        ) -> crate::Result<Vec<ChatUpdate>> {
            Ok(Vec::new())
        }

        async fn send_message(
            &self,
            chat: ChatId,
            text: &str,
            _markup: Markup,
        ) -> crate::Result<()> {
            self.sent.lock().unwrap().push((chat, text.to_string()));
            Ok(())
        }
    }

    struct FakeLedger {
        account: AccountInfo,
    }

    #[async_trait]
    impl LedgerClient for FakeLedger {
        async fn list_accounts(&self) -> crate::Result<Vec<AccountInfo>> {
            Ok(vec![self.account.clone()])
        }

        async fn account_transactions(
            &self,
            _account: AccountId,
        ) -> crate::Result<Vec<Transaction>> {
            Ok(Vec::new())
        }

        async fn account_detail(&self, account: AccountId) -> crate::Result<AccountInfo> {
            if account == self.account.id {
                Ok(self.account.clone())
            } else {
                Err(crate::Error::Protocol("no such account".to_string()))
            }
        }
    }

    #[derive(Default)]
    struct NullStore;

    impl PairingStore for NullStore {
        fn load(&self) -> crate::Result<HashMap<AccountId, LinkedChat>> {
            Ok(HashMap::new())
        }

        fn save(&self, _table: &HashMap<AccountId, LinkedChat>) -> crate::Result<()> {
            Ok(())
        }
    }

    fn test_config() -> Config {
        Config {
            ledger_api_url: "http://ledger.test".to_string(),
            telegram_bot_token: "x".to_string(),
            poll_interval: Duration::from_secs(1),
            retry_interval: Duration::from_secs(1),
            poll_timeout: Duration::from_secs(1),
            token_length: 8,
            pairing_file: "/tmp/ttb-listener-test.json".into(),
        }
    }

    struct Harness {
        chat: Arc<FakeChat>,
        pairing: Arc<PairingManager>,
        listener: CommandListener,
    }

    fn harness() -> Harness {
        let chat = Arc::new(FakeChat::default());
        let pairing = Arc::new(PairingManager::new(Arc::new(NullStore), 8));
        let ledger = Arc::new(FakeLedger {
            account: AccountInfo {
                id: AccountId(7),
                name: "alice".to_string(),
                email: None,
                balance: 1234,
                is_active: true,
                is_disabled: false,
                created: "2024-01-01 00:00:00".to_string(),
                updated: Some("2024-05-01 10:00:00".to_string()),
            },
        });
        let listener = CommandListener::new(
            chat.clone(),
            ledger,
            pairing.clone(),
            Notifier::new(chat.clone()),
            &test_config(),
            CancellationToken::new(),
        );
        Harness {
            chat,
            pairing,
            listener,
        }
    }

    fn text_update(id: i64, chat: i64, text: &str) -> ChatUpdate {
        ChatUpdate {
            update_id: id,
            chat_id: Some(ChatId(chat)),
            text: Some(text.to_string()),
        }
    }

    fn link(pairing: &PairingManager, account: i64, chat: i64) {
        let token = pairing.issue_token(ChatId(chat));
        assert!(pairing.try_redeem(&token, AccountId(account)).is_some());
    }

    #[tokio::test]
    async fn map_issues_a_token_and_replies_with_it() {
        let h = harness();
        h.listener
            .handle_update(&text_update(1, 42, "/map"))
            .await;

        let sent = h.chat.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, ChatId(42));
        assert!(sent[0].1.contains("<code>"));

        // The advertised token is actually pending: redeeming it links.
        let token = sent[0]
            .1
            .split("<code>")
            .nth(1)
            .and_then(|s| s.split("</code>").next())
            .unwrap()
            .to_string();
        assert_eq!(h.pairing.try_redeem(&token, AccountId(7)), Some(ChatId(42)));
    }

    #[tokio::test]
    async fn linked_only_commands_require_linkage() {
        let h = harness();
        for cmd in ["/unmap", "/me", "/balance"] {
            h.listener.handle_update(&text_update(1, 42, cmd)).await;
        }

        let sent = h.chat.sent();
        assert_eq!(sent.len(), 3);
        assert!(sent.iter().all(|(_, text)| text.contains("not allowed")));
    }

    #[tokio::test]
    async fn balance_reports_the_ledger_balance() {
        let h = harness();
        link(&h.pairing, 7, 42);

        h.listener
            .handle_update(&text_update(1, 42, "/balance"))
            .await;

        let sent = h.chat.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("12.34€"));
    }

    #[tokio::test]
    async fn me_renders_the_account_card() {
        let h = harness();
        link(&h.pairing, 7, 42);

        h.listener.handle_update(&text_update(1, 42, "/me")).await;

        let sent = h.chat.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("alice"));
        assert!(sent[0].1.contains("eMail: <b>---</b>"));
        assert!(sent[0].1.contains("12.34€"));
    }

    #[tokio::test]
    async fn unmap_says_goodbye_then_unlinks() {
        let h = harness();
        link(&h.pairing, 7, 42);

        h.listener
            .handle_update(&text_update(1, 42, "/unmap"))
            .await;

        assert_eq!(h.pairing.account_for_chat(ChatId(42)), None);
        let sent = h.chat.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("won't get any more notifications"));
    }

    #[tokio::test]
    async fn group_suffix_and_unknown_commands() {
        let h = harness();
        h.listener
            .handle_update(&text_update(1, 42, "/help@TallyBridgeBot"))
            .await;
        h.listener
            .handle_update(&text_update(2, 42, "/frobnicate"))
            .await;

        let sent = h.chat.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].1.contains("Welcome"));
        assert!(sent[1].1.contains("Unknown command"));
    }

    #[tokio::test]
    async fn updates_without_text_are_skipped() {
        let h = harness();
        h.listener
            .handle_update(&ChatUpdate {
                update_id: 5,
                chat_id: Some(ChatId(42)),
                text: None,
            })
            .await;
        assert!(h.chat.sent().is_empty());
    }

    #[test]
    fn offset_only_moves_forward() {
        let mut h = harness();
        h.listener.advance_offset(10);
        assert_eq!(h.listener.update_offset, 11);
        h.listener.advance_offset(7);
        assert_eq!(h.listener.update_offset, 11);
        h.listener.advance_offset(11);
        assert_eq!(h.listener.update_offset, 12);
    }
}
