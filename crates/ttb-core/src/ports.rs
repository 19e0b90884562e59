use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;

use crate::{
    domain::{AccountId, AccountInfo, ChatId, ChatUpdate, LinkedChat, Transaction},
    Result,
};

/// How a message body should be interpreted by the chat service.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Markup {
    Plain,
    Html,
}

/// Hexagonal port for the ledger service.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// All accounts with their last-modified timestamps and balances.
    async fn list_accounts(&self) -> Result<Vec<AccountInfo>>;

    /// Transactions of one account, as returned by the service
    /// (newest-last by `created`). The caller filters by timestamp.
    async fn account_transactions(&self, account: AccountId) -> Result<Vec<Transaction>>;

    async fn account_detail(&self, account: AccountId) -> Result<AccountInfo>;
}

/// Hexagonal port for the chat service (Telegram in production).
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Identity check; returns the bot's own username. Used as the
    /// "is the API reachable and the token valid" probe at startup.
    async fn self_identity(&self) -> Result<String>;

    /// Long-poll for updates with ids >= `offset`, waiting at most
    /// `timeout`. An expired wait surfaces as [`crate::Error::Timeout`].
    async fn poll_updates(&self, offset: i64, timeout: Duration) -> Result<Vec<ChatUpdate>>;

    async fn send_message(&self, chat: ChatId, text: &str, markup: Markup) -> Result<()>;
}

/// Checkpoint storage for the authorized-account table.
///
/// The in-memory table owned by the pairing manager is the source of truth
/// while the process runs; the store is loaded once at startup and written
/// after every mutation.
pub trait PairingStore: Send + Sync {
    fn load(&self) -> Result<HashMap<AccountId, LinkedChat>>;

    fn save(&self, table: &HashMap<AccountId, LinkedChat>) -> Result<()>;
}
