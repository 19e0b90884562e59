use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::{errors::Error, Result};

/// Ledger account id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub i64);

/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub i64);

/// Timestamp format the ledger service speaks, e.g. `2019-07-20 19:24:41`.
pub const LEDGER_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn parse_ledger_time(raw: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, LEDGER_TIME_FORMAT)
        .map_err(|e| Error::MalformedData(format!("bad ledger timestamp {raw:?}: {e}")))
}

/// Account detail as the ledger reports it.
///
/// `updated` is absent for accounts that never had a transaction; such
/// accounts have no baseline to diff against.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub id: AccountId,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub balance: i64,
    pub is_active: bool,
    pub is_disabled: bool,
    pub created: String,
    #[serde(default)]
    pub updated: Option<String>,
}

/// The other party of a money transfer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Counterparty {
    pub id: AccountId,
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Article {
    pub name: String,
    pub amount: i64,
}

/// The account a transaction was booked on, with its balance after booking.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransactionAccount {
    pub id: AccountId,
    pub name: String,
    pub balance: i64,
}

/// A single ledger transaction. Amounts are in minor units (cents).
///
/// At most one of `sender`, `recipient` and `article` is populated; which one
/// determines the transaction kind (see [`crate::classify`]).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub created: String,
    pub amount: i64,
    #[serde(default)]
    pub sender: Option<Counterparty>,
    #[serde(default)]
    pub recipient: Option<Counterparty>,
    #[serde(default)]
    pub article: Option<Article>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(rename = "user")]
    pub account: TransactionAccount,
}

/// Semantic kind of a transaction, derived from its populated fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionKind {
    Recharge,
    PurchaseArticle,
    SendMoney,
    ReceiveMoney,
    /// Field combination outside the four documented shapes. Logged, never
    /// notified.
    Unclassified,
}

/// An authorized account↔chat link, persisted via the pairing store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedChat {
    pub chat_id: ChatId,
    pub linked_at: String,
}

/// One update from the chat service. Every update carries an id and must
/// advance the listener cursor, even when it has no usable message.
#[derive(Clone, Debug)]
pub struct ChatUpdate {
    pub update_id: i64,
    pub chat_id: Option<ChatId>,
    pub text: Option<String>,
}
