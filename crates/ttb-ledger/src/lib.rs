//! Ledger API adapter (reqwest).
//!
//! Implements the `ttb-core` LedgerClient over the Strichliste-style HTTP
//! API: `GET /user`, `GET /user/{id}/transaction`, `GET /user/{id}`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use ttb_core::{
    domain::{AccountId, AccountInfo, Transaction},
    errors::Error,
    ports::LedgerClient,
    Result,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct TallyClient {
    base_url: String,
    http: reqwest::Client,
}

impl TallyClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client build");
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{path}", self.base_url);

        let resp = self.http.get(&url).send().await.map_err(map_request_error)?;

        if !resp.status().is_success() {
            return Err(Error::Protocol(format!(
                "ledger responded with status {} for {path}",
                resp.status()
            )));
        }

        resp.json::<T>()
            .await
            .map_err(|e| Error::Protocol(format!("undecodable ledger response for {path}: {e}")))
    }
}

fn map_request_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        return Error::Timeout;
    }
    Error::Transport(format!("ledger request failed: {e}"))
}

// Response envelopes of the ledger API.

#[derive(Debug, Deserialize)]
struct UsersEnvelope {
    users: Vec<AccountInfo>,
}

#[derive(Debug, Deserialize)]
struct UserEnvelope {
    user: AccountInfo,
}

#[derive(Debug, Deserialize)]
struct TransactionsEnvelope {
    transactions: Vec<Transaction>,
}

#[async_trait]
impl LedgerClient for TallyClient {
    async fn list_accounts(&self) -> Result<Vec<AccountInfo>> {
        Ok(self.get_json::<UsersEnvelope>("/user").await?.users)
    }

    async fn account_transactions(&self, account: AccountId) -> Result<Vec<Transaction>> {
        Ok(self
            .get_json::<TransactionsEnvelope>(&format!("/user/{}/transaction", account.0))
            .await?
            .transactions)
    }

    async fn account_detail(&self, account: AccountId) -> Result<AccountInfo> {
        Ok(self
            .get_json::<UserEnvelope>(&format!("/user/{}", account.0))
            .await?
            .user)
    }
}
