//! Ledger poller: detects account changes and turns them into notifications
//! or pairing redemptions.

use std::{sync::Arc, time::Duration};

use regex::Regex;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    classify::classify,
    config::Config,
    domain::{parse_ledger_time, AccountId, Transaction, TransactionKind},
    notify::Notifier,
    pairing::PairingManager,
    ports::LedgerClient,
    snapshot::{changed_accounts, AccountSnapshot},
    Result,
};

/// Long-running poll loop over the ledger.
///
/// Each cycle: fetch snapshot → diff against the cache → fetch per-account
/// transaction deltas → classify → notify linked accounts or attempt token
/// redemption → replace the cache → sleep. The first successful cycle only
/// establishes the baseline. A failed cycle changes no state; everything
/// below the cycle boundary is logged and survived.
pub struct LedgerWatcher {
    ledger: Arc<dyn LedgerClient>,
    pairing: Arc<PairingManager>,
    notifier: Notifier,
    poll_interval: Duration,
    retry_interval: Duration,
    token_pattern: Regex,
    cancel: CancellationToken,
    cached: Option<AccountSnapshot>,
}

impl LedgerWatcher {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        pairing: Arc<PairingManager>,
        notifier: Notifier,
        cfg: &Config,
        cancel: CancellationToken,
    ) -> Self {
        let token_pattern = Regex::new(&format!("^[A-Za-z0-9]{{{}}}$", cfg.token_length))
            .expect("valid token pattern");

        Self {
            ledger,
            pairing,
            notifier,
            poll_interval: cfg.poll_interval,
            retry_interval: cfg.retry_interval,
            token_pattern,
            cancel,
            cached: None,
        }
    }

    pub async fn run(mut self) {
        info!("ledger watcher is running");
        loop {
            let interval = match self.cycle().await {
                Ok(()) => self.poll_interval,
                Err(e) => {
                    warn!(error = %e, "poll cycle failed");
                    // Still bootstrapping: retry cadence until the first
                    // snapshot lands. Afterwards the fixed poll interval
                    // applies regardless of cycle outcome.
                    if self.cached.is_none() {
                        self.retry_interval
                    } else {
                        self.poll_interval
                    }
                }
            };

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = sleep(interval) => {}
            }
        }
        info!("ledger watcher stopped");
    }

    async fn cycle(&mut self) -> Result<()> {
        let accounts = self.ledger.list_accounts().await?;
        let current = AccountSnapshot::from_accounts(&accounts);

        if self.cached.is_none() {
            info!(accounts = current.len(), "first run, caching account snapshot");
        }

        for id in changed_accounts(self.cached.as_ref(), &current) {
            let since = self
                .cached
                .as_ref()
                .and_then(|s| s.updated_at(id))
                .unwrap_or_default()
                .to_string();
            if let Err(e) = self.process_account(id, &since).await {
                warn!(account = id.0, error = %e, "skipping account this cycle");
            }
        }

        // The snapshot replaces the cache even when some account failed:
        // what was missed this cycle is gone (best-effort, no backfill).
        self.cached = Some(current);
        Ok(())
    }

    /// Handle every transaction of one changed account that was created
    /// after the cached timestamp.
    async fn process_account(&self, id: AccountId, since: &str) -> Result<()> {
        debug!(account = id.0, since, "processing transactions");
        let since = parse_ledger_time(since)?;

        let transactions = self.ledger.account_transactions(id).await?;
        for t in &transactions {
            let created = match parse_ledger_time(&t.created) {
                Ok(v) => v,
                Err(e) => {
                    warn!(transaction = t.id, error = %e, "ignoring transaction with unparsable timestamp");
                    continue;
                }
            };
            if created <= since {
                continue;
            }
            self.process_transaction(t).await;
        }
        Ok(())
    }

    async fn process_transaction(&self, t: &Transaction) {
        let kind = classify(t);
        info!(transaction = t.id, kind = ?kind, account = t.account.id.0, "new transaction");

        match self.pairing.chat_for_account(t.account.id) {
            Some(chat) => {
                if kind == TransactionKind::Unclassified {
                    warn!(transaction = t.id, "transaction matches no known shape, not notifying");
                    return;
                }
                self.notifier.transaction(chat, kind, t).await;
            }
            // An outgoing transfer on an unlinked account may carry an
            // activation token in its note.
            None if kind == TransactionKind::SendMoney => self.try_redeem_from_comment(t).await,
            None => debug!(account = t.account.id.0, "account not linked to any chat"),
        }
    }

    async fn try_redeem_from_comment(&self, t: &Transaction) {
        let comment = t.comment.as_deref().unwrap_or("").trim();
        if !self.token_pattern.is_match(comment) {
            return;
        }

        info!(account = t.account.id.0, "transaction note holds a well-formed activation token");
        match self.pairing.try_redeem(comment, t.account.id) {
            Some(chat) => self.notifier.linked(chat, &t.account.name).await,
            None => info!("no pending activation for this token"),
        }
    }
}
