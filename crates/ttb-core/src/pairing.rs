//! Account-pairing state machine.
//!
//! Per chat identity: `Unlinked → TokenIssued → Linked`, back to `Unlinked`
//! via explicit unlink. The manager is the sole owner of the pending-token
//! and authorized-account tables; the loops only see the operations below.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    time::{Duration, Instant},
};

use chrono::Local;
use rand::{distributions::Alphanumeric, Rng};
use tracing::{info, warn};

use crate::{
    domain::{AccountId, ChatId, LinkedChat, LEDGER_TIME_FORMAT},
    ports::PairingStore,
};

/// How long an issued activation token stays redeemable.
const ACTIVATION_TTL: Duration = Duration::from_secs(120);

#[derive(Clone, Debug)]
struct PendingActivation {
    chat_id: ChatId,
    issued_at: Instant,
}

#[derive(Default)]
struct Tables {
    pending: HashMap<String, PendingActivation>,
    authorized: HashMap<AccountId, LinkedChat>,
}

/// Owns both pairing tables behind a single mutex.
///
/// One lock guards both tables because redemption is a check-then-act across
/// them: two near-simultaneous transactions carrying the same valid token
/// must produce exactly one link. The store checkpoint is written inside the
/// same critical section, so only a crash between mutation and write can make
/// memory and disk diverge.
pub struct PairingManager {
    store: Arc<dyn PairingStore>,
    token_length: usize,
    tables: Mutex<Tables>,
}

impl PairingManager {
    /// Loads the persisted table; a load failure is logged and the manager
    /// starts with an empty one.
    pub fn new(store: Arc<dyn PairingStore>, token_length: usize) -> Self {
        let authorized = match store.load() {
            Ok(table) => {
                info!(entries = table.len(), "pairing table loaded");
                table
            }
            Err(e) => {
                warn!(error = %e, "could not load pairing table, starting empty");
                HashMap::new()
            }
        };

        Self {
            store,
            token_length,
            tables: Mutex::new(Tables {
                pending: HashMap::new(),
                authorized,
            }),
        }
    }

    /// Issue a fresh activation token for `chat_id`.
    ///
    /// Regenerates until the token is not already pending; token strings are
    /// unique among currently-pending entries, nothing more.
    pub fn issue_token(&self, chat_id: ChatId) -> String {
        let mut tables = self.lock();
        loop {
            let token = random_token(self.token_length);
            if !tables.pending.contains_key(&token) {
                tables.pending.insert(
                    token.clone(),
                    PendingActivation {
                        chat_id,
                        issued_at: Instant::now(),
                    },
                );
                return token;
            }
        }
    }

    /// Redeem `candidate` for `account_id`; returns the chat that gets linked.
    ///
    /// The pending entry is removed before the authorization is written, so a
    /// second redemption of the same token finds nothing. A stale entry
    /// (older than the TTL) is discarded on this attempt and redeems nothing.
    pub fn try_redeem(&self, candidate: &str, account_id: AccountId) -> Option<ChatId> {
        self.try_redeem_at(candidate, account_id, Instant::now())
    }

    fn try_redeem_at(
        &self,
        candidate: &str,
        account_id: AccountId,
        now: Instant,
    ) -> Option<ChatId> {
        let mut tables = self.lock();

        let pending = tables.pending.remove(candidate)?;
        if now.duration_since(pending.issued_at) > ACTIVATION_TTL {
            warn!("activation token expired before redemption");
            return None;
        }

        self.link_locked(&mut tables, account_id, pending.chat_id);
        info!(account = account_id.0, chat = pending.chat_id.0, "account linked");
        Some(pending.chat_id)
    }

    pub fn chat_for_account(&self, account_id: AccountId) -> Option<ChatId> {
        self.lock().authorized.get(&account_id).map(|l| l.chat_id)
    }

    /// Reverse scan; the table is small (one entry per linked chat).
    pub fn account_for_chat(&self, chat_id: ChatId) -> Option<AccountId> {
        self.lock()
            .authorized
            .iter()
            .find(|(_, link)| link.chat_id == chat_id)
            .map(|(id, _)| *id)
    }

    pub fn unlink(&self, account_id: AccountId) {
        let mut tables = self.lock();
        if tables.authorized.remove(&account_id).is_some() {
            info!(account = account_id.0, "account unlinked");
            self.persist(&tables.authorized);
        }
    }

    /// An account maps to at most one chat and vice versa: linking a chat
    /// that is already linked elsewhere drops its old entry first.
    fn link_locked(&self, tables: &mut Tables, account_id: AccountId, chat_id: ChatId) {
        let old = tables
            .authorized
            .iter()
            .find(|(_, link)| link.chat_id == chat_id)
            .map(|(id, _)| *id);
        if let Some(old) = old {
            tables.authorized.remove(&old);
        }

        tables.authorized.insert(
            account_id,
            LinkedChat {
                chat_id,
                linked_at: Local::now().format(LEDGER_TIME_FORMAT).to_string(),
            },
        );
        self.persist(&tables.authorized);
    }

    fn persist(&self, authorized: &HashMap<AccountId, LinkedChat>) {
        if let Err(e) = self.store.save(authorized) {
            warn!(error = %e, "failed to persist pairing table");
        }
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().expect("pairing tables poisoned")
    }

    /// Shift a pending token's issue time into the past to simulate expiry.
    #[cfg(test)]
    pub(crate) fn backdate_for_test(&self, token: &str, secs: u64) {
        let mut tables = self.lock();
        let entry = tables.pending.get_mut(token).expect("token is pending");
        entry.issued_at = Instant::now() - Duration::from_secs(secs);
    }
}

fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct FakeStore {
        saves: StdMutex<Vec<HashMap<AccountId, LinkedChat>>>,
    }

    impl FakeStore {
        fn save_count(&self) -> usize {
            self.saves.lock().unwrap().len()
        }
    }

    impl PairingStore for FakeStore {
        fn load(&self) -> crate::Result<HashMap<AccountId, LinkedChat>> {
            Ok(HashMap::new())
        }

        fn save(&self, table: &HashMap<AccountId, LinkedChat>) -> crate::Result<()> {
            self.saves.lock().unwrap().push(table.clone());
            Ok(())
        }
    }

    fn manager() -> (Arc<FakeStore>, PairingManager) {
        let store = Arc::new(FakeStore::default());
        let mgr = PairingManager::new(store.clone(), 8);
        (store, mgr)
    }

    #[test]
    fn tokens_have_configured_length_and_are_alphanumeric() {
        let (_, mgr) = manager();
        let token = mgr.issue_token(ChatId(1));
        assert_eq!(token.len(), 8);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn concurrently_pending_tokens_differ() {
        let (_, mgr) = manager();
        let a = mgr.issue_token(ChatId(1));
        let b = mgr.issue_token(ChatId(2));
        assert_ne!(a, b);
    }

    #[test]
    fn redemption_links_and_persists() {
        let (store, mgr) = manager();
        let token = mgr.issue_token(ChatId(9));

        assert_eq!(mgr.try_redeem(&token, AccountId(1)), Some(ChatId(9)));
        assert_eq!(mgr.chat_for_account(AccountId(1)), Some(ChatId(9)));
        assert_eq!(mgr.account_for_chat(ChatId(9)), Some(AccountId(1)));
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn second_redemption_of_same_token_fails() {
        let (store, mgr) = manager();
        let token = mgr.issue_token(ChatId(9));

        assert!(mgr.try_redeem(&token, AccountId(1)).is_some());
        assert!(mgr.try_redeem(&token, AccountId(2)).is_none());
        assert_eq!(mgr.chat_for_account(AccountId(1)), Some(ChatId(9)));
        assert_eq!(mgr.chat_for_account(AccountId(2)), None);
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn unknown_token_redeems_nothing() {
        let (store, mgr) = manager();
        assert!(mgr.try_redeem("deadbeef", AccountId(1)).is_none());
        assert_eq!(store.save_count(), 0);
    }

    #[test]
    fn expired_token_is_discarded() {
        let (store, mgr) = manager();
        let token = mgr.issue_token(ChatId(9));
        mgr.backdate_for_test(&token, 121);

        assert!(mgr.try_redeem(&token, AccountId(1)).is_none());
        // The stale entry is gone: trying again is a plain miss.
        assert!(mgr.try_redeem(&token, AccountId(1)).is_none());
        assert_eq!(mgr.chat_for_account(AccountId(1)), None);
        assert_eq!(store.save_count(), 0);
    }

    #[test]
    fn token_just_inside_ttl_still_redeems() {
        let (_, mgr) = manager();
        let token = mgr.issue_token(ChatId(9));
        mgr.backdate_for_test(&token, 110);

        assert_eq!(mgr.try_redeem(&token, AccountId(1)), Some(ChatId(9)));
    }

    #[test]
    fn relinking_an_account_moves_it_to_the_new_chat() {
        let (_, mgr) = manager();

        let t1 = mgr.issue_token(ChatId(100));
        assert!(mgr.try_redeem(&t1, AccountId(7)).is_some());

        let t2 = mgr.issue_token(ChatId(200));
        assert!(mgr.try_redeem(&t2, AccountId(7)).is_some());

        assert_eq!(mgr.account_for_chat(ChatId(100)), None);
        assert_eq!(mgr.account_for_chat(ChatId(200)), Some(AccountId(7)));
        assert_eq!(mgr.chat_for_account(AccountId(7)), Some(ChatId(200)));
    }

    #[test]
    fn relinking_a_chat_drops_its_old_account() {
        let (_, mgr) = manager();

        let t1 = mgr.issue_token(ChatId(100));
        assert!(mgr.try_redeem(&t1, AccountId(7)).is_some());

        let t2 = mgr.issue_token(ChatId(100));
        assert!(mgr.try_redeem(&t2, AccountId(8)).is_some());

        assert_eq!(mgr.chat_for_account(AccountId(7)), None);
        assert_eq!(mgr.chat_for_account(AccountId(8)), Some(ChatId(100)));
    }

    #[test]
    fn unlink_removes_and_persists() {
        let (store, mgr) = manager();
        let token = mgr.issue_token(ChatId(9));
        assert!(mgr.try_redeem(&token, AccountId(1)).is_some());

        mgr.unlink(AccountId(1));
        assert_eq!(mgr.chat_for_account(AccountId(1)), None);
        assert_eq!(store.save_count(), 2);

        // Unlinking an unknown account writes nothing.
        mgr.unlink(AccountId(1));
        assert_eq!(store.save_count(), 2);
    }
}
