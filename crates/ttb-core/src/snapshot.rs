//! Point-in-time capture of all accounts' last-modified timestamps, used to
//! detect change without re-reading every transaction.

use std::collections::HashMap;

use crate::domain::{AccountId, AccountInfo};

/// Mapping from account id to the `updated` timestamp string the ledger
/// reported. Immutable once captured; the watcher replaces its cached
/// snapshot wholesale after a cycle completes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccountSnapshot {
    entries: HashMap<AccountId, String>,
}

impl AccountSnapshot {
    /// Accounts without an `updated` timestamp (never had a transaction) are
    /// left out; they have no baseline to diff against.
    pub fn from_accounts(accounts: &[AccountInfo]) -> Self {
        let entries = accounts
            .iter()
            .filter_map(|a| a.updated.as_ref().map(|ts| (a.id, ts.clone())))
            .collect();
        Self { entries }
    }

    pub fn updated_at(&self, id: AccountId) -> Option<&str> {
        self.entries.get(&id).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (AccountId, &str)> {
        self.entries.iter().map(|(id, ts)| (*id, ts.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(AccountId, String)> for AccountSnapshot {
    fn from_iter<T: IntoIterator<Item = (AccountId, String)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Accounts whose timestamp changed between two snapshots.
///
/// Timestamps are compared as raw strings; any difference counts. With no
/// previous snapshot (cold start) nothing is reported: the first cycle only
/// establishes the baseline. Accounts new in `current` are not reported
/// either, and accounts that vanished are silently dropped. Single pass over
/// `current` with map lookups, so cost stays proportional to the account
/// count.
pub fn changed_accounts(
    previous: Option<&AccountSnapshot>,
    current: &AccountSnapshot,
) -> Vec<AccountId> {
    let Some(previous) = previous else {
        return Vec::new();
    };

    let mut changed = Vec::new();
    for (id, updated) in current.iter() {
        if let Some(prev) = previous.updated_at(id) {
            if prev != updated {
                changed.push(id);
            }
        }
    }
    changed
}
