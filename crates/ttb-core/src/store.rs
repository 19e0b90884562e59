//! JSON-file checkpoint for the authorized-account table.

use std::{collections::HashMap, fs, path::PathBuf};

use crate::{
    domain::{AccountId, LinkedChat},
    errors::Error,
    ports::PairingStore,
    Result,
};

/// Stores the table as one JSON object keyed by the decimal account id.
///
/// A missing or empty file loads as an empty table; everything else that goes
/// wrong surfaces as an error for the caller to log.
#[derive(Clone, Debug)]
pub struct JsonPairingStore {
    path: PathBuf,
}

impl JsonPairingStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl PairingStore for JsonPairingStore {
    fn load(&self) -> Result<HashMap<AccountId, LinkedChat>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let txt = fs::read_to_string(&self.path)?;
        if txt.trim().is_empty() {
            return Ok(HashMap::new());
        }

        let raw: HashMap<String, LinkedChat> = serde_json::from_str(&txt)?;
        raw.into_iter()
            .map(|(key, link)| {
                key.parse::<i64>()
                    .map(|id| (AccountId(id), link))
                    .map_err(|_| {
                        Error::MalformedData(format!("bad account id {key:?} in pairing file"))
                    })
            })
            .collect()
    }

    fn save(&self, table: &HashMap<AccountId, LinkedChat>) -> Result<()> {
        let raw: HashMap<String, &LinkedChat> = table
            .iter()
            .map(|(id, link)| (id.0.to_string(), link))
            .collect();
        fs::write(&self.path, serde_json::to_string(&raw)?)?;
        Ok(())
    }
}
