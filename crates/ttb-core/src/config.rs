use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

/// Typed configuration for the bridge.
///
/// Constructed once at startup and passed into each component; nothing reads
/// the environment after `load()` returns.
#[derive(Clone, Debug)]
pub struct Config {
    /// Base URL of the ledger API, e.g. `https://tally.example/api`.
    pub ledger_api_url: String,
    pub telegram_bot_token: String,

    /// Sleep between ledger poll cycles.
    pub poll_interval: Duration,
    /// Sleep before retrying after a failed bootstrap or chat-API error.
    pub retry_interval: Duration,
    /// Bounded wait of the chat long poll.
    pub poll_timeout: Duration,

    /// Length of generated activation tokens.
    pub token_length: usize,
    /// Checkpoint file for the authorized-account table.
    pub pairing_file: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let ledger_api_url = env_str("LEDGER_API_URL").unwrap_or_default();
        if ledger_api_url.trim().is_empty() {
            return Err(Error::Config(
                "LEDGER_API_URL environment variable is required".to_string(),
            ));
        }

        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let poll_interval = Duration::from_secs(env_u64("POLL_INTERVAL_SECS").unwrap_or(10));
        let retry_interval = Duration::from_secs(env_u64("RETRY_INTERVAL_SECS").unwrap_or(30));
        let poll_timeout = Duration::from_secs(env_u64("POLL_TIMEOUT_SECS").unwrap_or(30));

        let token_length = env_usize("TOKEN_LENGTH").unwrap_or(8);
        if token_length == 0 {
            return Err(Error::Config("TOKEN_LENGTH must be at least 1".to_string()));
        }

        let pairing_file = env_path("PAIRING_FILE")
            .unwrap_or_else(|| PathBuf::from("pairings.json"));

        Ok(Self {
            ledger_api_url,
            telegram_bot_token,
            poll_interval,
            retry_interval,
            poll_timeout,
            token_length,
            pairing_file,
        })
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key).map(PathBuf::from)
}
