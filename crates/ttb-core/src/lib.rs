//! Core domain + application logic for the tally↔Telegram bridge.
//!
//! This crate is intentionally framework-agnostic. The ledger HTTP API and the
//! Telegram Bot API live behind ports (traits) implemented in adapter crates.

pub mod classify;
pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod listener;
pub mod logging;
pub mod notify;
pub mod pairing;
pub mod ports;
pub mod snapshot;
pub mod store;
pub mod watcher;

pub use errors::{Error, Result};
