use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use ttb_core::{
    config::Config,
    listener::CommandListener,
    notify::Notifier,
    pairing::PairingManager,
    ports::{ChatClient, LedgerClient},
    store::JsonPairingStore,
    watcher::LedgerWatcher,
};
use ttb_ledger::TallyClient;
use ttb_telegram::TelegramChat;

#[tokio::main]
async fn main() -> Result<(), ttb_core::Error> {
    ttb_core::logging::init("ttb")?;

    let cfg = Arc::new(Config::load()?);

    let store = Arc::new(JsonPairingStore::new(cfg.pairing_file.clone()));
    let pairing = Arc::new(PairingManager::new(store, cfg.token_length));

    let ledger: Arc<dyn LedgerClient> = Arc::new(TallyClient::new(cfg.ledger_api_url.clone()));
    let chat: Arc<dyn ChatClient> = Arc::new(TelegramChat::new(cfg.telegram_bot_token.clone()));
    let notifier = Notifier::new(chat.clone());

    let cancel = CancellationToken::new();

    let watcher = LedgerWatcher::new(
        ledger.clone(),
        pairing.clone(),
        notifier.clone(),
        &cfg,
        cancel.clone(),
    );
    let listener = CommandListener::new(chat, ledger, pairing, notifier, &cfg, cancel.clone());

    info!(ledger = %cfg.ledger_api_url, "tally-telegram-bridge starting");
    let watcher_task = tokio::spawn(watcher.run());
    let listener_task = tokio::spawn(listener.run());

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
    }
    info!("shutting down");
    cancel.cancel();

    let _ = watcher_task.await;
    let _ = listener_task.await;

    Ok(())
}
