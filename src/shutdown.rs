//! ctrl-c driven shutdown signal shared by the server and the polling loops

use tokio::sync::watch;

/// a receiver that flips to `true` on ctrl-c
///
/// the listener task owns the sender, so the channel stays open for the
/// life of the process.
pub fn on_ctrl_c() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("[SHUTDOWN] Interrupt received, stopping...");
                let _ = tx.send(true);
            }
            Err(e) => tracing::error!("[SHUTDOWN] Failed to listen for ctrl-c: {}", e),
        }
        // keep the channel open so late subscribers still see `true`
        tx.closed().await;
    });
    rx
}

/// resolve once shutdown has been requested (or the sender is gone)
pub async fn wait(rx: &mut watch::Receiver<bool>) {
    loop {
        let requested = *rx.borrow_and_update();
        if requested || rx.changed().await.is_err() {
            return;
        }
    }
}
