//! Signal handling and cancellation.
//!
//! Each service owns a single [`CancellationToken`] that is cancelled on
//! SIGINT or SIGTERM. Long-running tasks either hold the token itself or a
//! child of it, and every `sleep`/`tick`/`recv` sits inside a
//! `tokio::select!` against `cancelled()`.

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Create a token that is cancelled when the process receives an interrupt
/// or termination signal.
pub fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();

    let trigger = token.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("shutdown signal received");
        trigger.cancel();
    });

    token
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(e) => {
            error!("unable to install SIGTERM handler: {e}");
            // ctrl-c alone still allows a clean exit
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("unable to listen for ctrl-c: {e}");
            }
        }
        _ = term.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("unable to listen for ctrl-c: {e}");
    }
}
