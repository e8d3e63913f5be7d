// ShutdownCoordinator: registers the unlocker so a process shutdown
// signal (Ctrl-C or SIGTERM) drains the periodic loop before the process
// exits. The unlocker services this signal only between ticks (§5
// Cancellation) — there is no mid-pass cancellation.

use tokio::sync::watch;

/// A `watch` channel carrying a single shutdown flag. `Unlocker::run`
/// takes the `watch::Receiver` half directly; `listen` drives the sender
/// half from OS signals.
pub struct ShutdownCoordinator {
    tx: watch::Sender<bool>,
}

impl ShutdownCoordinator {
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (ShutdownCoordinator { tx }, rx)
    }

    /// Waits for Ctrl-C or SIGTERM, then flips the channel so every
    /// registered `Unlocker::run` loop observes it on its next
    /// between-ticks check and exits.
    pub async fn listen(self) {
        wait_for_signal().await;
        let _ = self.tx.send(true);
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm =
        signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received SIGINT");
        }
        _ = sigterm.recv() => {
            tracing::info!("received SIGTERM");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("received Ctrl-C");
}
