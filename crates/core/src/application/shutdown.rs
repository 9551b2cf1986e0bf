// Shutdown Token
//
// Broadcast stop signal for background loops (health reporting, RPC server).

use tokio::sync::watch;

/// Shutdown signal for graceful termination
#[derive(Clone)]
pub struct ShutdownToken {
    rx: watch::Receiver<bool>,
}

impl ShutdownToken {
    /// Check if shutdown was requested
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait for the shutdown signal; returns immediately if already sent
    pub async fn wait(&mut self) {
        if self.is_shutdown() {
            return;
        }
        let _ = self.rx.changed().await;
    }
}

/// Shutdown sender
pub struct ShutdownSender {
    tx: watch::Sender<bool>,
}

impl ShutdownSender {
    /// Signal shutdown to every token holder
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }
}

/// Create a shutdown channel
pub fn shutdown_channel() -> (ShutdownSender, ShutdownToken) {
    let (tx, rx) = watch::channel(false);
    (ShutdownSender { tx }, ShutdownToken { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_token_observes_shutdown() {
        let (sender, token) = shutdown_channel();
        let mut waiter = token.clone();
        assert!(!token.is_shutdown());

        let handle = tokio::spawn(async move { waiter.wait().await });
        sender.shutdown();
        handle.await.unwrap();

        assert!(token.is_shutdown());
        // Late waiters do not block
        let mut late = token.clone();
        late.wait().await;
    }
}
