//! Background task coordination.

use std::future::Future;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A spawned background loop with a two-way stop handshake.
///
/// [`BackgroundTask::stop`] cancels the loop and then waits for the task to
/// finish, so the loop has fully exited when it returns.
#[derive(Debug)]
pub struct BackgroundTask {
    name: &'static str,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl BackgroundTask {
    /// Spawn `f` with a fresh stop token.
    pub fn spawn<F, Fut>(name: &'static str, f: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let handle = tokio::spawn(f(token.clone()));
        tracing::debug!(task = name, "Background task started");
        Self { name, token, handle }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// True once the task has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Signal the task to stop without waiting for it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Signal the task to stop and wait for it to acknowledge by exiting.
    pub async fn stop(self) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            tracing::error!(task = self.name, error = %e, "Background task ended abnormally");
        } else {
            tracing::debug!(task = self.name, "Background task stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_stop_waits_for_exit() {
        let exited = Arc::new(AtomicBool::new(false));
        let flag = exited.clone();
        let task = BackgroundTask::spawn("test", move |stop| async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(5));
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = stop.cancelled() => break,
                }
            }
            flag.store(true, Ordering::SeqCst);
        });

        assert!(!task.is_finished());
        task.stop().await;
        assert!(exited.load(Ordering::SeqCst));
    }
}
