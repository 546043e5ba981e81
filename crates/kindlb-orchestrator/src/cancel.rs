//! Cancellation helpers.

use std::future::Future;

use tokio_util::sync::CancellationToken;

/// Run `fut` until it completes or `cancel` fires, whichever is first.
///
/// Returns `None` on cancellation; `fut` is dropped at that point. An
/// already-cancelled token never polls `fut`.
pub async fn cancellable<F: Future>(cancel: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        out = fut => Some(out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn completes_when_not_cancelled() {
        let cancel = CancellationToken::new();
        assert_eq!(cancellable(&cancel, async { 7 }).await, Some(7));
    }

    #[tokio::test]
    async fn pre_cancelled_token_skips_future() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let polled = AtomicBool::new(false);
        let out = cancellable(&cancel, async {
            polled.store(true, Ordering::SeqCst);
        })
        .await;
        assert!(out.is_none());
        assert!(!polled.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn cancels_pending_future() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });
        let out = cancellable(&cancel, std::future::pending::<()>()).await;
        assert!(out.is_none());
    }
}
