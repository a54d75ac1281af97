use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// A single reusable delayed action.
///
/// Each `schedule` cancels whatever is pending and arms the new action, so a
/// burst of calls closer together than `delay` runs only the last one, `delay`
/// after the burst ends.
#[derive(Debug, Default)]
pub struct Debouncer {
    pending: Mutex<Option<CancellationToken>>,
}

impl Debouncer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn schedule<F>(&self, delay: Duration, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        {
            let mut pending = self.pending.lock().await;
            if let Some(prev) = pending.replace(cancel.clone()) {
                prev.cancel();
            }
        }

        tokio::spawn(async move {
            tokio::select! {
              _ = cancel.cancelled() => {}
              _ = tokio::time::sleep(delay) => action.await,
            }
        });
    }

    /// Drop the pending action, if any. Returns whether one was armed.
    pub async fn cancel(&self) -> bool {
        match self.pending.lock().await.take() {
            Some(tok) => {
                let was_pending = !tok.is_cancelled();
                tok.cancel();
                was_pending
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    fn counting(counter: &Arc<AtomicUsize>) -> impl Future<Output = ()> + Send + 'static {
        let counter = Arc::clone(counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn burst_collapses_into_one_run_after_last_call() {
        let d = Debouncer::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let delay = Duration::from_secs(5);

        for _ in 0..10 {
            d.schedule(delay, counting(&runs)).await;
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        // 1s already elapsed since the last call; 3s more is still inside the window.
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn spaced_calls_each_run() {
        let d = Debouncer::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let delay = Duration::from_secs(5);

        d.schedule(delay, counting(&runs)).await;
        tokio::time::sleep(Duration::from_secs(6)).await;
        d.schedule(delay, counting(&runs)).await;
        tokio::time::sleep(Duration::from_secs(6)).await;

        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_pending_action() {
        let d = Debouncer::new();
        let runs = Arc::new(AtomicUsize::new(0));

        d.schedule(Duration::from_secs(5), counting(&runs)).await;
        assert!(d.cancel().await);
        assert!(!d.cancel().await);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}
