//! Background reclamation of expired entries

use std::future::Future;
use std::time::Duration;

use stowage_core::Result;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, warn};

/// Lower bound keeping a misconfigured interval from spinning.
const MIN_INTERVAL: Duration = Duration::from_millis(10);

/// Periodic sweep task owned by a backend
///
/// The task runs until the owner is dropped or [`Sweeper::shutdown`] is
/// called. A failed sweep ends the task; lazy expiry on read keeps the
/// backend correct without it.
#[derive(Debug)]
pub(crate) struct Sweeper {
    handle: Option<JoinHandle<()>>,
}

impl Sweeper {
    /// Spawn `sweep` every `interval` on the current tokio runtime.
    ///
    /// `sweep` reports how many entries it removed.
    pub(crate) fn spawn<F, Fut>(backend: &'static str, interval: Duration, mut sweep: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<usize>> + Send + 'static,
    {
        let Ok(runtime) = Handle::try_current() else {
            warn!(backend, "no tokio runtime, expired entries are only reclaimed on read");
            return Self { handle: None };
        };

        let interval = interval.max(MIN_INTERVAL);
        let handle = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                match sweep().await {
                    Ok(0) => {}
                    Ok(removed) => debug!(backend, removed, "swept expired cache entries"),
                    Err(err) => {
                        error!(backend, error = %err, "cache sweep failed, stopping sweeper");
                        break;
                    }
                }
            }
        });

        Self {
            handle: Some(handle),
        }
    }

    /// Whether the sweep task is still alive
    pub(crate) fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the sweep task
    pub(crate) fn shutdown(&self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use stowage_core::CacheError;

    #[tokio::test]
    async fn test_runs_periodically() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let sweeper = Sweeper::spawn("test", Duration::from_millis(20), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(1)
            }
        });

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(runs.load(Ordering::SeqCst) >= 2);
        assert!(sweeper.is_running());
    }

    #[tokio::test]
    async fn test_stops_after_failure() {
        let sweeper = Sweeper::spawn("test", Duration::from_millis(20), || async {
            Err(CacheError::backend("sweep", "*", "table dropped"))
        });

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!sweeper.is_running());
    }

    #[tokio::test]
    async fn test_shutdown_aborts() {
        let sweeper = Sweeper::spawn("test", Duration::from_millis(20), || async { Ok(0) });
        sweeper.shutdown();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!sweeper.is_running());
    }

    #[test]
    fn test_without_runtime_is_inert() {
        let sweeper = Sweeper::spawn("test", Duration::from_millis(20), || async { Ok(0) });
        assert!(!sweeper.is_running());
    }
}
