//! Fire-and-forget tasks spawned after a response has been handed back.
//!
//! There is no ordering guarantee between a spawned task and the response
//! that triggered it. Callers that need to observe the effect (tests, the
//! host on shutdown) await [`BackgroundTasks::settle`].

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinSet;

/// Set of in-flight background tasks for one worker generation.
///
/// Dropping the last clone aborts whatever is still running.
#[derive(Clone, Default)]
pub struct BackgroundTasks {
    tasks: Arc<Mutex<JoinSet<()>>>,
}

impl BackgroundTasks {
    /// Spawn `task` on the current runtime.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        while tasks.try_join_next().is_some() {}
        tasks.spawn(task);
    }

    /// Number of tasks not yet reaped.
    pub fn pending(&self) -> usize {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Wait for every spawned task, including ones spawned while waiting.
    pub async fn settle(&self) {
        loop {
            let mut batch = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
            if batch.is_empty() {
                return;
            }
            while let Some(result) = batch.join_next().await {
                if let Err(e) = result
                    && e.is_panic()
                {
                    tracing::warn!(error = %e, "background task panicked");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_settle_waits_for_all() {
        let tasks = BackgroundTasks::default();
        let done = Arc::new(AtomicUsize::new(0));

        for delay in [30, 10, 20] {
            let done = done.clone();
            tasks.spawn(async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                done.fetch_add(1, Ordering::SeqCst);
            });
        }

        tasks.settle().await;
        assert_eq!(done.load(Ordering::SeqCst), 3);
        assert_eq!(tasks.pending(), 0);
    }

    #[tokio::test]
    async fn test_settle_picks_up_nested_spawns() {
        let tasks = BackgroundTasks::default();
        let done = Arc::new(AtomicUsize::new(0));

        let inner_tasks = tasks.clone();
        let inner_done = done.clone();
        tasks.spawn(async move {
            inner_tasks.spawn(async move {
                inner_done.fetch_add(1, Ordering::SeqCst);
            });
        });

        tasks.settle().await;
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_settle_survives_panicking_task() {
        let tasks = BackgroundTasks::default();
        tasks.spawn(async { panic!("boom") });
        tasks.settle().await;
        assert_eq!(tasks.pending(), 0);
    }

    #[tokio::test]
    async fn test_settle_empty() {
        BackgroundTasks::default().settle().await;
    }
}
