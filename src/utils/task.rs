//! Scheduled background tasks
//!
//! Timer-driven behaviour (chunk flushing, strobe) runs in tokio tasks that
//! are owned by the component that started them. Dropping the handle aborts
//! the task, so a task never outlives its owner.

use std::future::Future;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

pub struct ScheduledTask {
    name: &'static str,
    handle: Option<JoinHandle<()>>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl ScheduledTask {
    /// Spawn a task that receives a shutdown signal it should honour
    pub fn spawn<F, Fut>(name: &'static str, task: F) -> Self
    where
        F: FnOnce(oneshot::Receiver<()>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(task(shutdown_rx));
        tracing::debug!("Started task '{}'", name);

        Self {
            name,
            handle: Some(handle),
            shutdown: Some(shutdown_tx),
        }
    }

    /// Run `tick` every `period`, first after one full period
    pub fn every<F>(name: &'static str, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        Self::spawn(name, move |mut shutdown| async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut shutdown => break,
                    _ = ticker.tick() => tick(),
                }
            }
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether the task is still scheduled
    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Abort immediately
    pub fn cancel(&mut self) {
        self.shutdown.take();
        if let Some(handle) = self.handle.take() {
            handle.abort();
            tracing::debug!("Cancelled task '{}'", self.name);
        }
    }

    /// Signal shutdown and wait for the task to finish its current tick
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    tracing::warn!("Task '{}' ended abnormally: {}", self.name, e);
                }
            }
        }
        tracing::debug!("Stopped task '{}'", self.name);
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Join an OS thread from sync code that may be running on a runtime worker.
///
/// On a multi-threaded runtime the wait is moved off the worker with
/// `block_in_place`, so other tasks keep running while the thread winds
/// down. Elsewhere the caller blocks. The wait is bounded by how long the
/// thread takes to notice it should stop.
pub fn join_thread<T>(handle: std::thread::JoinHandle<T>) -> std::thread::Result<T> {
    use tokio::runtime::{Handle, RuntimeFlavor};

    match Handle::try_current() {
        Ok(runtime) if runtime.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(|| handle.join())
        }
        _ => handle.join(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_every_ticks_after_full_period() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let task = ScheduledTask::every("test-tick", Duration::from_millis(100), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(260)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        task.shutdown().await;
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_aborts() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let task = ScheduledTask::every("test-drop", Duration::from_millis(100), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(task.is_active());
        drop(task);

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_join_thread_leaves_worker_free() {
        let released = Arc::new(AtomicBool::new(false));

        // only finishes once a tokio task has run
        let thread_flag = released.clone();
        let thread = std::thread::spawn(move || {
            while !thread_flag.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(1));
            }
            7
        });

        let setter_flag = released.clone();
        let setter = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            setter_flag.store(true, Ordering::SeqCst);
        });
        let joiner = tokio::spawn(async move { join_thread(thread) });

        let joined = tokio::time::timeout(Duration::from_secs(5), joiner)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(joined.unwrap(), 7);
        setter.await.unwrap();
    }

    #[tokio::test]
    async fn test_join_thread_on_current_thread_runtime() {
        let thread = std::thread::spawn(|| "done");
        assert_eq!(join_thread(thread).unwrap(), "done");
    }

    #[test]
    fn test_join_thread_outside_runtime() {
        let thread = std::thread::spawn(|| 1 + 1);
        assert_eq!(join_thread(thread).unwrap(), 2);
    }
}
