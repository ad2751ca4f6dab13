//! Where side-effecting hand-off work runs.
//!
//! The host decides which thread may touch the mailbox and the signal bus.
//! The pipeline never hops threads on its own; it hands the work to the
//! injected [`Scheduler`]. Tasks scheduled from one caller run in the order
//! they were scheduled, so the mailbox ends up holding the last alert.

use std::sync::Mutex;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub type Task = Box<dyn FnOnce() + Send + 'static>;

pub trait Scheduler: Send + Sync {
    /// Run `task` on the host-mandated thread. Must not wait for it to finish.
    fn schedule(&self, task: Task);
}

/// Runs the task on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineScheduler;

impl Scheduler for InlineScheduler {
    fn schedule(&self, task: Task) {
        task();
    }
}

/// Queues tasks for one worker that runs them one at a time on the
/// blocking pool (file IO allowed).
#[derive(Debug)]
pub struct TokioScheduler {
    queue: Mutex<Option<mpsc::UnboundedSender<Task>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TokioScheduler {
    pub fn new(handle: &Handle) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            queue: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(handle.spawn(run_queue(rx)))),
        }
    }

    /// Use the runtime the caller is running inside.
    pub fn current() -> Self {
        Self::new(&Handle::current())
    }

    /// Stop accepting tasks and wait until every queued one has run.
    pub async fn drain(&self) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.take();
        }
        let worker = self.worker.lock().ok().and_then(|mut w| w.take());
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                log::error!("Scheduler worker failed: {}", e);
            }
        }
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, task: Task) {
        let sent = self
            .queue
            .lock()
            .ok()
            .and_then(|queue| queue.as_ref().map(|tx| tx.send(task).is_ok()));
        if sent != Some(true) {
            log::warn!("Scheduler is closed, hand-off dropped");
        }
    }
}

async fn run_queue(mut rx: mpsc::UnboundedReceiver<Task>) {
    while let Some(task) = rx.recv().await {
        if let Err(e) = tokio::task::spawn_blocking(task).await {
            log::error!("Scheduled task failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_inline_runs_immediately() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        InlineScheduler.schedule(Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_tokio_scheduler_runs_off_thread() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let scheduler = TokioScheduler::current();
        scheduler.schedule(Box::new(move || {
            let _ = tx.send(std::thread::current().id());
        }));

        let worker = tokio::time::timeout(Duration::from_secs(5), rx)
            .await
            .unwrap()
            .unwrap();
        assert_ne!(worker, std::thread::current().id());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_tokio_scheduler_keeps_order() {
        let scheduler = TokioScheduler::current();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..200 {
            let seen = Arc::clone(&seen);
            scheduler.schedule(Box::new(move || {
                // Uneven task lengths would reorder a plain blocking pool
                if i % 3 == 0 {
                    std::thread::sleep(Duration::from_micros(200));
                }
                seen.lock().unwrap().push(i);
            }));
        }
        tokio::time::timeout(Duration::from_secs(10), scheduler.drain())
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(*seen, (0..200).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_schedule_after_drain_is_dropped() {
        let scheduler = TokioScheduler::current();
        scheduler.drain().await;

        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        scheduler.schedule(Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
