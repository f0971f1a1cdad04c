//! Reusable bounded worker pool (component B). Three instances of this are
//! wired together by [`super::pipeline`] into the validation/fast/background
//! stages; the scheduler also uses pools indirectly through the pipeline.

use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use meta_core_domain::CoreError;
use tokio::sync::{mpsc, oneshot, Mutex, Notify};
use tokio::task::JoinHandle;

use crate::infrastructure::CoreMetrics;

type BoxedJob = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Handle to a submitted thunk's eventual result. Dropping it without
/// awaiting is harmless -- the thunk still runs to completion.
pub struct WorkHandle<T> {
    rx: oneshot::Receiver<Result<T, CoreError>>,
}

impl<T> WorkHandle<T> {
    pub async fn wait(self) -> Result<T, CoreError> {
        self.rx
            .await
            .map_err(|_| CoreError::internal("work queue thunk dropped before completing"))?
    }
}

struct Shared {
    pending: AtomicUsize,
    running: AtomicUsize,
    paused: AtomicBool,
    resume: Notify,
    metrics: Arc<CoreMetrics>,
    concurrency: usize,
}

impl Shared {
    fn publish_gauges(&self, name: &str) {
        self.metrics.record_pool(
            name,
            self.concurrency,
            self.running.load(Ordering::Acquire),
            self.pending.load(Ordering::Acquire),
        );
    }
}

/// A worker pool parameterised by concurrency `N` over an unbounded FIFO of
/// thunks. A panicking or erroring thunk is caught at the job boundary; the
/// pool keeps running. Pause stops a worker from picking up its next job;
/// it does not cancel work already in flight.
pub struct WorkQueue {
    name: &'static str,
    sender: mpsc::UnboundedSender<BoxedJob>,
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkQueue {
    pub fn new(name: &'static str, concurrency: usize, metrics: Arc<CoreMetrics>) -> Self {
        assert!(concurrency > 0, "work queue concurrency must be > 0");
        let (sender, receiver) = mpsc::unbounded_channel::<BoxedJob>();
        let shared = Arc::new(Shared {
            pending: AtomicUsize::new(0),
            running: AtomicUsize::new(0),
            paused: AtomicBool::new(false),
            resume: Notify::new(),
            metrics,
            concurrency,
        });
        shared.publish_gauges(name);
        let receiver = Arc::new(Mutex::new(receiver));

        let mut workers = Vec::with_capacity(concurrency);
        for worker_id in 0..concurrency {
            let receiver = receiver.clone();
            let shared = shared.clone();
            workers.push(tokio::spawn(async move {
                loop {
                    // Register interest in a resume notification before
                    // checking `paused`, so a concurrent `resume()` can't
                    // be missed between the check and the await below.
                    let notified = shared.resume.notified();
                    if shared.paused.load(Ordering::Acquire) {
                        notified.await;
                        continue;
                    }

                    let job = {
                        let mut guard = receiver.lock().await;
                        guard.recv().await
                    };
                    let Some(job) = job else {
                        break;
                    };

                    // A worker already parked in `recv()` above when
                    // `pause()` flips the flag doesn't see it until here;
                    // re-check before letting the job start so a pause
                    // always stops new work, not just work that hadn't
                    // been pulled off the channel yet. The job stays
                    // counted as pending (not running) while parked here.
                    loop {
                        let notified = shared.resume.notified();
                        if !shared.paused.load(Ordering::Acquire) {
                            break;
                        }
                        notified.await;
                    }

                    shared.pending.fetch_sub(1, Ordering::AcqRel);
                    shared.running.fetch_add(1, Ordering::AcqRel);
                    shared.publish_gauges(name);
                    tracing::trace!(pool = name, worker = worker_id, "job starting");
                    job.await;
                    shared.running.fetch_sub(1, Ordering::AcqRel);
                    shared.publish_gauges(name);
                }
            }));
        }

        Self {
            name,
            sender,
            shared,
            workers,
        }
    }

    /// Enqueues a thunk. The returned handle resolves once the thunk (or
    /// the panic it raised) completes.
    pub fn submit<F, T>(&self, fut: F) -> WorkHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.shared.pending.fetch_add(1, Ordering::AcqRel);
        self.shared.publish_gauges(self.name);
        let job: BoxedJob = Box::pin(async move {
            let result = std::panic::AssertUnwindSafe(fut).catch_unwind().await;
            let mapped = result.map_err(|panic| CoreError::internal(describe_panic(panic)));
            let _ = tx.send(mapped);
        });
        // If every worker has been dropped the job is simply discarded; the
        // caller's handle then resolves to an error on drop of `tx`.
        let _ = self.sender.send(job);
        WorkHandle { rx }
    }

    pub fn running(&self) -> usize {
        self.shared.running.load(Ordering::Acquire)
    }

    pub fn pending(&self) -> usize {
        self.shared.pending.load(Ordering::Acquire)
    }

    pub fn size(&self) -> usize {
        self.running() + self.pending()
    }

    pub fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::Acquire)
    }

    pub fn pause(&self) {
        self.shared.paused.store(true, Ordering::Release);
    }

    pub fn resume(&self) {
        self.shared.paused.store(false, Ordering::Release);
        self.shared.resume.notify_waiters();
    }

    /// Polls `running + pending` until it reaches zero or `timeout`
    /// elapses. Never blocks indefinitely.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.size() == 0 {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl super::gate::DrainObservable for WorkQueue {
    fn running(&self) -> usize {
        WorkQueue::running(self)
    }

    fn pending(&self) -> usize {
        WorkQueue::pending(self)
    }

    fn label(&self) -> &str {
        self.name
    }
}

impl Drop for WorkQueue {
    fn drop(&mut self) {
        for worker in &self.workers {
            worker.abort();
        }
    }
}

fn describe_panic(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "thunk panicked".to_string()
    }
}
