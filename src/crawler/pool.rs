//! Worker pool
//!
//! A fixed number of tokio tasks pull jobs from a shared queue, run them one
//! at a time and push exactly one [`JobResult`] per job onto a result channel.
//! The pool never retries and never drops an outcome: an error or a panic
//! inside a job still produces a result.
//!
//! `started` is incremented before a job is queued, so `started - finished` is
//! always an upper bound on the work in flight.

use crate::PipelineError;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::HashSet;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Identifier attached to every submitted job
pub type JobId = Uuid;

type JobFn<T> = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<T>> + Send>;

/// A unit of work: a deferred future plus an optional identifier
pub struct Job<T> {
    id: Option<JobId>,
    run: JobFn<T>,
}

impl<T: Send + 'static> Job<T> {
    /// Wraps a closure producing the job's future; an id is generated on submit
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        Self {
            id: None,
            run: Box::new(move || f().boxed()),
        }
    }

    /// Same as [`Job::new`] with a caller-chosen id
    pub fn with_id<F, Fut>(id: JobId, f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        Self {
            id: Some(id),
            ..Self::new(f)
        }
    }
}

impl<T> Job<T> {
    pub fn id(&self) -> Option<JobId> {
        self.id
    }
}

/// Outcome of one job, delivered exactly once
#[derive(Debug)]
pub struct JobResult<T> {
    pub job_id: JobId,
    pub outcome: anyhow::Result<T>,
}

impl<T> JobResult<T> {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

struct QueuedJob<T> {
    id: JobId,
    run: JobFn<T>,
}

enum QueueSender<T> {
    Bounded(mpsc::Sender<QueuedJob<T>>),
    Unbounded(mpsc::UnboundedSender<QueuedJob<T>>),
}

enum QueueReceiver<T> {
    Bounded(mpsc::Receiver<QueuedJob<T>>),
    Unbounded(mpsc::UnboundedReceiver<QueuedJob<T>>),
}

impl<T> QueueReceiver<T> {
    async fn recv(&mut self) -> Option<QueuedJob<T>> {
        match self {
            Self::Bounded(rx) => rx.recv().await,
            Self::Unbounded(rx) => rx.recv().await,
        }
    }
}

#[derive(Debug, Default)]
struct PoolCounters {
    started: AtomicUsize,
    finished: AtomicUsize,
}

/// Fixed-size concurrent job executor
pub struct WorkerPool<T> {
    size: usize,
    capacity: Option<usize>,
    sender: Option<QueueSender<T>>,
    queue: Arc<tokio::sync::Mutex<QueueReceiver<T>>>,
    results_tx: mpsc::UnboundedSender<JobResult<T>>,
    results_rx: Option<mpsc::UnboundedReceiver<JobResult<T>>>,
    counters: Arc<PoolCounters>,
    outstanding: Arc<Mutex<HashSet<JobId>>>,
    workers: Vec<JoinHandle<()>>,
    started: bool,
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Creates a pool of `size` workers
    ///
    /// # Arguments
    ///
    /// * `size` - Number of worker tasks (at least one is always spawned)
    /// * `queue_capacity` - Bound on queued jobs; `None` means unbounded
    pub fn new(size: usize, queue_capacity: Option<usize>) -> Self {
        let capacity = queue_capacity.filter(|c| *c > 0);
        let (sender, receiver) = match capacity {
            Some(capacity) => {
                let (tx, rx) = mpsc::channel(capacity);
                (QueueSender::Bounded(tx), QueueReceiver::Bounded(rx))
            }
            None => {
                let (tx, rx) = mpsc::unbounded_channel();
                (QueueSender::Unbounded(tx), QueueReceiver::Unbounded(rx))
            }
        };
        let (results_tx, results_rx) = mpsc::unbounded_channel();

        Self {
            size: size.max(1),
            capacity,
            sender: Some(sender),
            queue: Arc::new(tokio::sync::Mutex::new(receiver)),
            results_tx,
            results_rx: Some(results_rx),
            counters: Arc::new(PoolCounters::default()),
            outstanding: Arc::new(Mutex::new(HashSet::new())),
            workers: Vec::new(),
            started: false,
        }
    }

    /// Spawns the worker tasks; must be called from within a tokio runtime
    pub fn start(&mut self) -> Result<(), PipelineError> {
        if self.started {
            return Err(PipelineError::AlreadyStarted);
        }
        self.started = true;

        for index in 0..self.size {
            let queue = Arc::clone(&self.queue);
            let results = self.results_tx.clone();
            let counters = Arc::clone(&self.counters);
            let outstanding = Arc::clone(&self.outstanding);
            self.workers.push(tokio::spawn(worker_loop(
                index,
                queue,
                results,
                counters,
                outstanding,
            )));
        }

        tracing::debug!("Worker pool started with {} workers", self.size);
        Ok(())
    }

    /// Submits a job without blocking and returns its id
    ///
    /// Fails with `QueueFull` when a bounded queue is at capacity and with
    /// `DuplicateContextId` when a job with the same id is still outstanding.
    pub fn execute(&self, job: Job<T>) -> Result<JobId, PipelineError> {
        let sender = self.sender.as_ref().ok_or(PipelineError::NotStarted)?;
        let id = job.id.unwrap_or_else(Uuid::new_v4);

        if !lock(&self.outstanding).insert(id) {
            return Err(PipelineError::DuplicateContextId(id));
        }
        self.counters.started.fetch_add(1, Ordering::SeqCst);

        let queued = QueuedJob { id, run: job.run };
        let sent = match sender {
            QueueSender::Bounded(tx) => tx.try_send(queued).map_err(|e| match e {
                TrySendError::Full(_) => PipelineError::QueueFull {
                    capacity: self.capacity.unwrap_or_default(),
                },
                TrySendError::Closed(_) => PipelineError::NotStarted,
            }),
            QueueSender::Unbounded(tx) => tx.send(queued).map_err(|_| PipelineError::NotStarted),
        };

        if let Err(e) = sent {
            self.counters.started.fetch_sub(1, Ordering::SeqCst);
            lock(&self.outstanding).remove(&id);
            return Err(e);
        }
        Ok(id)
    }

    /// Hands out the result channel; only the first call returns it
    pub fn take_results(&mut self) -> Option<mpsc::UnboundedReceiver<JobResult<T>>> {
        self.results_rx.take()
    }

    /// Closes the queue and waits for workers to drain in-flight jobs
    pub async fn shutdown(&mut self) {
        self.sender = None;
        for handle in self.workers.drain(..) {
            if let Err(e) = handle.await {
                tracing::warn!("Worker task ended abnormally: {}", e);
            }
        }
    }
}

impl<T> WorkerPool<T> {
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn started_count(&self) -> usize {
        self.counters.started.load(Ordering::SeqCst)
    }

    pub fn finished_count(&self) -> usize {
        self.counters.finished.load(Ordering::SeqCst)
    }

    /// Liveness hint: true when every submitted job has reported
    pub fn all_outstanding_done(&self) -> bool {
        self.finished_count() >= self.started_count()
    }
}

async fn worker_loop<T: Send + 'static>(
    index: usize,
    queue: Arc<tokio::sync::Mutex<QueueReceiver<T>>>,
    results: mpsc::UnboundedSender<JobResult<T>>,
    counters: Arc<PoolCounters>,
    outstanding: Arc<Mutex<HashSet<JobId>>>,
) {
    loop {
        let job = {
            let mut receiver = queue.lock().await;
            receiver.recv().await
        };
        let Some(QueuedJob { id, run }) = job else {
            break;
        };

        let outcome = match AssertUnwindSafe(async move { run().await })
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::warn!("Job {} panicked: {}", id, message);
                Err(anyhow::anyhow!("job panicked: {}", message))
            }
        };

        lock(&outstanding).remove(&id);
        if results.send(JobResult { job_id: id, outcome }).is_err() {
            tracing::debug!("Result channel closed; dropping outcome of job {}", id);
        }
        counters.finished.fetch_add(1, Ordering::SeqCst);
    }

    tracing::trace!("Worker {} exiting", index);
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn lock<V>(mutex: &Mutex<V>) -> std::sync::MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
