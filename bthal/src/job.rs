//! Background job queue.
//!
//! Console commands flagged as jobs run here so that a blocking request into
//! the stack does not hold up the prompt. At most a fixed number of jobs run at
//! a time; further jobs wait for a free slot.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};
use tokio::{
    runtime::Handle,
    sync::{oneshot, Semaphore},
    task::JoinSet,
};

use crate::{Error, ErrorKind, Result};

/// Default number of concurrently running jobs.
pub const DEFAULT_JOBS: usize = 4;

/// Bounded queue of blocking background jobs.
#[derive(Debug)]
pub struct JobQueue {
    rt: Handle,
    slots: Arc<Semaphore>,
    tasks: Mutex<JoinSet<()>>,
    spawned: AtomicUsize,
}

/// Completion signal of a submitted job.
#[derive(Debug)]
pub struct JobDone(oneshot::Receiver<()>);

impl JobDone {
    /// Waits until the job has finished.
    ///
    /// Also returns when the job panicked or was dropped before running.
    pub async fn wait(self) {
        let _ = self.0.await;
    }
}

impl JobQueue {
    /// Creates a job queue running at most `limit` jobs at a time on the current Tokio runtime.
    pub fn new(limit: usize) -> Result<Self> {
        let rt = Handle::try_current()
            .map_err(|err| Error::with_message(ErrorKind::Internal, format!("no Tokio runtime: {err}")))?;
        Ok(Self::with_handle(limit, rt))
    }

    /// Creates a job queue on the specified runtime.
    pub fn with_handle(limit: usize, rt: Handle) -> Self {
        Self {
            rt,
            slots: Arc::new(Semaphore::new(limit.max(1))),
            tasks: Mutex::new(JoinSet::new()),
            spawned: AtomicUsize::new(0),
        }
    }

    /// Queues a blocking job and returns immediately.
    ///
    /// May be called from any thread.
    pub fn submit(&self, job: impl FnOnce() + Send + 'static) -> JobDone {
        let (done_tx, done_rx) = oneshot::channel();
        let slots = self.slots.clone();
        let id = self.spawned.fetch_add(1, Ordering::SeqCst) + 1;

        let mut tasks = self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        while tasks.try_join_next().is_some() {}
        tasks.spawn_on(
            async move {
                let Ok(_slot) = slots.acquire_owned().await else { return };
                log::trace!("Job {id} started");
                if let Err(err) = tokio::task::spawn_blocking(job).await {
                    log::warn!("Job {id} failed: {err}");
                }
                log::trace!("Job {id} finished");
                let _ = done_tx.send(());
            },
            &self.rt,
        );
        JobDone(done_rx)
    }

    /// Number of jobs submitted since creation.
    pub fn spawned(&self) -> usize {
        self.spawned.load(Ordering::SeqCst)
    }

    /// Number of jobs not yet reaped.
    pub fn pending(&self) -> usize {
        self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    /// Waits until all jobs submitted so far have finished.
    pub async fn wait_idle(&self) {
        loop {
            let mut tasks = {
                let mut tasks = self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                std::mem::take(&mut *tasks)
            };
            if tasks.is_empty() {
                break;
            }
            while tasks.join_next().await.is_some() {}
        }
    }
}
