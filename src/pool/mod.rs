//! Bounded worker pool
//!
//! A fixed set of worker threads pulls boxed jobs from a shared channel. The
//! pool tracks how many jobs are queued or running so the submitter can block
//! until everything it handed over has finished, without polling.
//!
//! Jobs return nothing; they report results through whatever they captured
//! (typically a channel to a collector thread).
//!
//! ```rust,no_run
//! use image_similarity::pool::WorkPool;
//! use crossbeam_channel::unbounded;
//!
//! let pool = WorkPool::new(4).unwrap();
//! let (tx, rx) = unbounded();
//! for n in 0..10u64 {
//!     let tx = tx.clone();
//!     pool.submit(move || {
//!         let _ = tx.send(n * n);
//!     })
//!     .unwrap();
//! }
//! pool.mark_no_more_work();
//! pool.wait_for_drain();
//! drop(tx);
//! let total: u64 = rx.iter().sum();
//! assert_eq!(total, 285);
//! ```

use crate::core::error::{Result, SimilarityError};
use crossbeam_channel::{unbounded, Sender};
use log::{error, trace};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

/// Default number of worker threads
pub const DEFAULT_MAX_WORKERS: usize = 6;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Queued-or-running job counter with a drain signal
#[derive(Default)]
struct DrainState {
    outstanding: Mutex<usize>,
    drained: Condvar,
    panicked: AtomicUsize,
}

impl DrainState {
    fn lock(&self) -> MutexGuard<'_, usize> {
        self.outstanding
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn add(&self) {
        *self.lock() += 1;
    }

    fn finish(&self) {
        let mut outstanding = self.lock();
        *outstanding = outstanding.saturating_sub(1);
        if *outstanding == 0 {
            self.drained.notify_all();
        }
    }
}

/// Decrements the counter even if the job unwinds
struct FinishGuard<'a>(&'a DrainState);

impl Drop for FinishGuard<'_> {
    fn drop(&mut self) {
        self.0.finish();
    }
}

/// Fixed-size pool of worker threads fed by a channel
pub struct WorkPool {
    sender: Mutex<Option<Sender<Job>>>,
    workers: Vec<JoinHandle<()>>,
    state: Arc<DrainState>,
}

impl WorkPool {
    /// Start `max_workers` threads
    pub fn new(max_workers: usize) -> Result<Self> {
        if max_workers == 0 {
            return Err(SimilarityError::InvalidConfig(
                "max_workers must be at least 1".to_string(),
            ));
        }

        let (sender, receiver) = unbounded::<Job>();
        let state = Arc::new(DrainState::default());
        let mut workers = Vec::with_capacity(max_workers);

        for id in 0..max_workers {
            let receiver = receiver.clone();
            let state = Arc::clone(&state);

            let handle = thread::Builder::new()
                .name(format!("fingerprint-worker-{}", id))
                .spawn(move || {
                    for job in receiver.iter() {
                        let _finish = FinishGuard(&state);
                        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                            state.panicked.fetch_add(1, Ordering::Relaxed);
                            error!("Worker {} job panicked", id);
                        }
                    }
                    trace!("Worker {} exiting", id);
                })
                .map_err(|e| SimilarityError::Pool(format!("failed to spawn worker: {}", e)))?;

            workers.push(handle);
        }

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            workers,
            state,
        })
    }

    /// Number of worker threads
    pub fn max_workers(&self) -> usize {
        self.workers.len()
    }

    /// Queue a job. Fails once [`mark_no_more_work`](Self::mark_no_more_work) was called.
    pub fn submit<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self.sender_slot();
        let Some(sender) = sender.as_ref() else {
            return Err(SimilarityError::Pool(
                "job submitted after mark_no_more_work".to_string(),
            ));
        };

        self.state.add();
        if sender.send(Box::new(job)).is_err() {
            self.state.finish();
            return Err(SimilarityError::Pool("all workers have stopped".to_string()));
        }
        Ok(())
    }

    /// Close the queue. Already queued jobs still run.
    pub fn mark_no_more_work(&self) {
        self.sender_slot().take();
    }

    /// True while any submitted job is queued or running
    pub fn is_draining(&self) -> bool {
        *self.state.lock() > 0
    }

    /// Block until every submitted job has finished
    pub fn wait_for_drain(&self) {
        let mut outstanding = self.state.lock();
        while *outstanding > 0 {
            outstanding = self
                .state
                .drained
                .wait(outstanding)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    /// Jobs that panicked so far
    pub fn panicked_jobs(&self) -> usize {
        self.state.panicked.load(Ordering::Relaxed)
    }

    /// Close the queue, run what is left, and stop the workers
    pub fn join(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.mark_no_more_work();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                error!("Worker thread terminated abnormally");
            }
        }
    }

    fn sender_slot(&self) -> MutexGuard<'_, Option<Sender<Job>>> {
        self.sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for WorkPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
