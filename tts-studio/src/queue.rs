//! Admission queue for generation requests.
//!
//! Jobs run one at a time. Jobs that arrive while another runs wait in a
//! bounded backlog; when the backlog is full new jobs are rejected rather
//! than dropped.

use crate::error::QueueError;
use log::debug;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Semaphore;

/// Default number of waiting requests.
pub const DEFAULT_BACKLOG: usize = 50;

/// One-at-a-time job runner with a bounded waiting list.
#[derive(Clone)]
pub struct JobQueue {
    slot: Arc<Semaphore>,
    waiting: Arc<AtomicUsize>,
    capacity: usize,
}

/// Counts a job as waiting until dropped.
struct Waiting<'a>(&'a AtomicUsize);

impl Drop for Waiting<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl JobQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            slot: Arc::new(Semaphore::new(1)),
            waiting: Arc::new(AtomicUsize::new(0)),
            capacity,
        }
    }

    #[cfg(test)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Jobs admitted but not yet running.
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    /// Reject all further jobs.
    #[cfg(test)]
    pub fn close(&self) {
        self.slot.close();
    }

    /// Run `job` once every earlier job has finished.
    pub async fn submit<F, T>(&self, job: F) -> Result<T, QueueError>
    where
        F: Future<Output = T>,
    {
        let capacity = self.capacity;
        self.waiting
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < capacity).then_some(n + 1)
            })
            .map_err(|_| QueueError::Full { capacity })?;

        let waiting = Waiting(&self.waiting);
        let permit = self
            .slot
            .acquire()
            .await
            .map_err(|_| QueueError::Closed)?;
        drop(waiting);

        debug!("Job started ({} waiting)", self.waiting());
        let output = job.await;
        drop(permit);
        Ok(output)
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new(DEFAULT_BACKLOG)
    }
}
