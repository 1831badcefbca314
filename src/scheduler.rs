//! Deferred-execution collaborators.
//!
//! The promise core never runs a reaction handler inline; every handler
//! invocation hops through a [`Scheduler`]. The contract is small: run the
//! job later, never on the current call stack, preserving FIFO order among
//! jobs scheduled by the same flush.

use std::collections::VecDeque;
use std::sync::mpsc::{channel, Sender};
use std::sync::{Arc, Mutex};
use std::thread;

use log::trace;

/// A deferred unit of work.
pub type Job = Box<dyn FnOnce() + Send>;

/// Shared handle to a scheduler, carried by every promise.
pub type SchedulerRef = Arc<dyn Scheduler>;

/// Schedules a zero-argument callback for later, non-blocking execution.
pub trait Scheduler: Send + Sync {
    fn schedule(&self, job: Job);
}

/// A manually stepped FIFO queue.
///
/// Nothing runs until the owner drains the queue, which makes reaction
/// ordering fully deterministic. This is both the default microtask-queue
/// rendition and the fake scheduler the test suite drives by hand.
#[derive(Default)]
pub struct QueueScheduler {
    queue: Mutex<VecDeque<Job>>,
}

impl QueueScheduler {
    pub fn new() -> QueueScheduler {
        QueueScheduler::default()
    }

    /// Runs the next queued job, if any. Returns `false` once the queue is
    /// empty.
    pub fn step(&self) -> bool {
        let job = self.queue.lock().unwrap().pop_front();
        match job {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Drains the queue in FIFO order, including jobs enqueued by the jobs
    /// themselves, until nothing is left.
    pub fn run_until_idle(&self) {
        let mut ran = 0usize;
        while self.step() {
            ran += 1;
        }
        trace!("queue scheduler idle after {ran} jobs");
    }

    pub fn is_idle(&self) -> bool {
        self.queue.lock().unwrap().is_empty()
    }
}

impl Scheduler for QueueScheduler {
    fn schedule(&self, job: Job) {
        self.queue.lock().unwrap().push_back(job);
    }
}

/// A scheduler backed by a single worker thread draining a channel.
///
/// Jobs run asynchronously but still one at a time and in submission
/// order, so the promise ordering guarantees hold unchanged.
pub struct ThreadScheduler {
    sender: Mutex<Sender<Job>>,
}

impl ThreadScheduler {
    pub fn spawn() -> Arc<ThreadScheduler> {
        let (sender, receiver) = channel::<Job>();
        thread::spawn(move || {
            for job in receiver {
                job();
            }
            trace!("thread scheduler worker exiting");
        });
        Arc::new(ThreadScheduler {
            sender: Mutex::new(sender),
        })
    }
}

impl Scheduler for ThreadScheduler {
    fn schedule(&self, job: Job) {
        // The worker exits only once every sender is gone; a failed send
        // means nobody is left to run jobs anyway.
        let _ = self.sender.lock().unwrap().send(job);
    }
}
