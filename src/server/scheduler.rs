//! Fixed pool of busy-polling worker threads.
//!
//! Each worker owns the tasks assigned to it and polls them in a stable
//! round-robin order, one pass after another. A task that returns `Ready`
//! or an error is dropped on the spot, so it is never polled again. Tasks
//! never move between workers.
//!
//! New tasks travel to their worker over a per-worker channel; that channel
//! and the per-worker load counters are the only state shared between the
//! spawning thread and the workers.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, trace, warn};

use crate::config::SchedulerConfig;
use crate::error::ServerError;
use crate::poll::{PollOutcome, Pollable};
use crate::server::backoff::{IdleBackoff, IdleStrategy};

/// A type-erased unit of work owned by one worker.
pub type Task = Box<dyn Pollable<Item = (), Error = anyhow::Error> + Send>;

pub struct Scheduler {
    senders: Vec<Sender<Task>>,
    loads: Arc<Vec<AtomicUsize>>,
    cursor: AtomicUsize,
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    /// Starts `config.worker_count()` workers using [`IdleBackoff`].
    pub fn new(config: &SchedulerConfig) -> Result<Self, ServerError> {
        let idle = config.idle.clone();
        Self::with_strategy(config.worker_count(), move |_| IdleBackoff::new(&idle))
    }

    /// Starts `workers` workers (at least one), each waiting with the
    /// strategy `make` builds for its index.
    pub fn with_strategy<S, F>(workers: usize, make: F) -> Result<Self, ServerError>
    where
        S: IdleStrategy + 'static,
        F: Fn(usize) -> S,
    {
        let workers = workers.max(1);
        let loads: Arc<Vec<AtomicUsize>> =
            Arc::new((0..workers).map(|_| AtomicUsize::new(0)).collect());

        let mut senders = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);

        for id in 0..workers {
            let (tx, rx) = crossbeam_channel::unbounded();
            let worker = Worker {
                id,
                rx,
                tasks: Vec::new(),
                loads: loads.clone(),
                strategy: make(id),
            };

            let handle = thread::Builder::new()
                .name(format!("spinserve-worker-{id}"))
                .spawn(move || worker.run())
                .map_err(ServerError::Spawn)?;

            senders.push(tx);
            handles.push(handle);
        }

        debug!(workers, "Scheduler started");

        Ok(Self {
            senders,
            loads,
            cursor: AtomicUsize::new(0),
            handles,
        })
    }

    pub fn workers(&self) -> usize {
        self.senders.len()
    }

    /// Live tasks per worker, indexed by worker.
    pub fn loads(&self) -> Vec<usize> {
        self.loads.iter().map(|l| l.load(Ordering::Acquire)).collect()
    }

    /// Hands `task` to the least-loaded worker and returns its index.
    ///
    /// Ties are broken round-robin, so a burst of spawns spreads evenly.
    pub fn spawn<P>(&self, task: P) -> Result<usize, ServerError>
    where
        P: Pollable<Item = ()> + Send + 'static,
        P::Error: Into<anyhow::Error>,
    {
        let task: Task = Box::new(task.map_err(|e| -> anyhow::Error { e.into() }));
        let worker = self.pick();

        self.loads[worker].fetch_add(1, Ordering::AcqRel);
        if self.senders[worker].send(task).is_err() {
            self.loads[worker].fetch_sub(1, Ordering::AcqRel);
            return Err(ServerError::SchedulerClosed);
        }

        trace!(worker, "Task assigned");
        Ok(worker)
    }

    fn pick(&self) -> usize {
        let n = self.senders.len();
        let start = self.cursor.fetch_add(1, Ordering::Relaxed) % n;
        (0..n)
            .map(|i| (start + i) % n)
            .min_by_key(|&i| self.loads[i].load(Ordering::Acquire))
            .unwrap_or(start)
    }

    /// Stops accepting tasks and waits for every worker to drain its
    /// remaining tasks and exit.
    pub fn join(self) {
        let Scheduler {
            senders, handles, ..
        } = self;
        drop(senders);

        for handle in handles {
            if handle.join().is_err() {
                warn!("Worker thread panicked");
            }
        }
        debug!("Scheduler stopped");
    }
}

struct Worker<S> {
    id: usize,
    rx: Receiver<Task>,
    tasks: Vec<Task>,
    loads: Arc<Vec<AtomicUsize>>,
    strategy: S,
}

impl<S: IdleStrategy> Worker<S> {
    fn run(mut self) {
        loop {
            if self.tasks.is_empty() {
                // Nothing to poll: block until work arrives or the
                // scheduler is gone.
                match self.rx.recv() {
                    Ok(task) => self.tasks.push(task),
                    Err(_) => break,
                }
            }

            let before = self.tasks.len();
            while let Ok(task) = self.rx.try_recv() {
                self.tasks.push(task);
            }
            let received = self.tasks.len() > before;

            let retired = self.pass();
            if retired > 0 || received {
                self.strategy.reset();
            } else {
                self.strategy.idle();
            }
        }
        debug!(worker = self.id, "Worker exiting");
    }

    /// Polls every task once, in order. Returns how many retired.
    fn pass(&mut self) -> usize {
        let id = self.id;
        let before = self.tasks.len();

        self.tasks.retain_mut(|task| {
            match panic::catch_unwind(AssertUnwindSafe(|| task.poll())) {
                Ok(Ok(PollOutcome::NotReady)) => true,
                Ok(Ok(PollOutcome::Ready(()))) => {
                    debug!(worker = id, "Task completed");
                    false
                }
                Ok(Err(e)) => {
                    warn!(worker = id, error = %e, "Task failed");
                    false
                }
                Err(_) => {
                    warn!(worker = id, "Task panicked");
                    false
                }
            }
        });

        let retired = before - self.tasks.len();
        if retired > 0 {
            self.loads[id].fetch_sub(retired, Ordering::AcqRel);
            trace!(worker = id, retired, live = self.tasks.len(), "Pass finished");
        }
        retired
    }
}
