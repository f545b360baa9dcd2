//! Process-style worker parallelism on threads: each worker owns one
//! long-lived oracle, installed once at pool startup, and drains a private
//! task queue. The pool schedules and collects; it owns no search logic.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{channel, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::{anyhow, ensure, Context, Result};
use log::debug;

use crate::solver::{OracleStats, SatOracle};
use crate::util::split_evenly;

type Job = Box<dyn FnOnce(&mut SatOracle) + Send>;

/// Seeds the per-`map` shuffle: deterministic, but different on every call,
/// so repeated rounds don't starve the same literals.
static MAP_COUNTER: AtomicU64 = AtomicU64::new(1);

enum Executor {
    /// In-process sequential execution on a single private oracle, used when
    /// the pool size is 0 or 1 (debugging, profiling, tiny machines).
    Sequential(Box<SatOracle>),
    Threaded { queues: Vec<Sender<Job>>, handles: Vec<JoinHandle<()>> },
}

/// A pool of long-lived workers, each holding a private copy of the oracle.
///
/// Workers receive their oracle once, at startup, from a shared blueprint of
/// the compiled formula, never through the task queue. `map` is a
/// synchronous barrier: it returns only after every dispatched task has
/// answered, with results corresponding one-to-one to the inputs.
pub struct WorkerPool {
    executor: Executor,
}

impl WorkerPool {
    /// Spawns `workers` threads, each bootstrapping its own oracle from
    /// `oracle`'s current state (formula, codec and known facts). Every
    /// worker confirms its bootstrap through an initialization handshake
    /// before the pool accepts tasks; a worker that cannot build its solver
    /// fails construction of the whole pool.
    pub fn new(oracle: &SatOracle, workers: usize) -> Result<Self> {
        if workers <= 1 {
            return Ok(Self { executor: Executor::Sequential(Box::new(oracle.worker_copy()?)) });
        }
        let blueprint = Arc::new(oracle.blueprint());
        let (ready_out, ready_in) = channel();
        let mut queues = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);
        for index in 0..workers {
            let (job_out, job_in) = channel::<Job>();
            let seed = Arc::clone(&blueprint);
            let ready = ready_out.clone();
            let handle = std::thread::Builder::new()
                .name(format!("mus-worker-{index}"))
                .spawn(move || {
                    let mut oracle = match seed.build() {
                        Ok(oracle) => {
                            let _ = ready.send(Ok(()));
                            oracle
                        }
                        Err(error) => {
                            let _ = ready.send(Err(error));
                            return;
                        }
                    };
                    while let Ok(job) = job_in.recv() {
                        job(&mut oracle);
                    }
                })
                .context("failed to spawn a worker thread")?;
            queues.push(job_out);
            handles.push(handle);
        }
        drop(ready_out);
        for _ in 0..workers {
            ready_in
                .recv()
                .context("a worker died before finishing its handshake")?
                .context("a worker failed to bootstrap its oracle")?;
        }
        Ok(Self { executor: Executor::Threaded { queues, handles } })
    }

    /// Number of workers backing this pool (1 for the sequential executor).
    pub fn workers(&self) -> usize {
        match &self.executor {
            Executor::Sequential(_) => 1,
            Executor::Threaded { queues, .. } => queues.len(),
        }
    }

    /// Runs `func` over every argument and collects all results before
    /// returning.
    ///
    /// Arguments are shuffled (deterministically per call) and partitioned
    /// near-evenly over the workers, so result order carries no information:
    /// callers must treat the output as a multiset keyed by whatever label
    /// each task carries. Within one worker, results arrive in its queue
    /// order, which is how the one-to-one input/result correspondence is
    /// kept.
    pub fn map<A, R, F>(&mut self, args: Vec<A>, func: F) -> Result<Vec<R>>
    where
        A: Send + 'static,
        R: Send + 'static,
        F: Fn(&mut SatOracle, A) -> R + Send + Sync + 'static,
    {
        match &mut self.executor {
            Executor::Sequential(oracle) => {
                let oracle: &mut SatOracle = oracle;
                Ok(args.into_iter().map(|arg| func(&mut *oracle, arg)).collect())
            }
            Executor::Threaded { queues, .. } => {
                let mut args = args;
                let seed = MAP_COUNTER.fetch_add(1, Ordering::Relaxed);
                fastrand::Rng::with_seed(seed).shuffle(&mut args);
                let expected = args.len();
                let chunks = split_evenly(args, queues.len());
                debug!(
                    "map: {expected} tasks chunked as {:?}",
                    chunks.iter().map(Vec::len).collect::<Vec<_>>()
                );
                let func = Arc::new(func);
                let mut collectors = Vec::with_capacity(queues.len());
                for (queue, chunk) in queues.iter().zip(chunks) {
                    let (result_out, result_in) = channel::<R>();
                    collectors.push((result_in, chunk.len()));
                    for arg in chunk {
                        let task = Arc::clone(&func);
                        let out = result_out.clone();
                        let job: Job = Box::new(move |oracle| {
                            let _ = out.send((*task)(oracle, arg));
                        });
                        queue.send(job).map_err(|_| anyhow!("a worker queue is closed"))?;
                    }
                }
                let mut results = Vec::with_capacity(expected);
                for (collector, count) in collectors {
                    for _ in 0..count {
                        results.push(
                            collector
                                .recv()
                                .context("a worker exited before answering")?,
                        );
                    }
                }
                ensure!(
                    results.len() == expected,
                    "missing answers: {} of {expected}",
                    results.len()
                );
                Ok(results)
            }
        }
    }

    /// Statistics sentinel: every worker reports its oracle statistics and
    /// resets them; the merged total is returned for the parent to absorb.
    pub fn drain_stats(&mut self) -> Result<OracleStats> {
        match &mut self.executor {
            Executor::Sequential(oracle) => {
                let stats = oracle.stats().clone();
                oracle.reset_stats();
                Ok(stats)
            }
            Executor::Threaded { queues, .. } => {
                let (result_out, result_in) = channel::<OracleStats>();
                for queue in queues.iter() {
                    let out = result_out.clone();
                    let job: Job = Box::new(move |oracle| {
                        let stats = oracle.stats().clone();
                        oracle.reset_stats();
                        let _ = out.send(stats);
                    });
                    queue.send(job).map_err(|_| anyhow!("a worker queue is closed"))?;
                }
                drop(result_out);
                let mut total = OracleStats::default();
                for _ in 0..queues.len() {
                    total.merge(&result_in.recv().context("a worker exited before reporting")?);
                }
                Ok(total)
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if let Executor::Threaded { queues, handles } = &mut self.executor {
            queues.clear();
            for handle in handles.drain(..) {
                let _ = handle.join();
            }
        }
    }
}
