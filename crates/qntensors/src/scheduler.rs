//! Cost-sorted parallel dispatch of per-block kernel jobs.
//!
//! Contraction and decomposition assemble lists of independent dense-kernel
//! jobs, each tagged with an estimated flop cost. [`Scheduler::run`] sorts
//! them by descending cost (longest-job-first) and dispatches them across a
//! fixed worker pool, returning only after every job has finished.
//!
//! Jobs in one round must write disjoint destinations; the producers in this
//! crate guarantee that by emitting exactly one job per destination block.
//! The scheduler itself takes no locks around job data.

use std::sync::Mutex;

use crate::error::TensorError;

/// One independent dense-kernel invocation.
pub trait Task: Send {
    /// Estimated flop count, used for longest-job-first ordering.
    fn cost(&self) -> u64;

    /// Execute the kernel.
    fn run(&mut self) -> Result<(), TensorError>;
}

/// Scheduler configuration.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    /// Worker threads in the pool. `0` lets rayon pick the default
    /// (number of available cores).
    pub num_threads: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig { num_threads: 0 }
    }
}

/// Fixed-size fork-join worker pool.
pub struct Scheduler {
    pool: rayon::ThreadPool,
}

impl Scheduler {
    /// Build a scheduler with its own thread pool.
    pub fn new(config: SchedulerConfig) -> Result<Self, TensorError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.num_threads)
            .build()
            .map_err(|e| TensorError::ThreadPool {
                message: e.to_string(),
            })?;
        Ok(Scheduler { pool })
    }

    /// Number of worker threads.
    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run all jobs to completion, longest first.
    ///
    /// Blocks until every job has finished. If any job fails, the first
    /// error observed is returned after the join barrier (the jobs race, so
    /// which one wins is unspecified); partial writes of other jobs are not
    /// rolled back.
    pub fn run<J: Task>(&self, mut jobs: Vec<J>) -> Result<(), TensorError> {
        jobs.sort_by(|a, b| b.cost().cmp(&a.cost()));

        let first_err: Mutex<Option<TensorError>> = Mutex::new(None);
        self.pool.scope(|s| {
            for mut job in jobs {
                let first_err = &first_err;
                s.spawn(move |_| {
                    if let Err(e) = job.run() {
                        let mut slot = first_err.lock().unwrap_or_else(|p| p.into_inner());
                        if slot.is_none() {
                            *slot = Some(e);
                        }
                    }
                });
            }
        });

        match first_err.into_inner().unwrap_or_else(|p| p.into_inner()) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct AddTask<'a> {
        cost: u64,
        amount: usize,
        dst: &'a AtomicUsize,
        fail: bool,
    }

    impl Task for AddTask<'_> {
        fn cost(&self) -> u64 {
            self.cost
        }

        fn run(&mut self) -> Result<(), TensorError> {
            if self.fail {
                return Err(TensorError::shape("job failed"));
            }
            self.dst.fetch_add(self.amount, Ordering::Relaxed);
            Ok(())
        }
    }

    fn run_sum(num_threads: usize, n: usize) -> usize {
        let sched = Scheduler::new(SchedulerConfig { num_threads }).unwrap();
        let total = AtomicUsize::new(0);
        let jobs: Vec<AddTask> = (0..n)
            .map(|i| AddTask {
                cost: (i % 7) as u64,
                amount: i,
                dst: &total,
                fail: false,
            })
            .collect();
        sched.run(jobs).unwrap();
        total.load(Ordering::Relaxed)
    }

    #[test]
    fn test_all_jobs_complete() {
        let expect: usize = (0..100).sum();
        assert_eq!(run_sum(1, 100), expect);
        assert_eq!(run_sum(2, 100), expect);
        assert_eq!(run_sum(4, 100), expect);
    }

    #[test]
    fn test_empty_batch() {
        let sched = Scheduler::new(SchedulerConfig::default()).unwrap();
        sched.run(Vec::<AddTask>::new()).unwrap();
    }

    #[test]
    fn test_failing_job_fails_batch() {
        let sched = Scheduler::new(SchedulerConfig { num_threads: 2 }).unwrap();
        let total = AtomicUsize::new(0);
        let mut jobs: Vec<AddTask> = (0..10)
            .map(|i| AddTask {
                cost: i as u64,
                amount: 1,
                dst: &total,
                fail: false,
            })
            .collect();
        jobs[3].fail = true;
        let err = sched.run(jobs).unwrap_err();
        assert!(matches!(err, TensorError::Shape { .. }));
        // the other jobs still ran to the join barrier
        assert_eq!(total.load(Ordering::Relaxed), 9);
    }
}
