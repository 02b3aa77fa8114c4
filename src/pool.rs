//! An order-preserving parallel map over a dedicated rayon thread pool.
//!
//! The TMCMC coordinator creates one pool per run and hands it every per-sample
//! work item of a phase. Each call blocks until all items are done, and result `i`
//! always belongs to input `i`.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::Result;

pub struct WorkerPool {
    pool: ThreadPool,
}

impl WorkerPool {
    /// Builds a pool with `n_threads` workers, or rayon's default (one per logical
    /// CPU) for `None`.
    pub fn new(n_threads: Option<usize>) -> Result<Self> {
        let mut builder = ThreadPoolBuilder::new();
        if let Some(n) = n_threads {
            builder = builder.num_threads(n);
        }
        Ok(Self {
            pool: builder.build()?,
        })
    }

    pub fn n_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Applies `f(i, &items[i])` to every item in parallel and returns the results in
    /// input order.
    pub fn map<I, U, F>(&self, items: &[I], f: F) -> Vec<U>
    where
        I: Sync,
        U: Send,
        F: Fn(usize, &I) -> U + Sync + Send,
    {
        self.pool.install(|| {
            items
                .par_iter()
                .enumerate()
                .map(|(i, item)| f(i, item))
                .collect()
        })
    }

    /// Like [`WorkerPool::map`] for fallible work. If any item fails the whole phase
    /// fails with one of the errors.
    pub fn try_map<I, U, F>(&self, items: &[I], f: F) -> Result<Vec<U>>
    where
        I: Sync,
        U: Send,
        F: Fn(usize, &I) -> Result<U> + Sync + Send,
    {
        self.pool.install(|| {
            items
                .par_iter()
                .enumerate()
                .map(|(i, item)| f(i, item))
                .collect()
        })
    }
}
