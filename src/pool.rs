//! Worker pool for modular exponentiation heavy computations of a party
//!
//! The pool only speeds up independent per-peer work inside a round. A serial pool is always a valid substitute.
use crate::Error;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

pub struct Pool {
    inner: Option<ThreadPool>,
}

impl Pool {
    /// creates the pool with given number of threads, `0` selects the number of logical CPUs
    pub fn new(threads: usize) -> Result<Self, Error> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("cmp-pool-{}", i))
            .build()
            .map_err(|e| Error::Protocol(format!("cannot create thread pool: {}", e)))?;
        Ok(Self { inner: Some(pool) })
    }

    /// executes everything in the calling thread
    pub fn serial() -> Self {
        Self { inner: None }
    }

    /// applies `f` to every item, preserving the order of items
    pub fn parallelize<T, R, F>(&self, items: Vec<T>, f: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Send + Sync,
    {
        match &self.inner {
            Some(pool) => pool.install(|| items.into_par_iter().map(f).collect()),
            None => items.into_iter().map(f).collect(),
        }
    }
}

impl Default for Pool {
    fn default() -> Self {
        Self::serial()
    }
}

#[cfg(test)]
mod tests {
    use super::Pool;

    #[test]
    fn parallel_and_serial_agree() -> anyhow::Result<()> {
        let items = (0..64u64).collect::<Vec<_>>();
        let square = |x: u64| x * x;
        let serial = Pool::serial().parallelize(items.clone(), square);
        let parallel = Pool::new(4)?.parallelize(items, square);
        assert_eq!(serial, parallel);
        Ok(())
    }
}
