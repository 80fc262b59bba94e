//! Parallel chunk execution
//!
//! Fans a slice out over scoped worker threads. Workers borrow their input
//! without `'static` bounds and each fills a private output buffer; nothing
//! is shared mutably between workers.

use std::num::NonZeroUsize;

/// Fixed-width pool of scoped worker threads
#[derive(Debug, Clone)]
pub struct WorkerPool {
    workers: usize,
}

impl WorkerPool {
    /// Create a pool with `threads` workers (0 = available parallelism)
    pub fn new(threads: usize) -> Self {
        let workers = if threads == 0 {
            std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
        } else {
            threads
        };
        log::debug!("Worker pool using {} threads", workers);
        Self { workers }
    }

    /// Number of workers
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `f` over disjoint chunks of `items`, one output buffer per chunk
    ///
    /// With one worker (or one item) the work stays on the calling thread.
    /// A panic in a worker is resumed on the caller.
    pub fn map_chunks<I, R, F>(&self, items: &[I], f: F) -> Vec<Vec<R>>
    where
        I: Sync,
        R: Send,
        F: Fn(&[I], &mut Vec<R>) + Sync,
    {
        if items.is_empty() {
            return Vec::new();
        }
        if self.workers <= 1 || items.len() == 1 {
            let mut out = Vec::new();
            f(items, &mut out);
            return vec![out];
        }

        let chunk_size = items.len().div_ceil(self.workers);
        let f = &f;
        let scoped = crossbeam::thread::scope(|scope| {
            let handles: Vec<_> = items
                .chunks(chunk_size)
                .map(|chunk| {
                    scope.spawn(move |_| {
                        let mut out = Vec::new();
                        f(chunk, &mut out);
                        out
                    })
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
                .collect::<Vec<_>>()
        });

        scoped.unwrap_or_else(|panic| std::panic::resume_unwind(panic))
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(0)
    }
}
