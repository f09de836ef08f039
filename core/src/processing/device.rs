use crate::prelude::{FeatureError, FeatureResult};
use log::{debug, info};
use rayon::{ThreadPool, ThreadPoolBuilder};

/// Compute device the kernels are launched on.
///
/// Wraps a dedicated rayon pool. Acquire one per batch; the pool is torn down
/// when the handle is dropped, on success and failure alike.
pub struct Device {
    pool: ThreadPool,
}

impl Device {
    /// Acquires a device with `threads` workers (0 selects one per core).
    pub fn acquire(threads: usize) -> FeatureResult<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("candies-kernel-{}", i))
            .build()
            .map_err(|e| FeatureError::Device(format!("acquiring {} worker threads: {}", threads, e)))?;
        info!("Acquired device with {} worker threads", pool.current_num_threads());
        Ok(Self { pool })
    }

    /// Runs `f` with a device held for exactly its duration.
    pub fn scoped<R, F>(threads: usize, f: F) -> FeatureResult<R>
    where
        F: FnOnce(&Device) -> R,
    {
        let device = Self::acquire(threads)?;
        Ok(f(&device))
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Runs a kernel body on the device's workers and waits for it.
    pub fn launch<R, F>(&self, body: F) -> R
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        self.pool.install(body)
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        debug!("Releasing device with {} worker threads", self.threads());
    }
}
