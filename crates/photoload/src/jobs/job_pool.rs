use std::{
    future::Future,
    io,
    panic::{self, AssertUnwindSafe},
    thread,
};

use crossbeam::channel::{self, Sender};
use tokio::sync::oneshot;

use crate::Error;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed set of worker threads for blocking work such as image decoding.
///
/// Workers exit once the pool is dropped and the queue has drained. A job
/// that panics only fails its own result; the worker keeps going.
pub struct JobPool {
    tx: Sender<Job>,
}

impl JobPool {
    pub fn new(num_threads: usize) -> io::Result<Self> {
        let (tx, rx) = channel::unbounded::<Job>();
        let workers = num_threads.max(1);

        for idx in 0..workers {
            let rx = rx.clone();
            thread::Builder::new()
                .name(format!("photoload-worker-{idx}"))
                .spawn(move || {
                    while let Ok(job) = rx.recv() {
                        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                            tracing::error!("job panicked on worker {idx}");
                        }
                    }
                    tracing::trace!("job pool worker {idx} shutting down");
                })?;
        }

        Ok(Self { tx })
    }

    pub fn schedule<F, T>(&self, job: F) -> impl Future<Output = Result<T, Error>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx_result, rx_result) = oneshot::channel::<T>();

        let job: Job = Box::new(move || {
            let output = job();
            let _ = tx_result.send(output);
        });

        let sent = self.tx.send(job).is_ok();

        async move {
            if !sent {
                return Err(Error::Generic("job pool is shut down".to_owned()));
            }

            rx_result.await.map_err(|_| {
                Error::Generic("worker dropped the job before returning a result".to_owned())
            })
        }
    }
}

/// Compute a worker count based on available parallelism, clamped to a max.
pub fn worker_count(max_workers: usize) -> usize {
    let available = thread::available_parallelism()
        .map(|count| count.get())
        .unwrap_or(1);
    let max_workers = max_workers.max(1);
    available.clamp(1, max_workers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(a: u32, b: u32) -> u32 {
        a + b
    }

    #[tokio::test]
    async fn jobs_return_their_own_types() {
        let pool = JobPool::new(2).unwrap();

        let future_str = pool.schedule(|| -> String { "decoded".into() });
        let (a, b) = (5, 6);
        let future_int = pool.schedule(move || add(a, b));

        assert_eq!(future_str.await.unwrap(), "decoded");
        assert_eq!(future_int.await.unwrap(), 11);
    }

    #[tokio::test]
    async fn panicking_job_reports_an_error() {
        let pool = JobPool::new(1).unwrap();
        let res = pool.schedule(|| -> u8 { panic!("decoder blew up") }).await;
        assert!(res.is_err());

        // the only worker survived and picks up the next job
        assert_eq!(pool.schedule(|| 7u8).await.unwrap(), 7);
    }

    #[test]
    fn worker_count_is_clamped() {
        assert_eq!(worker_count(0), 1);
        assert!(worker_count(4) <= 4);
    }
}
