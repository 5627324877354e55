mod job_pool;

pub use job_pool::{worker_count, JobPool};
