use crate::{Error, Result};
use rayon::ThreadPoolBuilder;
use std::sync::OnceLock;

/// Environment variable overriding the worker count of the global pool.
pub const THREADS_ENV: &str = "RUSTCV_CPU_THREADS";

static GLOBAL_POOL: OnceLock<Result<usize>> = OnceLock::new();

/// Configure the global Rayon pool used by the parallel filters and
/// depth conversions, returning its worker count.
///
/// An explicit `num_threads` wins over [`THREADS_ENV`]; with neither, Rayon
/// picks. Only the first call configures the pool and later calls replay its
/// outcome.
pub fn init_global_thread_pool(num_threads: Option<usize>) -> Result<usize> {
    GLOBAL_POOL
        .get_or_init(|| {
            let requested = match num_threads {
                Some(n) => Some(checked_thread_count(n)?),
                None => threads_from_env()?,
            };
            let builder = match requested {
                Some(n) => ThreadPoolBuilder::new().num_threads(n),
                None => ThreadPoolBuilder::new(),
            };
            builder
                .build_global()
                .map_err(|e| Error::InvalidInput(format!("Global thread pool: {}", e)))?;
            Ok(rayon::current_num_threads())
        })
        .clone()
}

pub fn current_cpu_threads() -> usize {
    rayon::current_num_threads()
}

fn threads_from_env() -> Result<Option<usize>> {
    match std::env::var(THREADS_ENV) {
        Ok(raw) => parse_thread_count(&raw).map(Some),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(Error::InvalidInput(format!("{}: {}", THREADS_ENV, e))),
    }
}

fn parse_thread_count(raw: &str) -> Result<usize> {
    let n = raw.trim().parse::<usize>().map_err(|_| {
        Error::InvalidInput(format!("{} must be a positive integer, got '{}'", THREADS_ENV, raw))
    })?;
    checked_thread_count(n)
}

fn checked_thread_count(n: usize) -> Result<usize> {
    if n == 0 {
        return Err(Error::InvalidInput("Thread count must be at least 1".into()));
    }
    Ok(n)
}
