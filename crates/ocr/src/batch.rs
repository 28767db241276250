use std::collections::HashSet;
use std::path::PathBuf;

use crossbeam_channel::RecvTimeoutError;
use idscan_core::{BatchResult, JobReport};
use tracing::{debug, warn};

use crate::pool::{PoolError, WorkerPool};

/// Run every path through `pool` and collect one outcome per distinct path.
///
/// All jobs are enqueued up front, then results are drained in completion
/// order until each submitted job has reported. `on_report(done, total, report)`
/// is called once per finished job. A drain timeout is logged and retried; it
/// only becomes an error once no worker is left alive to answer.
pub fn run_batch<I, F>(pool: &WorkerPool, paths: I, mut on_report: F) -> Result<BatchResult, PoolError>
where
    I: IntoIterator<Item = PathBuf>,
    F: FnMut(usize, usize, &JobReport),
{
    let mut seen = HashSet::new();
    let jobs: Vec<PathBuf> = paths
        .into_iter()
        .filter(|p| {
            let fresh = seen.insert(p.clone());
            if !fresh {
                debug!("Skipping duplicate path {}", p.display());
            }
            fresh
        })
        .collect();

    let total = jobs.len();
    for (queued, path) in jobs.into_iter().enumerate() {
        pool.submit(path)
            .map_err(|_| PoolError::WorkersGone { pending: total - queued })?;
    }

    let mut batch = BatchResult::default();
    let mut received = 0;
    while received < total {
        match pool.recv_report(pool.config().poll_timeout) {
            Ok(report) => {
                received += 1;
                on_report(received, total, &report);
                batch.record(report);
            }
            Err(RecvTimeoutError::Timeout) => {
                if pool.live_workers() == 0 {
                    return Err(PoolError::WorkersGone { pending: total - received });
                }
                warn!(
                    "Timed out waiting for results, {} of {total} still outstanding",
                    total - received
                );
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(PoolError::WorkersGone { pending: total - received });
            }
        }
    }
    Ok(batch)
}
