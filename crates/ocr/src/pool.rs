use std::num::NonZeroUsize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use idscan_core::{JobReport, Outcome};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::extract::FieldExtractor;
use crate::pipeline::{panic_message, DocumentPipeline};
use crate::recognizer::{OcrBackend, OcrError};

pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("Worker pool needs at least one worker")]
    NoWorkers,
    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("All workers have exited with {pending} job(s) unaccounted for")]
    WorkersGone { pending: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub workers: usize,
    /// Jobs that may wait in the queue before `submit` blocks.
    pub queue_capacity: usize,
    /// How long a worker, or the result drain, waits before polling again.
    pub poll_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: thread::available_parallelism().map_or(1, NonZeroUsize::get),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

enum WorkerMessage {
    Job(PathBuf),
    /// Sent once per worker on shutdown.
    Stop,
}

/// Fixed set of OS threads, each owning a private OCR engine, fed from one
/// bounded job queue and reporting into one result channel.
pub struct WorkerPool {
    jobs: Sender<WorkerMessage>,
    results: Receiver<JobReport>,
    handles: Vec<JoinHandle<()>>,
    config: PoolConfig,
}

impl WorkerPool {
    /// Spawn `config.workers` threads. `factory(worker_id)` runs on each
    /// worker's own thread to build that worker's engine.
    pub fn start<R, F>(
        config: PoolConfig,
        extractor: FieldExtractor,
        factory: F,
    ) -> Result<Self, PoolError>
    where
        R: OcrBackend + 'static,
        F: Fn(usize) -> Result<R, OcrError> + Send + Sync + 'static,
    {
        if config.workers == 0 {
            return Err(PoolError::NoWorkers);
        }

        let (job_tx, job_rx) = bounded(config.queue_capacity);
        let (result_tx, result_rx) = unbounded();
        let factory = Arc::new(factory);

        let mut pool = WorkerPool {
            jobs: job_tx,
            results: result_rx,
            handles: Vec::with_capacity(config.workers),
            config,
        };

        for id in 0..pool.config.workers {
            let worker = Worker {
                id,
                jobs: job_rx.clone(),
                results: result_tx.clone(),
                poll_timeout: pool.config.poll_timeout,
            };
            let factory = Arc::clone(&factory);
            let extractor = extractor.clone();
            let handle = thread::Builder::new()
                .name(format!("ocr-worker-{id}"))
                .spawn(move || worker.run(factory.as_ref(), extractor))?;
            pool.handles.push(handle);
        }

        info!(
            "Started {} OCR workers (queue capacity {})",
            pool.config.workers, pool.config.queue_capacity
        );
        Ok(pool)
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Enqueue one image. Blocks while the queue is full.
    pub fn submit(&self, path: PathBuf) -> Result<(), PoolError> {
        self.jobs
            .send(WorkerMessage::Job(path))
            .map_err(|_| PoolError::WorkersGone { pending: 1 })
    }

    /// Wait up to `timeout` for the next finished job.
    pub fn recv_report(&self, timeout: Duration) -> Result<JobReport, RecvTimeoutError> {
        self.results.recv_timeout(timeout)
    }

    /// Worker threads that have not exited yet.
    pub fn live_workers(&self) -> usize {
        self.handles.iter().filter(|h| !h.is_finished()).count()
    }

    /// Stop every worker after the jobs already queued ahead of the stop
    /// messages, and wait for all of them to exit.
    pub fn shutdown(mut self) {
        self.stop_workers();
    }

    fn stop_workers(&mut self) {
        if self.handles.is_empty() {
            return;
        }
        for _ in 0..self.handles.len() {
            // Fails only when every worker is already gone.
            let _ = self.jobs.send(WorkerMessage::Stop);
        }
        for handle in self.handles.drain(..) {
            let name = handle.thread().name().unwrap_or("ocr-worker").to_string();
            if handle.join().is_err() {
                error!("{name} terminated abnormally");
            }
        }
        info!("All OCR workers stopped");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop_workers();
    }
}

struct Worker {
    id: usize,
    jobs: Receiver<WorkerMessage>,
    results: Sender<JobReport>,
    poll_timeout: Duration,
}

impl Worker {
    fn run<R, F>(self, factory: &F, extractor: FieldExtractor)
    where
        R: OcrBackend,
        F: Fn(usize) -> Result<R, OcrError>,
    {
        // An engine that fails to start still answers every job it takes,
        // so the driver's count always adds up.
        let mut pipeline = match catch_unwind(AssertUnwindSafe(|| factory(self.id))) {
            Ok(Ok(engine)) => Ok(DocumentPipeline::new(engine, extractor)),
            Ok(Err(e)) => Err(e.to_string()),
            Err(payload) => Err(panic_message(&*payload)),
        };
        match &pipeline {
            Ok(_) => debug!("Worker {} ready", self.id),
            Err(reason) => error!("Worker {} has no OCR engine: {reason}", self.id),
        }

        loop {
            match self.jobs.recv_timeout(self.poll_timeout) {
                Ok(WorkerMessage::Job(path)) => {
                    let report = match &mut pipeline {
                        Ok(p) => p.process_job(&path),
                        Err(reason) => JobReport::new(
                            path,
                            Outcome::failure(format!("OCR engine unavailable: {reason}")),
                        ),
                    };
                    if self.results.send(report).is_err() {
                        // Nobody is listening for results any more.
                        break;
                    }
                }
                Ok(WorkerMessage::Stop) => break,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        debug!("Worker {} exiting", self.id);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::preprocess::tests::write_png;
    use crate::preprocess::LoadedImage;
    use crate::recognizer::{MockRecognizer, OcrOutput};
    use idscan_core::Point;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub(crate) fn test_config(workers: usize) -> PoolConfig {
        PoolConfig {
            workers,
            queue_capacity: 4,
            poll_timeout: Duration::from_millis(50),
        }
    }

    /// Succeeds for every image except those whose name contains "bad".
    pub(crate) struct ScriptedRecognizer;

    impl OcrBackend for ScriptedRecognizer {
        fn recognize(&mut self, image: &LoadedImage) -> Result<OcrOutput, OcrError> {
            let name = image.path().to_string_lossy();
            if name.contains("bad") {
                return Err(OcrError::Engine("inference failed".into()));
            }
            Ok(OcrOutput {
                input_path: Some(name.into_owned()),
                rec_texts: vec!["123456".into()],
                dt_polys: vec![vec![Point(30.0, 2.0), Point(38.0, 2.0), Point(38.0, 4.0), Point(30.0, 4.0)]],
            })
        }
    }

    pub(crate) fn scripted_pool(workers: usize) -> WorkerPool {
        WorkerPool::start(test_config(workers), FieldExtractor::default(), |_| {
            Ok(ScriptedRecognizer)
        })
        .unwrap()
    }

    #[test]
    fn zero_workers_is_rejected() {
        let result = WorkerPool::start(test_config(0), FieldExtractor::default(), |_| {
            Ok(ScriptedRecognizer)
        });
        assert!(matches!(result, Err(PoolError::NoWorkers)));
    }

    #[test]
    fn each_worker_builds_its_own_engine() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&built);
        let pool = WorkerPool::start(test_config(3), FieldExtractor::default(), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(MockRecognizer::new(OcrOutput::default()))
        })
        .unwrap();
        pool.shutdown();
        assert_eq!(built.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn submitted_job_comes_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "card.png", 40, 10);
        let pool = scripted_pool(2);

        pool.submit(path.clone()).unwrap();
        let report = pool.recv_report(Duration::from_secs(10)).unwrap();

        assert_eq!(report.path, path);
        assert_eq!(
            report.outcome.fields().and_then(|f| f.card_number.as_deref()),
            Some("Z123456")
        );
        pool.shutdown();
    }

    #[test]
    fn failed_engine_start_answers_with_failures() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "card.png", 40, 10);
        let pool = WorkerPool::start(test_config(1), FieldExtractor::default(), |_| {
            Err::<MockRecognizer, _>(OcrError::Engine("model files missing".into()))
        })
        .unwrap();

        pool.submit(path).unwrap();
        let report = pool.recv_report(Duration::from_secs(10)).unwrap();
        assert_eq!(
            report.outcome.error(),
            Some("OCR engine unavailable: OCR engine error: model files missing")
        );
        pool.shutdown();
    }

    #[test]
    fn shutdown_stops_every_worker() {
        let mut pool = scripted_pool(3);
        assert_eq!(pool.live_workers(), 3);
        pool.stop_workers();
        assert_eq!(pool.live_workers(), 0);
        assert!(pool.handles.is_empty());
    }

    #[test]
    fn submit_after_workers_exit_fails() {
        let mut pool = scripted_pool(2);
        pool.stop_workers();
        let err = pool.submit(PathBuf::from("late.png")).unwrap_err();
        assert!(matches!(err, PoolError::WorkersGone { .. }));
    }

    #[test]
    fn queued_jobs_finish_before_stop() {
        let dir = tempfile::tempdir().unwrap();
        let pool = scripted_pool(1);
        for i in 0..3 {
            pool.submit(write_png(dir.path(), &format!("c{i}.png"), 40, 10)).unwrap();
        }
        let results = pool.results.clone();
        pool.shutdown();
        // Stop messages queue behind the jobs, so all three were processed.
        assert_eq!(results.try_iter().count(), 3);
    }

    #[test]
    fn drop_joins_workers() {
        let pool = scripted_pool(2);
        drop(pool);
    }
}
