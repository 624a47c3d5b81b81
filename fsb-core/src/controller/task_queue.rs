//! ``src/controller/task_queue.rs``
//! ============================================================================
//! # `TaskQueue` and the result channel
//!
//! One worker thread executes submitted [`Job`]s strictly in submission
//! order. Every job produces exactly one [`TaskResult`], posted through a
//! [`ResultSender`]; the interactive thread pulls them off the matching
//! [`ResultReceiver`] with `drain` on its own schedule. Search threads post
//! through clones of the same sender, so their results interleave with the
//! worker's.
//!
//! There is no cancellation. `stop` lets the running job finish and drops
//! whatever is still queued.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use tracing::{debug, error, info, warn};

use crate::controller::jobs::{self, Job, JobKind, JobOutput};
use crate::error::{AppError, AppResult};

/// Correlation id handed out on submission. Unique per result channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

impl JobId {
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Completion record for one job.
#[derive(Debug)]
pub struct TaskResult {
    pub job_id: JobId,
    pub kind: JobKind,
    pub elapsed: Duration,
    pub outcome: AppResult<JobOutput>,
}

/// Posting side of the result channel; clone freely across threads.
#[derive(Debug, Clone)]
pub struct ResultSender {
    tx: Sender<TaskResult>,
    next_id: Arc<AtomicU64>,
}

impl ResultSender {
    pub fn next_job_id(&self) -> JobId {
        JobId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Post a result. Returns `false` if the receiving side is gone.
    pub fn send(&self, result: TaskResult) -> bool {
        match self.tx.send(result) {
            Ok(()) => true,

            Err(err) => {
                warn!(job_id = %err.0.job_id, "Result dropped, receiver is gone");
                false
            }
        }
    }
}

/// Draining side of the result channel, owned by the interactive thread.
#[derive(Debug)]
pub struct ResultReceiver {
    rx: Receiver<TaskResult>,
}

impl ResultReceiver {
    /// Hand every result available right now to `handler`, without waiting.
    pub fn drain<F>(&self, mut handler: F) -> usize
    where
        F: FnMut(TaskResult),
    {
        let mut delivered: usize = 0;

        while let Ok(result) = self.rx.try_recv() {
            handler(result);
            delivered += 1;
        }

        delivered
    }

    pub fn try_recv(&self) -> Option<TaskResult> {
        self.rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<TaskResult> {
        self.rx.recv_timeout(timeout).ok()
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

#[must_use]
pub fn result_channel() -> (ResultSender, ResultReceiver) {
    let (tx, rx) = unbounded::<TaskResult>();

    (
        ResultSender {
            tx,
            next_id: Arc::new(AtomicU64::new(0)),
        },
        ResultReceiver { rx },
    )
}

/// Run a job body, turning a panic into `JobPanicked`.
pub fn run_guarded<F>(job_id: JobId, body: F) -> AppResult<JobOutput>
where
    F: FnOnce() -> AppResult<JobOutput>,
{
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(outcome) => outcome,

        Err(payload) => {
            let message: String = panic_message(payload.as_ref());
            error!(marker = "JOB_PANICKED", %job_id, message = %message, "Job panicked");
            Err(AppError::JobPanicked { job_id, message })
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

struct QueuedJob {
    id: JobId,
    job: Job,
}

/// Single-worker FIFO executor.
pub struct TaskQueue {
    job_tx: Option<Sender<QueuedJob>>,
    sender: ResultSender,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl TaskQueue {
    /// Spawn the worker. `poll_interval` bounds how long it waits for work
    /// before re-checking the stop flag.
    pub fn start(sender: ResultSender, poll_interval: Duration) -> AppResult<Self> {
        let (job_tx, job_rx) = unbounded::<QueuedJob>();
        let running: Arc<AtomicBool> = Arc::new(AtomicBool::new(true));

        let worker: JoinHandle<()> = thread::Builder::new()
            .name("fsb-worker".to_string())
            .spawn({
                let running: Arc<AtomicBool> = Arc::clone(&running);
                let sender: ResultSender = sender.clone();
                move || {
                    worker_loop(&job_rx, &sender, &running, poll_interval);
                }
            })
            .map_err(|e| {
                error!("Failed to spawn worker thread: {}", e);
                AppError::WorkerStopped
            })?;

        info!(
            marker = "WORKER_STARTED",
            poll_interval_ms = poll_interval.as_millis() as u64,
            "Task queue started"
        );

        Ok(Self {
            job_tx: Some(job_tx),
            sender,
            running,
            worker: Some(worker),
        })
    }

    /// Enqueue `job` and return its id. Never waits for the worker.
    pub fn submit(&self, job: Job) -> AppResult<JobId> {
        let Some(job_tx) = self.job_tx.as_ref().filter(|_| self.is_running()) else {
            return Err(AppError::WorkerStopped);
        };

        let id: JobId = self.sender.next_job_id();
        let kind: JobKind = job.kind();

        job_tx
            .send(QueuedJob { id, job })
            .map_err(|_| AppError::WorkerStopped)?;

        debug!(
            marker = "JOB_QUEUED",
            job_id = %id,
            kind = %kind,
            queued = job_tx.len(),
            "Job submitted"
        );

        Ok(id)
    }

    /// Sender sharing this queue's id counter, for jobs run on other threads.
    #[must_use]
    pub fn result_sender(&self) -> ResultSender {
        self.sender.clone()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Jobs waiting behind the one currently executing.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.job_tx.as_ref().map_or(0, Sender::len)
    }

    /// Stop the worker after its current job and wait for it to exit.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        self.job_tx = None;

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Worker thread terminated abnormally");
            }

            info!(marker = "WORKER_STOPPED", "Task queue stopped");
        }
    }
}

impl Drop for TaskQueue {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Run jobs until stopped. The stop flag is checked after every wakeup, so a
/// job received after `stop` is dropped instead of run. Returns how many
/// queued jobs were dropped.
fn worker_loop(
    job_rx: &Receiver<QueuedJob>,
    sender: &ResultSender,
    running: &AtomicBool,
    poll_interval: Duration,
) -> usize {
    let mut dropped: usize = 0;

    loop {
        let QueuedJob { id, job } = match job_rx.recv_timeout(poll_interval) {
            Ok(queued) => queued,

            Err(RecvTimeoutError::Timeout) if running.load(Ordering::Acquire) => continue,

            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => break,
        };

        if !running.load(Ordering::Acquire) {
            debug!(job_id = %id, "Job received after stop, not running it");
            dropped += 1;
            break;
        }

        let kind: JobKind = job.kind();
        let start_time: Instant = Instant::now();

        info!(
            marker = "JOB_STARTED",
            operation_type = %kind,
            job_id = %id,
            "Job started"
        );

        let outcome: AppResult<JobOutput> = run_guarded(id, || jobs::execute(job));
        let elapsed: Duration = start_time.elapsed();

        info!(
            marker = "JOB_FINISHED",
            operation_type = %kind,
            job_id = %id,
            ok = outcome.is_ok(),
            "Job finished in {:?}",
            elapsed
        );

        sender.send(TaskResult {
            job_id: id,
            kind,
            elapsed,
            outcome,
        });
    }

    dropped += job_rx.len();
    if dropped > 0 {
        warn!(dropped, "Worker stopped with queued jobs discarded");
    }

    dropped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::search_task::spawn_search;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const WAIT: Duration = Duration::from_secs(10);
    const POLL: Duration = Duration::from_millis(10);

    fn archive_job(dir: &TempDir, name: &str) -> Job {
        let source: PathBuf = dir.path().join(name);
        fs::write(&source, name).unwrap();

        Job::ArchiveCreate {
            sources: vec![source],
            dest: dir.path().join(format!("{name}.zip")),
        }
    }

    #[test]
    fn test_results_arrive_in_submission_order() {
        let dir = TempDir::new().unwrap();
        let (sender, receiver) = result_channel();
        let queue = TaskQueue::start(sender, POLL).unwrap();

        let ids: Vec<JobId> = (0..5)
            .map(|i| queue.submit(archive_job(&dir, &format!("f{i}"))).unwrap())
            .collect();

        let delivered: Vec<JobId> = (0..5)
            .map(|_| receiver.recv_timeout(WAIT).unwrap().job_id)
            .collect();

        assert_eq!(delivered, ids);
    }

    #[test]
    fn test_failed_job_still_delivers_one_result() {
        let dir = TempDir::new().unwrap();
        let (sender, receiver) = result_channel();
        let queue = TaskQueue::start(sender, POLL).unwrap();

        let id = queue
            .submit(Job::ArchiveExtract {
                archive: dir.path().join("missing.zip"),
                dest: dir.path().join("out"),
            })
            .unwrap();

        let result = receiver.recv_timeout(WAIT).unwrap();
        assert_eq!(result.job_id, id);
        assert_eq!(result.kind, JobKind::ArchiveExtract);
        assert!(matches!(result.outcome, Err(AppError::NotFound(_))));
        assert!(receiver.recv_timeout(Duration::from_millis(50)).is_none());
    }

    #[test]
    fn test_submit_after_stop_is_rejected() {
        let dir = TempDir::new().unwrap();
        let (sender, _receiver) = result_channel();
        let mut queue = TaskQueue::start(sender, POLL).unwrap();

        queue.stop();
        assert!(!queue.is_running());
        assert!(matches!(
            queue.submit(archive_job(&dir, "late")),
            Err(AppError::WorkerStopped)
        ));
    }

    #[test]
    fn test_job_received_after_stop_is_dropped() {
        let dir = TempDir::new().unwrap();
        let (sender, receiver) = result_channel();
        let (job_tx, job_rx) = unbounded::<QueuedJob>();
        let running = AtomicBool::new(false);

        for name in ["first", "second"] {
            job_tx
                .send(QueuedJob {
                    id: sender.next_job_id(),
                    job: archive_job(&dir, name),
                })
                .unwrap();
        }

        let dropped = worker_loop(&job_rx, &sender, &running, POLL);

        assert_eq!(dropped, 2);
        assert!(receiver.try_recv().is_none());
        assert!(!dir.path().join("first.zip").exists());
    }

    #[test]
    fn test_search_results_interleave_with_fifo_queue() {
        let dir = TempDir::new().unwrap();
        let (sender, receiver) = result_channel();
        let queue = TaskQueue::start(sender, POLL).unwrap();

        let mut submitted: Vec<JobId> = vec![queue.submit(archive_job(&dir, "a")).unwrap()];

        let search_sender = queue.result_sender();
        let search_id = search_sender.next_job_id();
        spawn_search(
            search_id,
            dir.path().to_path_buf(),
            "*".to_string(),
            100,
            search_sender,
        )
        .unwrap();

        for name in ["b", "c", "d"] {
            submitted.push(queue.submit(archive_job(&dir, name)).unwrap());
        }

        let delivered: Vec<TaskResult> = (0..5)
            .map(|_| receiver.recv_timeout(WAIT).unwrap())
            .collect();

        let searches: Vec<JobId> = delivered
            .iter()
            .filter(|r| r.kind == JobKind::Search)
            .map(|r| r.job_id)
            .collect();
        assert_eq!(searches, vec![search_id]);

        let queued_order: Vec<JobId> = delivered
            .iter()
            .filter(|r| r.kind != JobKind::Search)
            .map(|r| r.job_id)
            .collect();
        assert_eq!(queued_order, submitted);
    }

    #[test]
    fn test_panicking_body_becomes_error() {
        let (sender, _receiver) = result_channel();
        let id = sender.next_job_id();

        let outcome = run_guarded(id, || panic!("boom"));

        match outcome {
            Err(AppError::JobPanicked { job_id, message }) => {
                assert_eq!(job_id, id);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_ids_are_shared_across_clones() {
        let (sender, _receiver) = result_channel();
        let other = sender.clone();

        let a = sender.next_job_id();
        let b = other.next_job_id();
        let c = sender.next_job_id();

        assert!(a < b && b < c);
    }

    #[test]
    fn test_drain_returns_count_without_blocking() {
        let (sender, receiver) = result_channel();
        assert_eq!(receiver.drain(|_| {}), 0);

        for _ in 0..3 {
            sender.send(TaskResult {
                job_id: sender.next_job_id(),
                kind: JobKind::Paste,
                elapsed: Duration::ZERO,
                outcome: Err(AppError::WorkerStopped),
            });
        }

        let mut seen = Vec::new();
        assert_eq!(receiver.drain(|r| seen.push(r.job_id.get())), 3);
        assert_eq!(seen, vec![1, 2, 3]);
    }
}
