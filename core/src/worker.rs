//! Background row processing.
//!
//! The per-row stage can be moved off the calling thread: [`spawn_worker`] takes its own copy of
//! the rows, parses them in parallel chunks and reports over a crossbeam channel. Every message is
//! tagged with the load generation it belongs to, so a result arriving after a newer load started
//! is recognized as stale and dropped by [`await_worker`].
//!
//! The worker is an optimization only. Timeout, failure or a lost channel are reported as a
//! [`ProcessingNotice`] and the caller processes the same rows synchronously, which yields the
//! same [`SampleSeries`].
use std::fmt;
use std::io;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender};
use log::{debug, warn};
use serde::Serialize;

use crate::pipeline::process_rows_parallel;
use crate::records::{RawRow, SampleSeries};

/// Advisory progress of one load.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Progress {
    /// Completion in percent, 0 to 100
    pub percent: f64,
    pub message: String,
}

impl Progress {
    pub fn new(percent: f64, message: impl Into<String>) -> Self {
        Progress {
            percent,
            message: message.into(),
        }
    }
}

/// Keeps the reported progress of one load from ever going backwards.
#[derive(Clone, Debug, Default)]
pub struct ProgressTracker {
    last: f64,
}

impl ProgressTracker {
    pub fn new() -> Self {
        ProgressTracker::default()
    }
    /// Clamp `progress` to at least the last reported value.
    pub fn advance(&mut self, progress: Progress) -> Progress {
        let percent = if progress.percent.is_finite() {
            progress.percent.clamp(self.last, 100.0)
        } else {
            self.last
        };
        self.last = percent;
        Progress {
            percent,
            message: progress.message,
        }
    }
    pub fn last(&self) -> f64 {
        self.last
    }
}

/// Messages sent from a worker to the session.
#[derive(Debug)]
pub enum WorkerMessage {
    Progress {
        generation: u64,
        progress: Progress,
    },
    Complete {
        generation: u64,
        series: SampleSeries,
    },
    Failed {
        generation: u64,
        reason: String,
    },
}

impl WorkerMessage {
    pub fn generation(&self) -> u64 {
        match self {
            WorkerMessage::Progress { generation, .. }
            | WorkerMessage::Complete { generation, .. }
            | WorkerMessage::Failed { generation, .. } => *generation,
        }
    }
}

/// Why the worker result was not used.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum NoticeKind {
    TimedOut,
    Failed(String),
    Disconnected,
    Unavailable(String),
}

/// Non-fatal report that a load fell back to synchronous processing. Retrying is always safe.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProcessingNotice {
    pub generation: u64,
    pub kind: NoticeKind,
}

impl ProcessingNotice {
    pub fn retryable(&self) -> bool {
        true
    }
}

impl fmt::Display for ProcessingNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            NoticeKind::TimedOut => write!(f, "background processing timed out"),
            NoticeKind::Failed(reason) => write!(f, "background processing failed: {reason}"),
            NoticeKind::Disconnected => write!(f, "background worker stopped without a result"),
            NoticeKind::Unavailable(reason) => {
                write!(f, "background worker could not be started: {reason}")
            }
        }?;
        write!(f, "; processed synchronously instead")
    }
}

/// How waiting on a worker ended.
#[derive(Debug)]
pub enum WorkerOutcome {
    Complete(SampleSeries),
    Failed(String),
    TimedOut,
    Disconnected,
}

/// Start a worker thread parsing `rows` in `chunk_size` chunks.
///
/// Progress goes out at 10% (start), 20-90% (per chunk) and 95% (merge), then the result.
pub fn spawn_worker(
    generation: u64,
    rows: Vec<RawRow>,
    chunk_size: usize,
    sender: Sender<WorkerMessage>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("flightviz-worker-{generation}"))
        .spawn(move || {
            let progress = |percent: f64, message: String| {
                let _ = sender.send(WorkerMessage::Progress {
                    generation,
                    progress: Progress::new(percent, message),
                });
            };
            progress(10.0, format!("Processing {} rows", rows.len()));
            let result = catch_unwind(AssertUnwindSafe(|| {
                process_rows_parallel(&rows, chunk_size, |done, total| {
                    let fraction = done as f64 / total.max(1) as f64;
                    progress(
                        20.0 + 70.0 * fraction,
                        format!("Processed chunk {done} of {total}"),
                    );
                })
            }));
            let message = match result {
                Ok(series) => {
                    progress(95.0, "Finalizing".to_string());
                    WorkerMessage::Complete { generation, series }
                }
                Err(panic) => WorkerMessage::Failed {
                    generation,
                    reason: panic_reason(panic.as_ref()),
                },
            };
            let _ = sender.send(message);
        })
}

fn panic_reason(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}

/// Wait up to `timeout` for the result of load `generation`.
///
/// A `timeout` that does not fit an [`Instant`] means waiting until the worker answers or hangs up.
/// Messages of other generations are dropped. Progress is passed through `tracker` before
/// reaching `on_progress`.
pub fn await_worker<F>(
    receiver: &Receiver<WorkerMessage>,
    generation: u64,
    timeout: Duration,
    tracker: &mut ProgressTracker,
    mut on_progress: F,
) -> WorkerOutcome
where
    F: FnMut(&Progress),
{
    // a timeout too large for an Instant waits without a deadline
    let deadline = Instant::now().checked_add(timeout);
    loop {
        let received = match deadline {
            Some(deadline) => {
                receiver.recv_timeout(deadline.saturating_duration_since(Instant::now()))
            }
            None => receiver.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        let message = match received {
            Ok(message) => message,
            Err(RecvTimeoutError::Timeout) => {
                warn!("worker for load {generation} timed out after {timeout:?}");
                return WorkerOutcome::TimedOut;
            }
            Err(RecvTimeoutError::Disconnected) => return WorkerOutcome::Disconnected,
        };
        if message.generation() != generation {
            debug!(
                "dropping stale worker message of load {} (current {generation})",
                message.generation()
            );
            continue;
        }
        match message {
            WorkerMessage::Progress { progress, .. } => on_progress(&tracker.advance(progress)),
            WorkerMessage::Complete { series, .. } => return WorkerOutcome::Complete(series),
            WorkerMessage::Failed { reason, .. } => {
                warn!("worker for load {generation} failed: {reason}");
                return WorkerOutcome::Failed(reason);
            }
        }
    }
}
