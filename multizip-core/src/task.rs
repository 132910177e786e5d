use std::fs;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use tracing::{info, warn};

use crate::collect::collect;
use crate::config::ArchiveConfig;
use crate::destination::{exclude_destination, normalize_destination, prepare_destination};
use crate::error::{ArchiveError, Result};
use crate::localize::Localize;
use crate::naming::EntryNamer;
use crate::progress::{Progress, ProgressSink};
use crate::report::ArchiveReport;
use crate::writer::ArchiveWriter;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    Idle,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

#[derive(Debug)]
pub enum TaskOutcome {
    Succeeded(ArchiveReport),
    Failed(ArchiveError),
    Cancelled { completed: usize, total: usize },
}

impl TaskOutcome {
    pub fn state(&self) -> TaskState {
        match self {
            TaskOutcome::Succeeded(_) => TaskState::Succeeded,
            TaskOutcome::Failed(_) => TaskState::Failed,
            TaskOutcome::Cancelled { .. } => TaskState::Cancelled,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Succeeded(_))
    }

    /// The single human-readable completion message for the caller.
    pub fn message(&self, loc: &impl Localize) -> String {
        match self {
            TaskOutcome::Succeeded(report) => {
                let code = if report.entries == 0 { "archive-empty" } else { "archive-created" };
                loc.msg(code, &[("path", report.destination.as_str())])
            }
            TaskOutcome::Failed(err) => {
                let reason = err.to_string();
                loc.msg("archive-failed", &[("reason", reason.as_str())])
            }
            TaskOutcome::Cancelled { completed, total } => {
                let (completed, total) = (completed.to_string(), total.to_string());
                loc.msg(
                    "archive-cancelled",
                    &[("completed", completed.as_str()), ("total", total.as_str())],
                )
            }
        }
    }
}

#[derive(Debug)]
pub enum TaskEvent {
    /// Percentage after one more entry was written.
    Progress(u8),
    /// Sent exactly once, last.
    Finished(TaskOutcome),
}

impl ProgressSink for Sender<TaskEvent> {
    fn report(&mut self, percent: u8) {
        // The receiver may already be gone; the run still completes.
        let _ = self.send(TaskEvent::Progress(percent));
    }
}

/// One archive run: a fixed selection written to one destination.
pub struct ArchiveTask {
    selection: Vec<PathBuf>,
    destination: PathBuf,
    config: ArchiveConfig,
    progress: Progress,
}

impl ArchiveTask {
    /// The destination gets `.zip` appended when it lacks the extension.
    pub fn new(
        selection: Vec<PathBuf>,
        destination: impl AsRef<Path>,
        config: ArchiveConfig,
    ) -> Self {
        Self {
            selection,
            destination: normalize_destination(destination.as_ref()),
            config,
            progress: Progress::new(),
        }
    }

    pub fn selection(&self) -> &[PathBuf] {
        &self.selection
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    /// A task that has not been started yet is always idle; once started
    /// its state lives on the [`TaskHandle`].
    pub fn state(&self) -> TaskState {
        TaskState::Idle
    }

    /// Run on the current thread. `cancel` is checked between entries.
    pub fn run<S: ProgressSink + ?Sized>(&self, sink: &mut S, cancel: &AtomicBool) -> TaskOutcome {
        info!(
            roots = self.selection.len(),
            destination = %self.destination.display(),
            "archive task started"
        );
        let outcome = match self.build(sink, cancel) {
            Ok(report) => TaskOutcome::Succeeded(report),
            Err(ArchiveError::Cancelled) => TaskOutcome::Cancelled {
                completed: self.progress.completed(),
                total: self.progress.total(),
            },
            Err(err) => TaskOutcome::Failed(err),
        };
        match &outcome {
            TaskOutcome::Succeeded(r) => info!(
                entries = r.entries,
                bytes = r.bytes_in,
                elapsed_ms = r.elapsed_ms,
                "archive written"
            ),
            TaskOutcome::Failed(err) => warn!(error = %err, "archive task failed"),
            TaskOutcome::Cancelled { completed, total } => {
                info!(completed, total, "archive task cancelled")
            }
        }
        outcome
    }

    fn build<S: ProgressSink + ?Sized>(
        &self,
        sink: &mut S,
        cancel: &AtomicBool,
    ) -> Result<ArchiveReport> {
        let t0 = Instant::now();
        let mut files = collect(&self.selection, self.config.walk)?;
        exclude_destination(&mut files, &self.destination);
        let total = files.len();
        self.progress.set_total(total);
        let entries = EntryNamer::new(&self.selection).plan(&files)?;
        drop(files);

        if cancel.load(Ordering::Relaxed) {
            return Err(ArchiveError::Cancelled);
        }
        prepare_destination(&self.destination)?;

        let writer = ArchiveWriter::new(self.config.buffer_size);
        let written = writer.write_to_path(&entries, &self.destination, |done| {
            sink.report(self.progress.record_entry());
            if done < total && cancel.load(Ordering::Relaxed) {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })?;

        if written.stopped {
            if let Err(e) = fs::remove_file(&self.destination) {
                warn!(
                    path = %self.destination.display(),
                    error = %e,
                    "could not remove partial archive"
                );
            }
            return Err(ArchiveError::Cancelled);
        }
        Ok(ArchiveReport::new(&self.destination, self.selection.len(), &written, t0.elapsed()))
    }

    /// Move the task onto a worker thread. Progress and the final outcome
    /// arrive through the returned handle.
    pub fn start(self) -> TaskHandle {
        let (tx, rx) = mpsc::channel();
        let cancel = Arc::new(AtomicBool::new(false));
        let state = Arc::new(Mutex::new(TaskState::Running));
        let progress = self.progress.clone();
        let destination = self.destination.clone();

        let worker = {
            let cancel = Arc::clone(&cancel);
            let state = Arc::clone(&state);
            thread::spawn(move || {
                let mut sink = tx.clone();
                let outcome = self.run(&mut sink, &cancel);
                set_state(&state, outcome.state());
                let _ = tx.send(TaskEvent::Finished(outcome));
            })
        };

        TaskHandle { events: rx, cancel, state, progress, destination, worker: Some(worker) }
    }
}

fn set_state(state: &Mutex<TaskState>, next: TaskState) {
    let mut guard = state.lock().unwrap_or_else(|e| e.into_inner());
    *guard = next;
}

/// Caller-side view of a running [`ArchiveTask`].
pub struct TaskHandle {
    events: Receiver<TaskEvent>,
    cancel: Arc<AtomicBool>,
    state: Arc<Mutex<TaskState>>,
    progress: Progress,
    destination: PathBuf,
    worker: Option<JoinHandle<()>>,
}

impl TaskHandle {
    /// Ask the worker to stop before the next entry.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn state(&self) -> TaskState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Raw event stream, for callers polling with `try_recv` from an event loop.
    pub fn events(&self) -> &Receiver<TaskEvent> {
        &self.events
    }

    /// Block until the task ends, feeding every percentage to `on_progress`.
    pub fn wait<F: FnMut(u8)>(mut self, mut on_progress: F) -> TaskOutcome {
        let outcome = loop {
            match self.events.recv() {
                Ok(TaskEvent::Progress(p)) => on_progress(p),
                Ok(TaskEvent::Finished(outcome)) => break outcome,
                // Sender dropped without a Finished event: the worker panicked.
                Err(_) => {
                    set_state(&self.state, TaskState::Failed);
                    break TaskOutcome::Failed(ArchiveError::WorkerLost);
                }
            }
        };
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        outcome
    }

    /// Like [`wait`](Self::wait), then run `cleanup` whatever the outcome.
    pub fn wait_with_cleanup<F, C>(self, on_progress: F, cleanup: C) -> TaskOutcome
    where
        F: FnMut(u8),
        C: FnOnce(&TaskOutcome),
    {
        let outcome = self.wait(on_progress);
        cleanup(&outcome);
        outcome
    }

    pub fn join(self) -> TaskOutcome {
        self.wait(|_| {})
    }
}
