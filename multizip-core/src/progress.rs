use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

/// `floor(completed / total * 100)`, clamped to 100. Zero when `total` is zero.
pub fn percentage(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let done = completed.min(total) as u128;
    (done * 100 / total as u128) as u8
}

/// Receives one percentage per completed entry. Implementations may be
/// called from the worker thread.
pub trait ProgressSink {
    fn report(&mut self, percent: u8);
}

impl<F: FnMut(u8)> ProgressSink for F {
    fn report(&mut self, percent: u8) {
        self(percent)
    }
}

/// Completed/total counters of a running task, readable from any thread.
#[derive(Clone, Default)]
pub struct Progress {
    completed: Arc<AtomicUsize>,
    total: Arc<AtomicUsize>,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fix the total for this run and reset the completed count.
    pub fn set_total(&self, n: usize) {
        self.total.store(n, Ordering::Relaxed);
        self.completed.store(0, Ordering::Relaxed);
    }

    /// Count one more finished entry and return the new percentage.
    /// The completed count never passes the total.
    pub fn record_entry(&self) -> u8 {
        let total = self.total();
        let done = self
            .completed
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| Some((c + 1).min(total)))
            .map_or(total, |prev| (prev + 1).min(total));
        percentage(done, total)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::Relaxed)
    }

    pub fn percent(&self) -> u8 {
        percentage(self.completed(), self.total())
    }
}
