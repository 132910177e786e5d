pub mod collect;
pub mod config;
pub mod destination;
pub mod error;
pub mod localize;
pub mod naming;
pub mod progress;
pub mod report;
pub mod task;
pub mod writer;

pub use config::ArchiveConfig;
pub use error::{ArchiveError, Result};
pub use task::{ArchiveTask, TaskEvent, TaskHandle, TaskOutcome, TaskState};
