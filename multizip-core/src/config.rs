use crate::collect::WalkPolicy;
use crate::writer::DEFAULT_BUFFER_SIZE;

/// Settings for one archive run, filled from command-line flags.
#[derive(Clone, Copy, Debug)]
pub struct ArchiveConfig {
    pub walk: WalkPolicy,
    /// Copy buffer in bytes; clamped by the writer to 4 KiB..=1 MiB.
    pub buffer_size: usize,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self { walk: WalkPolicy::default(), buffer_size: DEFAULT_BUFFER_SIZE }
    }
}
