use std::fs::{File, Metadata};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::ops::ControlFlow;
use std::path::Path;
use std::time::SystemTime;

use chrono::{Datelike, Local, Timelike};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{ArchiveError, Result};
use crate::naming::ArchiveEntry;

pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;
pub const MIN_BUFFER_SIZE: usize = 4 * 1024;
pub const MAX_BUFFER_SIZE: usize = 1 << 20;

const CENTRAL_DIRECTORY: &str = "central directory";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WriteOutcome {
    pub entries_written: usize,
    pub bytes_read: u64,
    /// Size of the finished archive stream.
    pub archive_bytes: u64,
    /// The entry callback asked to stop before every entry was written.
    pub stopped: bool,
}

/// Streams files into a Deflate-compressed ZIP, one entry per file.
#[derive(Clone, Copy, Debug)]
pub struct ArchiveWriter {
    buffer_size: usize,
}

impl Default for ArchiveWriter {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE)
    }
}

impl ArchiveWriter {
    pub fn new(buffer_size: usize) -> Self {
        Self { buffer_size: buffer_size.clamp(MIN_BUFFER_SIZE, MAX_BUFFER_SIZE) }
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Create `destination` (truncating any existing file) and write `entries`
    /// into it. The file is synced before returning. On error the partial
    /// archive is left on disk.
    pub fn write_to_path<F>(
        &self,
        entries: &[ArchiveEntry],
        destination: &Path,
        on_entry_done: F,
    ) -> Result<WriteOutcome>
    where
        F: FnMut(usize) -> ControlFlow<()>,
    {
        let file = File::create(destination).map_err(|source| {
            ArchiveError::DestinationUnwritable { path: destination.to_path_buf(), source }
        })?;
        let (out, outcome) = self.write(entries, BufWriter::new(file), on_entry_done)?;
        let file = out.into_inner().map_err(|e| ArchiveError::WriteFailed {
            entry: CENTRAL_DIRECTORY.to_string(),
            source: e.into_error(),
        })?;
        file.sync_all().map_err(|source| ArchiveError::WriteFailed {
            entry: CENTRAL_DIRECTORY.to_string(),
            source,
        })?;
        Ok(outcome)
    }

    /// Write `entries` in order into `sink` and return it once the archive
    /// is finished. `on_entry_done` gets the 1-based count of entries written
    /// so far; returning `Break` finishes the archive early.
    ///
    /// The first failure aborts the run. Source files are closed as soon as
    /// their entry is done, and the ZIP stream is dropped on every path.
    pub fn write<W, F>(
        &self,
        entries: &[ArchiveEntry],
        sink: W,
        mut on_entry_done: F,
    ) -> Result<(W, WriteOutcome)>
    where
        W: Write + Seek,
        F: FnMut(usize) -> ControlFlow<()>,
    {
        let mut zip = ZipWriter::new(sink);
        let mut buf = vec![0u8; self.buffer_size];
        let mut outcome = WriteOutcome::default();

        for (idx, entry) in entries.iter().enumerate() {
            let copied = copy_entry(&mut zip, entry, &mut buf)?;
            outcome.entries_written += 1;
            outcome.bytes_read += copied;
            debug!(entry = %entry.name, bytes = copied, "entry written");
            if on_entry_done(idx + 1).is_break() {
                outcome.stopped = outcome.entries_written < entries.len();
                break;
            }
        }

        let mut out = zip.finish().map_err(|source| ArchiveError::Zip {
            entry: CENTRAL_DIRECTORY.to_string(),
            source,
        })?;
        out.flush().map_err(|source| ArchiveError::WriteFailed {
            entry: CENTRAL_DIRECTORY.to_string(),
            source,
        })?;
        outcome.archive_bytes = out.seek(SeekFrom::End(0)).map_err(|source| {
            ArchiveError::WriteFailed { entry: CENTRAL_DIRECTORY.to_string(), source }
        })?;
        Ok((out, outcome))
    }
}

fn copy_entry<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    entry: &ArchiveEntry,
    buf: &mut [u8],
) -> Result<u64> {
    let unreadable =
        |source: io::Error| ArchiveError::SourceUnreadable { path: entry.source.clone(), source };
    let mut src = File::open(&entry.source).map_err(unreadable)?;
    let meta = src.metadata().map_err(unreadable)?;

    zip.start_file(entry.name.as_str(), entry_options(&meta))
        .map_err(|source| ArchiveError::Zip { entry: entry.name.clone(), source })?;

    let mut copied = 0u64;
    loop {
        let n = match src.read(buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(unreadable(e)),
        };
        zip.write_all(&buf[..n])
            .map_err(|source| ArchiveError::WriteFailed { entry: entry.name.clone(), source })?;
        copied += n as u64;
    }
    Ok(copied)
}

fn entry_options(meta: &Metadata) -> SimpleFileOptions {
    let mut options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(meta.len() >= u32::MAX as u64);
    if let Some(ts) = meta.modified().ok().and_then(zip_timestamp) {
        options = options.last_modified_time(ts);
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        options = options.unix_permissions(meta.permissions().mode());
    }
    options
}

/// ZIP stores local wall-clock time with two-second resolution from 1980 on.
fn zip_timestamp(t: SystemTime) -> Option<zip::DateTime> {
    let local: chrono::DateTime<Local> = t.into();
    zip::DateTime::from_date_and_time(
        u16::try_from(local.year()).ok()?,
        local.month() as u8,
        local.day() as u8,
        local.hour() as u8,
        local.minute() as u8,
        local.second() as u8,
    )
    .ok()
}
