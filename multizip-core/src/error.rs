use std::io;
use std::path::PathBuf;

use thiserror::Error;
use zip::result::ZipError;

#[derive(Error, Debug)]
pub enum ArchiveError {
    /// A source file or directory could not be read, either during
    /// collection (strict mode) or when its bytes were being copied.
    #[error("cannot read {}: {source}", .path.display())]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The destination archive or its parent directory could not be created.
    #[error("cannot create {}: {source}", .path.display())]
    DestinationUnwritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Writing into the archive stream failed part way through.
    #[error("write failed at {entry}: {source}")]
    WriteFailed {
        entry: String,
        #[source]
        source: io::Error,
    },

    #[error("zip error at {entry}: {source}")]
    Zip {
        entry: String,
        #[source]
        source: ZipError,
    },

    #[error("archive task was cancelled")]
    Cancelled,

    #[error("archive worker stopped without reporting a result")]
    WorkerLost,
}

pub type Result<T> = std::result::Result<T, ArchiveError>;
