//! Archive subsystem errors.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::archive::payload::PayloadError;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to read archive {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("record at offset {offset} could not be decoded: {message}")]
    Decode { offset: u64, message: String },

    #[error(transparent)]
    Payload(#[from] PayloadError),
}

impl ArchiveError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ArchiveError::Io {
            path: path.into(),
            source,
        }
    }
}
