//! Error types for the pipe converter.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Errors that stop a conversion.
///
/// Bad rows never produce an error; they are skipped with a warning.
#[derive(Debug)]
pub enum PipeError {
    /// An input or output file could not be opened or written.
    Io { path: PathBuf, source: io::Error },
    /// The CSV header could not be read.
    Csv(csv::Error),
    /// Every row was skipped, so there is nothing to write.
    NoGeometry,
}

impl fmt::Display for PipeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
            Self::Csv(e) => write!(f, "invalid CSV: {e}"),
            Self::NoGeometry => write!(f, "no valid pipes or manholes to write"),
        }
    }
}

impl std::error::Error for PipeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Csv(e) => Some(e),
            Self::NoGeometry => None,
        }
    }
}

impl From<csv::Error> for PipeError {
    fn from(e: csv::Error) -> Self {
        Self::Csv(e)
    }
}
