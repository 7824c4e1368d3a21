use std::{io, path::PathBuf, time::Duration};

use thiserror::Error;

use crate::frequency::FrequencyTable;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("input document not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("failed to read input document {}", path.display())]
    InputRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unsupported input scheme `{0}`")]
    UnsupportedScheme(String),

    #[error("failed to fetch {uri} from object storage")]
    ObjectStore {
        uri: String,
        #[source]
        source: object_store::Error,
    },

    /// Raised only under [`FailurePolicy::Abort`](crate::config::FailurePolicy).
    /// `partial` holds the units completed before the run was aborted.
    #[error("name oracle failed on text unit {unit}")]
    OracleFailure {
        unit: usize,
        #[source]
        source: OracleError,
        partial: Box<FrequencyTable>,
    },

    #[error("failed to write output {}", path.display())]
    OutputWriteFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("worker pool failure: {0}")]
    Worker(String),
}

/// Failure of the tagging capability on a single text unit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    #[error("tagger failed: {0}")]
    Failed(String),

    #[error("tagging timed out after {0:?}")]
    TimedOut(Duration),

    #[error("tagger panicked: {0}")]
    Panicked(String),
}
