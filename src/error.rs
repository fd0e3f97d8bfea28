use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading a board from its text representation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseBoardError {
    #[error("board has no bottles")]
    Empty,
    #[error("unknown color `{0}`")]
    UnknownColor(String),
    #[error("bottle {index} holds {len} segments but capacity is {capacity}")]
    Overfull {
        index: usize,
        len: usize,
        capacity: usize,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed configuration: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
