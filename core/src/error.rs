//! Boundary error type for the flightviz pipeline.
//!
//! Only wholly unreadable input ends up here: a file that cannot be opened, a CSV stream that
//! cannot be tokenized, or a configuration file in an unknown format. Malformed values inside an
//! otherwise well-formed CSV never produce an error; they are either dropped (missing columns) or
//! carried through as NaN.
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised at the edges of the pipeline (file and configuration I/O).
#[derive(Debug, Error)]
pub enum FlightError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("unreadable csv input: {0}")]
    Csv(#[from] csv::Error),

    #[error("csv input has no header row")]
    MissingHeader,

    #[error("unsupported configuration format for '{}' (expected .json, .yaml, .yml or .toml)", .0.display())]
    UnsupportedConfigFormat(PathBuf),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to serialize output: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FlightError>;
