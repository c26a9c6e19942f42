//! Error types for folio operations.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while building or committing a document.
///
/// Recoverable conditions (an undeclared table column, an untranslatable
/// graphic location) are reported through the `log` facade and never surface
/// here. What does surface is either a broken protocol contract with the
/// driving evaluator, which ends the run, or an I/O failure scoped to a
/// single output file.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("flow object protocol violation: {0}")]
    Protocol(String),
}

impl Error {
    /// Shorthand for a contract-violation error.
    pub(crate) fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
