//! Error kinds for the trimmer, mapped to the failure taxonomy rather than to
//! any single underlying type. Every variant wraps a [`std::io::Error`]
//! produced with the same `with_context`/`with_file_context` helpers the rest
//! of this tool family uses, so the message text stays consistent even though
//! the kind is now explicit.

use std::fmt::{self, Display};
use zoe::data::err::ErrorWithContext;

/// The five fatal-error kinds a run can end with. All are terminal: the
/// pipeline does not retry or attempt to flush a partial batch.
#[derive(Debug)]
pub enum TrimError {
    /// Incompatible input/output combination, invalid filter argument shape,
    /// or a parameter out of its valid range.
    Config(String),
    /// Failure to open any input or output file.
    IoOpen(ErrorWithContext),
    /// Truncated or malformed FASTQ, surfaced verbatim from the reader.
    IoRead(ErrorWithContext),
    /// A downstream write failed.
    IoWrite(ErrorWithContext),
    /// Thread-pool construction or another resource-allocation failure.
    Resource(String),
}

impl Display for TrimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrimError::Config(msg) => write!(f, "configuration error: {msg}"),
            TrimError::IoOpen(e) => write!(f, "failed to open file: {e}"),
            TrimError::IoRead(e) => write!(f, "failed to read FASTQ: {e}"),
            TrimError::IoWrite(e) => write!(f, "failed to write FASTQ: {e}"),
            TrimError::Resource(msg) => write!(f, "resource error: {msg}"),
        }
    }
}

impl std::error::Error for TrimError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TrimError::IoOpen(e) | TrimError::IoRead(e) | TrimError::IoWrite(e) => Some(e),
            TrimError::Config(_) | TrimError::Resource(_) => None,
        }
    }
}

impl TrimError {
    /// The process exit code to use for this error kind. Non-zero throughout,
    /// per the exit-code contract in the external-interfaces section: any
    /// failure is a non-zero exit, but distinct kinds get distinct codes so
    /// scripts invoking this tool can distinguish configuration mistakes from
    /// transient I/O failures.
    pub fn exit_code(&self) -> u8 {
        match self {
            TrimError::Config(_) => 2,
            TrimError::IoOpen(_) => 3,
            TrimError::IoRead(_) => 4,
            TrimError::IoWrite(_) => 5,
            TrimError::Resource(_) => 6,
        }
    }
}

/// Convenience alias used throughout the pipeline.
pub type TrimResult<T> = Result<T, TrimError>;
