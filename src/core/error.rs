// This module defines the error type for the bfjit compiler using the thiserror crate.
// JitError covers every failure the compile/execute entry points can surface: encoding
// errors (unrecognized source characters), structural errors (unbalanced loop brackets,
// labels left unresolved), resolver range violations, resource errors from the executable
// memory manager (each carrying the OS error that caused it), lifecycle misuse of an
// executable region, empty tapes, and host/platform mismatches. JitResult<T> is the convenience alias
// used throughout the crate.

//! Error types for the bfjit compiler.

use std::io;
use thiserror::Error;

use crate::runtime::exec_mem::RegionState;

/// Main error type for translation and execution.
#[derive(Error, Debug)]
pub enum JitError {
    #[error("unrecognized character {ch:?} at position {position}")]
    UnrecognizedChar { ch: char, position: usize },

    #[error("unmatched ']' at position {position}")]
    UnmatchedClose { position: usize },

    #[error("unmatched '[' at position {position} ({open_count} loop(s) left open)")]
    UnmatchedOpen { position: usize, open_count: usize },

    #[error("branch displacement from {from:#x} to {to:#x} does not fit in 32 bits")]
    OffsetOutOfRange { from: usize, to: usize },

    #[error("{count} label(s) referenced but never bound")]
    UnresolvedLabels { count: usize },

    #[error("unable to allocate writable memory: {0}")]
    MapFailed(#[source] io::Error),

    #[error("unable to mark memory as executable: {0}")]
    ProtectFailed(#[source] io::Error),

    #[error("unable to unmap memory: {0}")]
    UnmapFailed(#[source] io::Error),

    #[error("executable region is {actual:?}, expected {expected:?}")]
    InvalidRegionState {
        expected: RegionState,
        actual: RegionState,
    },

    #[error("program was compiled against a different tape")]
    TapeMismatch,

    #[error("native execution requires an x86-64 unix host")]
    UnsupportedHost,

    #[error("tape must have at least one cell")]
    EmptyTape,

    #[error("cursor moved outside the tape at position {position}")]
    CursorOutOfBounds { position: usize },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("object emission failed: {0}")]
    Object(#[from] object::write::Error),
}

impl JitError {
    /// Structural errors are always fatal to translation, independent of policy.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            JitError::UnmatchedClose { .. }
                | JitError::UnmatchedOpen { .. }
                | JitError::UnresolvedLabels { .. }
        )
    }
}

/// Result type alias for bfjit operations.
pub type JitResult<T> = Result<T, JitError>;
