//! Error taxonomy for the codegen pipeline.
//!
//! Per the design, most internal inconsistencies are bugs, not recoverable
//! errors: a malformed PHI, an out-of-range prototype slot or an exhausted
//! arena aborts the process via `panic!`/`debug_assert!` rather than
//! threading a `Result` through every call in the lowering hot path. The
//! only fallible surface a caller actually observes is `compile_function`
//! falling back from the complex path to the fast path, and I/O around
//! debug-info file hashing.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can be returned from the public module/compile surface.
///
/// Anything *not* representable here (bad IR, allocator exhaustion, arena
/// overflow) is a [`PreconditionViolation`](CodegenError::precondition) or
/// [`ResourceExhaustion`](CodegenError::resource) turned into a panic at the
/// point of detection; see `fatal` below.
#[derive(Debug, Error)]
pub enum CodegenError {
    /// The requested instruction-selection mode isn't implemented for this
    /// target; the caller should retry with `IselMode::Fast`.
    #[error("isel mode {mode:?} unimplemented for {isa}, falling back to fast path")]
    UnimplementedPath {
        /// The mode that could not be honored.
        mode: &'static str,
        /// Target identifier, for the log line.
        isa: &'static str,
    },

    /// Failed to read a source file while building the checksum table for
    /// debug info.
    #[error("failed to read {path:?} for debug info: {source}")]
    Io {
        /// File that could not be opened/read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// A precondition violation: the caller misused the builder API. These are
/// bugs in the caller, not recoverable runtime conditions, so the
/// constructors below panic immediately with a diagnostic instead of
/// returning a `Result` that every call site would have to thread through.
#[derive(Debug)]
pub struct PreconditionViolation(String);

impl fmt::Display for PreconditionViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "precondition violation: {}", self.0)
    }
}

/// Abort with a precondition-violation diagnostic. Used for builder misuse:
/// reserving past `MAX_FUNCTIONS`, overflowing a prototype's declared
/// parameter count, attaching a null name, malformed PHI arity, and so on.
#[cold]
#[track_caller]
pub fn fatal_precondition(msg: impl Into<String>) -> ! {
    panic!("{}", PreconditionViolation(msg.into()));
}

/// Abort with a resource-exhaustion diagnostic: code-region, arena,
/// prototype-pool or function-table overflow. Out-of-memory is always
/// fatal per the design; there is no recovery path.
#[cold]
#[track_caller]
pub fn fatal_resource(msg: impl Into<String>) -> ! {
    panic!("resource exhaustion: {}", msg.into());
}
