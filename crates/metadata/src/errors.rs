//! Error types for the metadata domain.
//!
//! The errors are layered the way a call fails:
//!
//! - [`BuildError`]: verb arguments rejected before any call is built.
//! - [`TransportError`]: produced by a [`crate::MetadataTransport`]
//!   implementation when an invocation fails.
//! - [`JobFailure`]: the cause captured by a [`crate::Job`] that reached the
//!   `Failed` state. Always carries the original cause unmodified.
//! - [`JobError`]: returned by job operations; either a lifecycle misuse
//!   (`InvalidState`, `NotReady`) or the captured [`JobFailure`].
//!
//! Nothing in this crate retries. Every failure ends in a terminal job state.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Operation;

// ---------------------------------------------------------------------------
// Build errors
// ---------------------------------------------------------------------------

/// Verb arguments that cannot be turned into a call descriptor.
///
/// The request builder itself never fails, and malformed type names are
/// reported by the remote service. The only local check is that a type name
/// is not empty once canonicalized.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum BuildError {
    /// The metadata type identifier is empty or made only of underscores.
    #[error("Invalid metadata type identifier: {value:?}")]
    InvalidMetadataType {
        /// The rejected input, verbatim.
        value: String,
    },
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

/// Failure reported by the transport collaborator for a single invocation.
///
/// Implementations map their own error types into these variants at the
/// boundary so the job can capture and clone the cause.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum TransportError {
    /// The request could not be delivered or the reply could not be received.
    #[error("Network failure: {message}")]
    Network {
        /// Description from the underlying client.
        message: String,
    },

    /// The descriptor could not be serialised into a wire request.
    #[error("Encoding failure: {message}")]
    Encoding {
        /// Description of the serialisation problem.
        message: String,
    },

    /// The remote service executed the call and rejected it (validation
    /// failure, permission error, unknown type, ...).
    #[error("Remote application error [{fault_code}]: {message}")]
    RemoteApplication {
        /// Fault code as reported by the remote service.
        fault_code: String,
        /// Fault message as reported by the remote service.
        message: String,
    },

    /// A reply arrived but could not be interpreted.
    #[error("Unreadable response: {message}")]
    Protocol {
        /// Description of what was unexpected.
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Job errors
// ---------------------------------------------------------------------------

/// Cause captured by a job in the `Failed` state.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum JobFailure {
    /// The transport invocation failed. Carried verbatim.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Status polling reported that the remote operation finished in error.
    #[error("Remote operation failed [{status_code}]: {message}")]
    RemoteApplication {
        /// Status code reported with the failed operation.
        status_code: String,
        /// Message reported with the failed operation.
        message: String,
    },

    /// The response did not match the shape the execution mode requires
    /// (e.g. an async acceptance without an identifier).
    #[error("Protocol mismatch in {operation}: {detail}")]
    ProtocolMismatch {
        /// Operation whose response was malformed.
        operation: Operation,
        /// What was missing or unexpected.
        detail: String,
    },
}

/// Errors returned by [`crate::Job`] operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    /// The operation is not permitted in the job's current state.
    #[error("Cannot {operation} a job in state {state}")]
    InvalidState {
        /// The rejected job operation (`"execute"`, `"poll"`).
        operation: &'static str,
        /// Name of the state the job was in.
        state: &'static str,
    },

    /// A result was requested before the job reached a terminal state.
    #[error("Job result is not ready (state {state})")]
    NotReady {
        /// Name of the state the job was in.
        state: &'static str,
    },

    /// The job reached the `Failed` state; carries the captured cause.
    #[error("Job failed: {0}")]
    OperationFailed(JobFailure),
}

impl JobError {
    /// Returns the captured failure when this error reports a failed job.
    pub fn failure(&self) -> Option<&JobFailure> {
        match self {
            JobError::OperationFailed(failure) => Some(failure),
            _ => None,
        }
    }
}
