//! Error types for the show runtime
//!
//! Dispatch failures during a show are logged and the show goes on; these
//! errors surface only from the connection handshake and from individual
//! transport calls.

use std::io;
use thiserror::Error;

/// Failure of a single command exchange with one drone
#[derive(Debug, Error)]
pub enum TransportError {
    /// Socket error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// No response arrived in time
    #[error("Command '{command}' timed out")]
    Timeout {
        /// Command that was sent
        command: String,
    },

    /// The transport was closed or the show was cancelled mid-wait
    #[error("Command '{0}' cancelled")]
    Cancelled(String),

    /// The drone answered with something other than `ok`
    #[error("Command '{command}' rejected: {response}")]
    Rejected {
        /// Command that was sent
        command: String,
        /// Raw response text
        response: String,
    },
}

/// Failure of the show as a whole
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The schedule addresses no configured drone
    #[error("No active drones in the schedule")]
    NoActiveDrones,

    /// Some drones did not answer the handshake
    #[error("Connection failed for: {}", .0.join(", "))]
    ConnectionFailed(Vec<String>),

    /// Transport-level failure outside the show loop
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Convenience result alias for transport calls
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Convenience result alias for runner operations
pub type RunnerResult<T> = std::result::Result<T, RunnerError>;
