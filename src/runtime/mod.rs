//! Show runtime
//!
//! Everything that touches real time and real drones: the [`Transport`] seam,
//! the UDP implementation for Tello drones, and the [`ShowRunner`] that
//! replays a compiled schedule.

/// Error types.
pub mod error;
/// Schedule replay.
pub mod runner;
/// Tello UDP transport and telemetry.
pub mod tello;
/// Transport trait, fleet, and the in-memory transport.
pub mod transport;

pub use error::{RunnerError, RunnerResult, TransportError, TransportResult};
pub use runner::{PREFLIGHT_COMMANDS, ShowReport, ShowRunner};
pub use tello::{TelloState, TelloTransport, Telemetry, connect_fleet};
pub use transport::{Fleet, SentCommand, SimulatedTransport, Transport, evaluate_response};
