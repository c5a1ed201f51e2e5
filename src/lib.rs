//! Choreo – Scratch projects flown as synchronized drone shows
//!
//! This crate compiles Scratch 3 projects into multi-drone flight schedules:
//! - Each sprite is one drone; its green-flag script is interpreted into a
//!   list of timed actions (loops unrolled, custom blocks inlined)
//! - Sprite action lists are merged in lockstep into one time-stamped schedule
//!   bracketed by takeoff and landing
//! - The show runner replays the schedule over UDP against wall-clock time,
//!   with a global stop and a landing that always runs

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Compiler from sprite scripts to actions and schedules
pub mod compiler;
/// Configuration and its persistence
pub mod config;
/// Operator-facing log channel
pub mod log;
/// Scratch project model
pub mod project;
/// Drone transports and show execution
pub mod runtime;
/// The merged show timeline
pub mod schedule;

// Re-export key types for convenience
pub use compiler::{Compilation, ParseOutcome, ParseStatus, compile_project, parse_to_schedule};
pub use config::{ChoreoConfig, CompilerConfig, FleetConfig, RunnerConfig};
pub use log::{LogLevel, ShowLog, ShowMessage};
pub use project::Project;
pub use runtime::{Fleet, ShowReport, ShowRunner, Transport};
pub use schedule::{Event, EventKind, Schedule};

/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
