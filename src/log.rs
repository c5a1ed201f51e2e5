//! Operator-facing log channel
//!
//! The compiler and the show runner report progress through a [`ShowLog`]
//! handle. Every record is mirrored to `tracing`; when a presentation layer is
//! attached, records are also pushed onto an unbounded channel so the producer
//! never waits for the consumer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Severity of an operator-facing record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    /// Progress information
    Info,
    /// A drone acknowledged a command
    Success,
    /// Something the operator should look at; the show continues
    Warning,
    /// A failure; the show may continue
    Error,
}

/// A single leveled log line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Severity
    pub level: LogLevel,
    /// Human-readable text
    pub message: String,
    /// Wall-clock time the record was produced
    pub timestamp: DateTime<Utc>,
}

/// Messages flowing from the core to a presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShowMessage {
    /// A leveled log line
    Log(LogRecord),
    /// The runner entered the step at this schedule offset
    Highlight {
        /// Schedule offset in seconds
        time: f64,
    },
    /// No step is active anymore
    ClearHighlight,
    /// Every drone answered the connection handshake
    ConnectionSucceeded,
    /// At least one drone failed the connection handshake
    ConnectionFailed,
    /// The show (including landing) is over
    ShowComplete,
}

/// Cloneable, non-blocking handle for emitting [`ShowMessage`]s
#[derive(Debug, Clone, Default)]
pub struct ShowLog {
    sender: Option<UnboundedSender<ShowMessage>>,
}

impl ShowLog {
    /// Create a log handle together with the receiving end of its channel
    pub fn channel() -> (Self, UnboundedReceiver<ShowMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                sender: Some(sender),
            },
            receiver,
        )
    }

    /// A handle that only forwards to `tracing`
    pub fn detached() -> Self {
        Self::default()
    }

    /// Emit a leveled record
    pub fn record(&self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Info => tracing::info!("{}", message),
            LogLevel::Success => tracing::info!(success = true, "{}", message),
            LogLevel::Warning => tracing::warn!("{}", message),
            LogLevel::Error => tracing::error!("{}", message),
        }
        self.signal(ShowMessage::Log(LogRecord {
            level,
            message,
            timestamp: Utc::now(),
        }));
    }

    /// Emit an INFO record
    pub fn info(&self, message: impl Into<String>) {
        self.record(LogLevel::Info, message);
    }

    /// Emit a SUCCESS record
    pub fn success(&self, message: impl Into<String>) {
        self.record(LogLevel::Success, message);
    }

    /// Emit a WARNING record
    pub fn warning(&self, message: impl Into<String>) {
        self.record(LogLevel::Warning, message);
    }

    /// Emit an ERROR record
    pub fn error(&self, message: impl Into<String>) {
        self.record(LogLevel::Error, message);
    }

    /// Push a non-log signal to the presentation layer, if one is attached
    pub fn signal(&self, message: ShowMessage) {
        if let Some(sender) = &self.sender {
            // A closed receiver just means nobody is watching anymore.
            let _ = sender.send(message);
        }
    }
}
