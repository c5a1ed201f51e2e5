use serde::{Deserialize, Serialize};

/// Target name used for commands addressed to the whole show
pub const SYSTEM_TARGET: &str = "system";

/// Command that aborts the whole show
pub const STOP_ALL: &str = "stop_all";

/// A single wire command for one drone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// Drone (sprite) name, or [`SYSTEM_TARGET`]
    pub target: String,
    /// Command text in the drone SDK vocabulary, e.g. `"right 40"`
    pub command: String,
}

impl Command {
    /// Command for a named drone
    pub fn new(target: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            command: command.into(),
        }
    }

    /// The global abort sentinel
    pub fn stop_all() -> Self {
        Self::new(SYSTEM_TARGET, STOP_ALL)
    }

    /// Whether this is the global abort sentinel
    pub fn is_stop_all(&self) -> bool {
        self.command == STOP_ALL
    }
}

/// What one sprite does over one lockstep slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Seconds the action occupies
    pub duration: f64,
    /// Commands issued at the start of the action
    pub commands: Vec<Command>,
    /// Explicit timed wait; carries no commands
    pub is_wait: bool,
    /// Owning sprite
    pub actor: String,
    /// Operator warnings raised while producing this action
    pub warnings: Vec<String>,
}

impl Action {
    /// A single drone command taking `duration` seconds
    pub fn command(actor: &str, command: impl Into<String>, duration: f64) -> Self {
        Self {
            duration,
            commands: vec![Command::new(actor, command)],
            is_wait: false,
            actor: actor.to_string(),
            warnings: Vec::new(),
        }
    }

    /// A timed wait
    pub fn wait(actor: &str, duration: f64) -> Self {
        Self {
            duration,
            commands: Vec::new(),
            is_wait: true,
            actor: actor.to_string(),
            warnings: Vec::new(),
        }
    }

    /// The global abort, issued instantly
    pub fn stop_all(actor: &str) -> Self {
        Self {
            duration: 0.0,
            commands: vec![Command::stop_all()],
            is_wait: false,
            actor: actor.to_string(),
            warnings: Vec::new(),
        }
    }

    /// An instant, command-less carrier for warnings
    pub fn notice(actor: &str, warnings: Vec<String>) -> Self {
        Self {
            duration: 0.0,
            commands: Vec::new(),
            is_wait: false,
            actor: actor.to_string(),
            warnings,
        }
    }

    /// Carries only warnings: no command and no wait
    pub fn is_notice(&self) -> bool {
        self.commands.is_empty() && !self.is_wait
    }
}
