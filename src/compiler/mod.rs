//! Scratch project to drone schedule compiler
//!
//! [`compile_project`] interprets every sprite independently and merges the
//! results into one [`Schedule`]. [`parse_to_schedule`] is the outer boundary
//! used by the CLI and the runner: it never fails, and reports unreadable
//! input as [`ParseStatus::Failed`] next to an empty schedule.

/// Actions and wire commands.
pub mod action;
/// Per-sprite block walker.
pub mod interpreter;
/// Motion to command translation.
pub mod motion;
/// Custom block discovery.
pub mod procedure;
/// Input slot resolution.
pub mod value;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::CompilerConfig;
use crate::log::ShowLog;
use crate::project::{BlockIndex, Project, Target};
use crate::schedule::{Lane, Schedule, synthesize};

pub use action::{Action, Command, STOP_ALL, SYSTEM_TARGET};
pub use interpreter::{ActorProgram, ActorState, Interpreter};
pub use procedure::{Procedure, ProcedureTable, discover_procedures};
pub use value::BlockScope;

/// Interpret one sprite
pub fn compile_actor(
    target: &Target,
    index: &BlockIndex<'_>,
    initial_variables: &HashMap<String, f64>,
    config: &CompilerConfig,
) -> ActorProgram {
    let procedures = discover_procedures(&target.blocks, index);
    let scope = BlockScope::new(&target.blocks, index);
    Interpreter::new(&target.name, scope, &procedures, initial_variables, config).run()
}

/// Per-sprite compilation figures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorSummary {
    /// Sprite name
    pub name: String,
    /// Whether the sprite has a green-flag script
    pub has_entry: bool,
    /// Number of actions produced
    pub actions: usize,
    /// Number of warnings attached to those actions
    pub warnings: usize,
}

/// Result of compiling a whole project
#[derive(Debug, Clone, PartialEq)]
pub struct Compilation {
    /// The merged timeline
    pub schedule: Schedule,
    /// Whether any sprite has a green-flag script
    pub has_valid_action: bool,
    /// One entry per sprite, in project order
    pub actors: Vec<ActorSummary>,
}

/// Compile every sprite of `project` into one schedule
pub fn compile_project(project: &Project, config: &CompilerConfig) -> Compilation {
    let index = project.block_index();
    let initial_variables = project.initial_variables();

    let programs: Vec<ActorProgram> = project
        .sprites()
        .map(|target| compile_actor(target, &index, &initial_variables, config))
        .collect();

    let lanes: Vec<Lane<'_>> = programs
        .iter()
        .map(|program| Lane {
            actor: &program.actor,
            actions: &program.actions,
        })
        .collect();
    let schedule = synthesize(&lanes, config);

    let actors = programs
        .iter()
        .map(|program| ActorSummary {
            name: program.actor.clone(),
            has_entry: program.has_entry,
            actions: program.actions.len(),
            warnings: program.actions.iter().map(|a| a.warnings.len()).sum(),
        })
        .collect();

    Compilation {
        schedule,
        has_valid_action: programs.iter().any(|program| program.has_entry),
        actors,
    }
}

/// How parsing a project ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseStatus {
    /// At least one sprite has a green-flag script
    Scheduled,
    /// The project was readable but nothing starts on the green flag
    NoValidAction,
    /// The archive or its JSON could not be read
    Failed(String),
}

/// Schedule plus how it was obtained
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOutcome {
    /// Always present; empty unless the status is `Scheduled`
    pub schedule: Schedule,
    /// Outcome
    pub status: ParseStatus,
}

impl ParseOutcome {
    /// Whether the input could not be read at all
    pub fn is_failure(&self) -> bool {
        matches!(self.status, ParseStatus::Failed(_))
    }
}

/// Parse an `.sb3` archive (or bare `project.json`) into a schedule
pub fn parse_to_schedule(data: &[u8], config: &CompilerConfig, log: &ShowLog) -> ParseOutcome {
    let project = match Project::from_bytes(data) {
        Ok(project) => project,
        Err(err) => {
            log.error(format!("Failed to read project: {}", err));
            return ParseOutcome {
                schedule: Schedule::empty(),
                status: ParseStatus::Failed(err.to_string()),
            };
        }
    };

    let compilation = compile_project(&project, config);
    for actor in &compilation.actors {
        if actor.has_entry {
            log.info(format!("{}: {} actions", actor.name, actor.actions));
        }
    }
    for warning in compilation.schedule.warnings() {
        log.warning(warning);
    }

    if !compilation.has_valid_action {
        log.warning("No sprite has a green-flag script; nothing to fly");
        return ParseOutcome {
            schedule: compilation.schedule,
            status: ParseStatus::NoValidAction,
        };
    }

    log.info(format!(
        "Schedule ready: {} events, {:.1}s",
        compilation.schedule.events.len(),
        compilation.schedule.total_time
    ));
    ParseOutcome {
        schedule: compilation.schedule,
        status: ParseStatus::Scheduled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::{LogLevel, ShowMessage};
    use serde_json::json;

    fn document(targets: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&json!({ "targets": targets })).unwrap()
    }

    #[test]
    fn test_stage_is_never_compiled() {
        let project = Project::from_json(&json!({
            "targets": [{
                "name": "Stage", "isStage": true,
                "blocks": {
                    "hat": {"opcode": "event_whenflagclicked", "next": "w"},
                    "w": {"opcode": "control_wait", "inputs": {"DURATION": [1, [5, "1"]]}}
                }
            }]
        }))
        .unwrap();
        let compilation = compile_project(&project, &CompilerConfig::default());
        assert!(compilation.actors.is_empty());
        assert!(!compilation.has_valid_action);
        assert!(compilation.schedule.is_empty());
    }

    #[test]
    fn test_parse_failure_is_distinct_from_empty() {
        let config = CompilerConfig::default();
        let (log, mut rx) = ShowLog::channel();

        let failed = parse_to_schedule(b"not a project", &config, &log);
        assert!(failed.is_failure());
        assert!(failed.schedule.is_empty());

        let empty = parse_to_schedule(&document(json!([])), &config, &log);
        assert_eq!(empty.status, ParseStatus::NoValidAction);
        assert_eq!(empty.schedule.total_time, 0.0);

        match rx.try_recv().unwrap() {
            ShowMessage::Log(record) => assert_eq!(record.level, LogLevel::Error),
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_entry_without_actions_is_still_valid() {
        let config = CompilerConfig::default();
        let outcome = parse_to_schedule(
            &document(json!([{
                "name": "D1",
                "blocks": {
                    "hat": {"opcode": "event_whenflagclicked", "next": "v"},
                    "v": {"opcode": "data_setvariableto",
                          "fields": {"VARIABLE": ["n", "var-n"]},
                          "inputs": {"VALUE": [1, [10, "3"]]}}
                }
            }])),
            &config,
            &ShowLog::detached(),
        );
        assert_eq!(outcome.status, ParseStatus::Scheduled);
        assert!(outcome.schedule.is_empty());
    }
}
