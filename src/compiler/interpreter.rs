//! Per-sprite block graph interpreter
//!
//! Walks one sprite's script from its green-flag block and flattens it into an
//! ordered list of [`Action`]s. Loops are unrolled, procedure calls are
//! inlined with their arguments bound, and the sprite's position, altitude and
//! variables are threaded through the whole walk.

use std::collections::{HashMap, HashSet};

use super::action::Action;
use super::motion::{self, Axis, AxisMove};
use super::procedure::ProcedureTable;
use super::value::{self, BlockScope, Bindings};
use crate::config::CompilerConfig;
use crate::project::{Block, BlockTable, Opcode};

/// Nested procedure calls deeper than this are skipped (recursive custom blocks)
pub const MAX_CALL_DEPTH: usize = 64;

/// Upper bound on blocks executed for one sprite
pub const MAX_BLOCK_EXECUTIONS: usize = 1_000_000;

/// Position, altitude and variables of a sprite during traversal
#[derive(Debug, Clone, PartialEq)]
pub struct ActorState {
    /// Scratch x
    pub x: f64,
    /// Scratch y
    pub y: f64,
    /// Altitude in cm (driven by sprite size)
    pub z: f64,
    /// This sprite's copy of the project variables
    pub variables: HashMap<String, f64>,
}

impl ActorState {
    /// Fresh state at the origin, hovering at `hover_height`
    pub fn new(hover_height: f64, variables: HashMap<String, f64>) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: hover_height,
            variables,
        }
    }
}

/// Output of interpreting one sprite
#[derive(Debug, Clone, PartialEq)]
pub struct ActorProgram {
    /// Sprite name
    pub actor: String,
    /// Whether a green-flag script was found
    pub has_entry: bool,
    /// Actions in execution order
    pub actions: Vec<Action>,
    /// State after the last block
    pub final_state: ActorState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Halt,
}

/// Find the first green-flag script and return the block following the hat
pub fn find_entry(blocks: &BlockTable) -> Option<&str> {
    blocks
        .iter()
        .find(|block| block.opcode == Opcode::WhenFlagClicked)
        .and_then(|hat| hat.next.as_deref())
}

/// Interpreter for a single sprite
pub struct Interpreter<'a> {
    actor: &'a str,
    scope: BlockScope<'a>,
    procedures: &'a ProcedureTable,
    config: &'a CompilerConfig,
    state: ActorState,
    actions: Vec<Action>,
    pending_warnings: Vec<String>,
    depth: usize,
    executed: usize,
}

impl<'a> Interpreter<'a> {
    /// Create an interpreter; `initial_variables` is copied, never shared
    pub fn new(
        actor: &'a str,
        scope: BlockScope<'a>,
        procedures: &'a ProcedureTable,
        initial_variables: &HashMap<String, f64>,
        config: &'a CompilerConfig,
    ) -> Self {
        Self {
            actor,
            scope,
            procedures,
            config,
            state: ActorState::new(config.initial_hover_height_cm, initial_variables.clone()),
            actions: Vec::new(),
            pending_warnings: Vec::new(),
            depth: 0,
            executed: 0,
        }
    }

    /// Interpret the sprite's green-flag script
    pub fn run(mut self) -> ActorProgram {
        let entry = find_entry(self.scope.local());
        if entry.is_some() {
            self.walk(entry, &Bindings::new());
        }

        if !self.pending_warnings.is_empty() {
            let warnings = std::mem::take(&mut self.pending_warnings);
            self.actions.push(Action::notice(self.actor, warnings));
        }

        ActorProgram {
            actor: self.actor.to_string(),
            has_entry: entry.is_some(),
            actions: self.actions,
            final_state: self.state,
        }
    }

    fn walk(&mut self, start: Option<&'a str>, arguments: &Bindings) -> Flow {
        let mut visited = HashSet::new();
        let mut cursor = start;

        while let Some(id) = cursor {
            if !visited.insert(id) {
                self.warn(format!(
                    "[{}] script loops back to block {}; the rest was skipped",
                    self.actor, id
                ));
                break;
            }
            let Some(block) = self.scope.get(id) else {
                break;
            };
            if self.execute(block, arguments) == Flow::Halt {
                return Flow::Halt;
            }
            cursor = block.next.as_deref();
        }

        Flow::Continue
    }

    fn execute(&mut self, block: &'a Block, arguments: &Bindings) -> Flow {
        self.executed += 1;
        if self.executed > MAX_BLOCK_EXECUTIONS {
            if self.executed == MAX_BLOCK_EXECUTIONS + 1 {
                self.warn(format!(
                    "[{}] script exceeds {} block executions and was truncated",
                    self.actor, MAX_BLOCK_EXECUTIONS
                ));
            }
            return Flow::Halt;
        }

        match &block.opcode {
            Opcode::SetVariableTo | Opcode::ChangeVariableBy => {
                let Some(id) = block.field("VARIABLE").and_then(|field| field.id.clone()) else {
                    return Flow::Continue;
                };
                let value = self.number(block, "VALUE", arguments);
                if block.opcode == Opcode::SetVariableTo {
                    self.state.variables.insert(id, value);
                } else {
                    *self.state.variables.entry(id).or_insert(0.0) += value;
                }
            }

            Opcode::ProcedureCall => return self.call(block, arguments),

            Opcode::TurnRight | Opcode::TurnLeft => {
                let degrees = self.number(block, "DEGREES", arguments);
                let clockwise = block.opcode == Opcode::TurnRight;
                if let Some((command, duration)) = motion::rotation(degrees, clockwise, self.config)
                {
                    self.push(Action::command(self.actor, command, duration));
                }
            }

            Opcode::Broadcast => {
                let message = value::resolve_message(block.input("BROADCAST_INPUT"), &self.scope);
                if let Some(command) = motion::flip_command(&message) {
                    self.push(Action::command(self.actor, command, self.config.flip_duration));
                }
            }

            Opcode::GoToXY | Opcode::MoveSteps => {
                let (new_x, new_y) = if block.opcode == Opcode::GoToXY {
                    (
                        self.number(block, "X", arguments),
                        self.number(block, "Y", arguments),
                    )
                } else {
                    // Drone commands are body-relative: a step is always "forward".
                    let steps = self.number(block, "STEPS", arguments);
                    (self.state.x, self.state.y + steps)
                };

                let dx = motion::planar_cm(new_x - self.state.x, self.config);
                self.translate(Axis::Horizontal, dx);
                let dy = motion::planar_cm(new_y - self.state.y, self.config);
                self.translate(Axis::Depth, dy);

                self.state.x = new_x;
                self.state.y = new_y;
            }

            Opcode::Wait => {
                let duration = self.number(block, "DURATION", arguments);
                if duration > 0.0 {
                    self.push(Action::wait(self.actor, duration));
                }
            }

            Opcode::SetSizeTo | Opcode::ChangeSizeBy => {
                let new_z = if block.opcode == Opcode::SetSizeTo {
                    self.number(block, "SIZE", arguments)
                } else {
                    self.state.z + self.number(block, "CHANGE", arguments)
                };
                let dz = motion::whole_cm(new_z - self.state.z);
                self.translate(Axis::Vertical, dz);
                self.state.z = new_z;
            }

            Opcode::Repeat => {
                let times = self.number(block, "TIMES", arguments).round_ties_even();
                if let Some(body) = block.input_block("SUBSTACK") {
                    if times > 0.0 {
                        return self.unroll(body, times as u64, arguments);
                    }
                }
            }

            Opcode::Forever => {
                if let Some(body) = block.input_block("SUBSTACK") {
                    let iterations = u64::from(self.config.forever_iterations);
                    return self.unroll(body, iterations, arguments);
                }
            }

            Opcode::Stop => match block.field("STOP_OPTION").map(|field| field.value.as_str()) {
                Some("all") => {
                    self.push(Action::stop_all(self.actor));
                    return Flow::Halt;
                }
                Some("this script") => return Flow::Halt,
                _ => {}
            },

            Opcode::WhenFlagClicked
            | Opcode::BroadcastMenu
            | Opcode::ProcedureDefinition
            | Opcode::ProcedurePrototype
            | Opcode::ArgumentReporter
            | Opcode::MathNumber
            | Opcode::Unknown(_) => {}
        }

        Flow::Continue
    }

    fn unroll(&mut self, body: &'a str, iterations: u64, arguments: &Bindings) -> Flow {
        if self.scope.get(body).is_none() {
            tracing::debug!(actor = self.actor, body, "loop body is missing; loop skipped");
            return Flow::Continue;
        }
        for _ in 0..iterations {
            if self.walk(Some(body), arguments) == Flow::Halt {
                return Flow::Halt;
            }
        }
        Flow::Continue
    }

    fn call(&mut self, block: &'a Block, arguments: &Bindings) -> Flow {
        let procedures = self.procedures;
        let Some(mutation) = &block.mutation else {
            return Flow::Continue;
        };
        let Some(procedure) = mutation
            .proccode
            .as_ref()
            .and_then(|code| procedures.get(code))
        else {
            return Flow::Continue;
        };

        if self.depth >= MAX_CALL_DEPTH {
            self.warn(format!(
                "[{}] custom block nesting deeper than {} was skipped",
                self.actor, MAX_CALL_DEPTH
            ));
            return Flow::Continue;
        }

        let mut bound = Bindings::new();
        for (position, argument_id) in mutation.argument_ids.iter().enumerate() {
            let value = self.number(block, argument_id, arguments);
            if let Some(name) = procedure.argument_names.get(position) {
                bound.insert(name.clone(), value);
            }
        }

        self.depth += 1;
        let flow = self.walk(procedure.body.as_deref(), &bound);
        self.depth -= 1;
        flow
    }

    fn number(&self, block: &Block, slot: &str, arguments: &Bindings) -> f64 {
        value::resolve_number(
            block.input(slot),
            &self.scope,
            &self.state.variables,
            arguments,
        )
    }

    fn translate(&mut self, axis: Axis, delta_cm: i64) {
        match motion::axis_move(self.actor, axis, delta_cm, self.config) {
            AxisMove::Command { command, duration } => {
                self.push(Action::command(self.actor, command, duration))
            }
            AxisMove::TooSmall(warning) => self.warn(warning),
            AxisMove::Still => {}
        }
    }

    /// Pending warnings ride on the next action this sprite emits.
    fn push(&mut self, mut action: Action) {
        action.warnings.append(&mut self.pending_warnings);
        self.actions.push(action);
    }

    fn warn(&mut self, warning: String) {
        tracing::debug!(actor = self.actor, "{}", warning);
        self.pending_warnings.push(warning);
    }
}
