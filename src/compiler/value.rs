//! Numeric value resolution for input slots
//!
//! Resolution is best-effort: anything that cannot be read as a finite number
//! (missing slots, unknown reporters, unbound arguments, unknown variables,
//! non-numeric text) resolves to `0.0`. Malformed numeric input never stops
//! compilation.

use std::collections::HashMap;

use crate::project::{Block, BlockIndex, BlockTable, InputValue, Opcode};

/// Procedure argument bindings visible to nested lookups, by argument name
pub type Bindings = HashMap<String, f64>;

/// Block lookup for one sprite: its own table first, then the whole project
#[derive(Debug, Clone, Copy)]
pub struct BlockScope<'a> {
    local: &'a BlockTable,
    global: &'a BlockIndex<'a>,
}

impl<'a> BlockScope<'a> {
    /// Scope over a sprite table and the project-wide index
    pub fn new(local: &'a BlockTable, global: &'a BlockIndex<'a>) -> Self {
        Self { local, global }
    }

    /// Block by id
    pub fn get(&self, id: &str) -> Option<&'a Block> {
        self.local.get(id).or_else(|| self.global.get(id))
    }

    /// The sprite's own blocks
    pub fn local(&self) -> &'a BlockTable {
        self.local
    }
}

/// Read text as a number, defaulting to `0.0`
pub fn parse_number(text: &str) -> f64 {
    match text.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => 0.0,
    }
}

/// Resolve an input slot to a number
pub fn resolve_number(
    input: Option<&InputValue>,
    scope: &BlockScope<'_>,
    variables: &HashMap<String, f64>,
    arguments: &Bindings,
) -> f64 {
    match input {
        Some(InputValue::Literal(text)) => parse_number(text),
        Some(InputValue::Variable { id, .. }) => variables.get(id).copied().unwrap_or(0.0),
        Some(InputValue::Block(id)) => scope
            .get(id)
            .map(|block| reporter_value(block, arguments))
            .unwrap_or(0.0),
        Some(InputValue::Broadcast { .. } | InputValue::Empty) | None => 0.0,
    }
}

fn reporter_value(block: &Block, arguments: &Bindings) -> f64 {
    match block.opcode {
        Opcode::ArgumentReporter => block
            .field("VALUE")
            .and_then(|field| arguments.get(&field.value))
            .copied()
            .unwrap_or(0.0),
        Opcode::MathNumber => block
            .field("NUM")
            .map(|field| parse_number(&field.value))
            .unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Resolve a broadcast input to its message text (empty when unreadable)
pub fn resolve_message(input: Option<&InputValue>, scope: &BlockScope<'_>) -> String {
    match input {
        Some(InputValue::Broadcast { name, .. }) => name.clone(),
        Some(InputValue::Literal(text)) => text.clone(),
        Some(InputValue::Block(id)) => scope
            .get(id)
            .filter(|block| block.opcode == Opcode::BroadcastMenu)
            .and_then(|block| block.field("BROADCAST_OPTION"))
            .map(|field| field.value.clone())
            .unwrap_or_default(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::Project;
    use serde_json::json;

    fn project() -> Project {
        Project::from_json(&json!({
            "targets": [{
                "name": "Drone1",
                "blocks": {
                    "num": {"opcode": "math_number", "fields": {"NUM": ["12.5", null]}},
                    "bad": {"opcode": "math_number", "fields": {"NUM": ["abc", null]}},
                    "arg": {"opcode": "argument_reporter_string_number", "fields": {"VALUE": ["dist", null]}},
                    "menu": {"opcode": "event_broadcast_menu", "fields": {"BROADCAST_OPTION": ["Flip R", "b1"]}},
                    "sum": {"opcode": "operator_add"}
                }
            }]
        }))
        .unwrap()
    }

    #[test]
    fn test_literal_and_shadow_numbers() {
        let project = project();
        let index = project.block_index();
        let scope = BlockScope::new(&project.targets[0].blocks, &index);
        let vars = HashMap::new();
        let args = Bindings::new();

        let literal = InputValue::Literal(" 40 ".to_string());
        assert_eq!(resolve_number(Some(&literal), &scope, &vars, &args), 40.0);

        let shadow = InputValue::Block("num".to_string());
        assert_eq!(resolve_number(Some(&shadow), &scope, &vars, &args), 12.5);
    }

    #[test]
    fn test_failures_default_to_zero() {
        let project = project();
        let index = project.block_index();
        let scope = BlockScope::new(&project.targets[0].blocks, &index);
        let vars = HashMap::new();
        let args = Bindings::new();

        for input in [
            InputValue::Literal("ten".to_string()),
            InputValue::Literal("NaN".to_string()),
            InputValue::Block("bad".to_string()),
            InputValue::Block("missing".to_string()),
            InputValue::Block("sum".to_string()),
            InputValue::Block("arg".to_string()),
            InputValue::Variable {
                name: "x".to_string(),
                id: "unknown".to_string(),
            },
            InputValue::Empty,
        ] {
            assert_eq!(resolve_number(Some(&input), &scope, &vars, &args), 0.0);
        }
        assert_eq!(resolve_number(None, &scope, &vars, &args), 0.0);
    }

    #[test]
    fn test_arguments_and_variables() {
        let project = project();
        let index = project.block_index();
        let scope = BlockScope::new(&project.targets[0].blocks, &index);
        let vars = HashMap::from([("v1".to_string(), 7.0)]);
        let args = Bindings::from([("dist".to_string(), 60.0)]);

        let arg = InputValue::Block("arg".to_string());
        assert_eq!(resolve_number(Some(&arg), &scope, &vars, &args), 60.0);

        let var = InputValue::Variable {
            name: "count".to_string(),
            id: "v1".to_string(),
        };
        assert_eq!(resolve_number(Some(&var), &scope, &vars, &args), 7.0);
    }

    #[test]
    fn test_broadcast_messages() {
        let project = project();
        let index = project.block_index();
        let scope = BlockScope::new(&project.targets[0].blocks, &index);

        let menu = InputValue::Block("menu".to_string());
        assert_eq!(resolve_message(Some(&menu), &scope), "Flip R");

        let inline = InputValue::Broadcast {
            name: "flip b".to_string(),
            id: "b2".to_string(),
        };
        assert_eq!(resolve_message(Some(&inline), &scope), "flip b");

        let wrong = InputValue::Block("num".to_string());
        assert_eq!(resolve_message(Some(&wrong), &scope), "");
    }
}
