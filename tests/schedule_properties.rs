//! Property tests for synthesized schedules

use choreo::compiler::compile_project;
use choreo::config::CompilerConfig;
use choreo::project::Project;
use proptest::prelude::*;
use serde_json::{Map, Value, json};

/// One script step: (kind, magnitude)
fn arb_step() -> impl Strategy<Value = (u8, i32)> {
    (0u8..6, -250i32..250)
}

fn block(kind: u8, value: i32) -> Value {
    let text = value.to_string();
    match kind {
        0 => json!({"opcode": "motion_movesteps", "inputs": {"STEPS": [1, [4, text]]}}),
        1 => json!({"opcode": "motion_gotoxy",
                    "inputs": {"X": [1, [4, text]], "Y": [1, [4, (value / 2).to_string()]]}}),
        2 => json!({"opcode": "motion_turnright", "inputs": {"DEGREES": [1, [8, text]]}}),
        3 => json!({"opcode": "looks_changesizeby", "inputs": {"CHANGE": [1, [4, text]]}}),
        4 => json!({"opcode": "control_wait",
                    "inputs": {"DURATION": [1, [5, (f64::from(value) / 50.0).to_string()]]}}),
        _ => json!({"opcode": "event_broadcast",
                    "inputs": {"BROADCAST_INPUT": [1, [11, "flip l", "m1"]]}}),
    }
}

fn project(sprites: &[Vec<(u8, i32)>]) -> Project {
    let targets: Vec<Value> = sprites
        .iter()
        .enumerate()
        .map(|(index, steps)| {
            let mut blocks = Map::new();
            let first = if steps.is_empty() { Value::Null } else { json!("s0") };
            blocks.insert("hat".into(), json!({"opcode": "event_whenflagclicked", "next": first}));
            for (i, (kind, value)) in steps.iter().enumerate() {
                let mut step = block(*kind, *value);
                step["next"] = if i + 1 < steps.len() {
                    json!(format!("s{}", i + 1))
                } else {
                    Value::Null
                };
                blocks.insert(format!("s{}", i), step);
            }
            json!({"name": format!("D{}", index + 1), "blocks": blocks})
        })
        .collect();
    Project::from_json(&json!({ "targets": targets })).unwrap()
}

proptest! {
    /// Event times never decrease, warnings lead their time stamp, and landing closes the show.
    #[test]
    fn prop_schedule_is_time_ordered(
        sprites in prop::collection::vec(prop::collection::vec(arb_step(), 0..10), 1..4)
    ) {
        let project = project(&sprites);
        let schedule = compile_project(&project, &CompilerConfig::default()).schedule;

        for pair in schedule.events.windows(2) {
            prop_assert!(pair[0].time <= pair[1].time);
            if pair[0].time == pair[1].time && pair[1].is_warning() {
                prop_assert!(pair[0].is_warning());
            }
        }

        match schedule.events.last() {
            Some(last) => {
                prop_assert_eq!(last.type_name(), "LAND");
                prop_assert_eq!(last.time, schedule.total_time);
            }
            None => prop_assert_eq!(schedule.total_time, 0.0),
        }
    }

    /// Compiling the same project twice yields the same schedule.
    #[test]
    fn prop_compilation_is_deterministic(
        sprites in prop::collection::vec(prop::collection::vec(arb_step(), 0..10), 1..4)
    ) {
        let config = CompilerConfig::default();
        let first = compile_project(&project(&sprites), &config).schedule;
        let second = compile_project(&project(&sprites), &config).schedule;
        prop_assert_eq!(first.fingerprint(), second.fingerprint());
        prop_assert_eq!(first, second);
    }
}
