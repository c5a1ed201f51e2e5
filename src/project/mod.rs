//! Scratch project model
//!
//! Loads `project.json` (bare or inside an `.sb3` archive) into per-sprite
//! block tables and the project-wide variable snapshot. Decoding is
//! best-effort: sprites and blocks that do not have the expected shape are
//! skipped instead of failing the whole project.

/// `.sb3` archive access.
pub mod archive;
/// Block records and opcodes.
pub mod block;

use std::collections::HashMap;
use std::io;
use std::path::Path;

use serde_json::Value as Json;
use thiserror::Error;

pub use block::{Block, Field, InputValue, Mutation, Opcode};

/// Errors raised while reading a project
#[derive(Debug, Error)]
pub enum ProjectError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The archive could not be opened
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// The archive lacks the project document
    #[error("Archive does not contain {0}")]
    MissingEntry(&'static str),

    /// The project document is not valid JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The project document is JSON but not a project
    #[error("Malformed project: {0}")]
    Malformed(String),
}

/// Convenience result alias for project loading
pub type ProjectResult<T> = std::result::Result<T, ProjectError>;

/// Blocks owned by one target, in document order
#[derive(Debug, Clone, Default)]
pub struct BlockTable {
    order: Vec<String>,
    blocks: HashMap<String, Block>,
}

impl BlockTable {
    /// Insert a block, keeping first-seen order
    pub fn insert(&mut self, block: Block) {
        if !self.blocks.contains_key(&block.id) {
            self.order.push(block.id.clone());
        }
        self.blocks.insert(block.id.clone(), block);
    }

    /// Block by id
    pub fn get(&self, id: &str) -> Option<&Block> {
        self.blocks.get(id)
    }

    /// Blocks in document order
    pub fn iter(&self) -> impl Iterator<Item = &Block> {
        self.order.iter().filter_map(|id| self.blocks.get(id))
    }

    /// Number of blocks
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Declared variable with its initial value
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    /// Variable id
    pub id: String,
    /// Display name
    pub name: String,
    /// Initial numeric value (non-numeric values read as 0)
    pub value: f64,
}

/// A sprite or the stage
#[derive(Debug, Clone, Default)]
pub struct Target {
    /// Sprite name; also the drone it drives
    pub name: String,
    /// The stage pseudo-sprite never flies
    pub is_stage: bool,
    /// Blocks owned by this target
    pub blocks: BlockTable,
    /// Variables declared on this target
    pub variables: Vec<Variable>,
}

/// A decoded Scratch project
#[derive(Debug, Clone, Default)]
pub struct Project {
    /// Targets in document order
    pub targets: Vec<Target>,
}

impl Project {
    /// Read a project from a file (`.sb3` archive or bare `project.json`)
    pub fn open(path: &Path) -> ProjectResult<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data)
    }

    /// Decode an `.sb3` archive or a bare `project.json`
    pub fn from_bytes(data: &[u8]) -> ProjectResult<Self> {
        if archive::is_bare_json(data) {
            Self::from_json_slice(data)
        } else {
            let entry = archive::read_project_entry(data)?;
            Self::from_json_slice(&entry)
        }
    }

    /// Decode a `project.json` document
    pub fn from_json_slice(data: &[u8]) -> ProjectResult<Self> {
        let document: Json = serde_json::from_slice(data)?;
        Self::from_json(&document)
    }

    /// Decode an already-parsed `project.json` value
    pub fn from_json(document: &Json) -> ProjectResult<Self> {
        let root = document
            .as_object()
            .ok_or_else(|| ProjectError::Malformed("document is not an object".to_string()))?;

        let targets = root
            .get("targets")
            .and_then(Json::as_array)
            .map(|targets| targets.iter().filter_map(decode_target).collect())
            .unwrap_or_default();

        Ok(Self { targets })
    }

    /// Targets that can fly
    pub fn sprites(&self) -> impl Iterator<Item = &Target> {
        self.targets.iter().filter(|target| !target.is_stage)
    }

    /// Project-wide initial variable values, keyed by variable id
    pub fn initial_variables(&self) -> HashMap<String, f64> {
        self.targets
            .iter()
            .flat_map(|target| target.variables.iter())
            .map(|variable| (variable.id.clone(), variable.value))
            .collect()
    }

    /// Read-only view over every block in the project
    pub fn block_index(&self) -> BlockIndex<'_> {
        let mut blocks = HashMap::new();
        for target in &self.targets {
            for block in target.blocks.iter() {
                blocks.entry(block.id.as_str()).or_insert(block);
            }
        }
        BlockIndex { blocks }
    }
}

/// Immutable cross-sprite block lookup
#[derive(Debug, Clone, Default)]
pub struct BlockIndex<'a> {
    blocks: HashMap<&'a str, &'a Block>,
}

impl<'a> BlockIndex<'a> {
    /// Block by id, from any target
    pub fn get(&self, id: &str) -> Option<&'a Block> {
        self.blocks.get(id).copied()
    }
}

fn decode_target(value: &Json) -> Option<Target> {
    let record = value.as_object()?;
    let name = record
        .get("name")
        .and_then(Json::as_str)
        .unwrap_or_default()
        .to_string();
    let is_stage = record
        .get("isStage")
        .and_then(Json::as_bool)
        .unwrap_or(false);

    let mut blocks = BlockTable::default();
    if let Some(records) = record.get("blocks").and_then(Json::as_object) {
        for (id, block) in records {
            if let Some(block) = Block::from_json(id, block) {
                blocks.insert(block);
            }
        }
    }

    let variables = record
        .get("variables")
        .and_then(Json::as_object)
        .map(|variables| {
            variables
                .iter()
                .map(|(id, declaration)| decode_variable(id, declaration))
                .collect()
        })
        .unwrap_or_default();

    Some(Target {
        name,
        is_stage,
        blocks,
        variables,
    })
}

fn decode_variable(id: &str, declaration: &Json) -> Variable {
    let parts = declaration.as_array();
    let name = parts
        .and_then(|parts| parts.first())
        .and_then(Json::as_str)
        .unwrap_or_default()
        .to_string();
    let value = parts
        .and_then(|parts| parts.get(1))
        .map(json_number)
        .unwrap_or(0.0);
    Variable {
        id: id.to_string(),
        name,
        value,
    }
}

/// Best-effort numeric reading of a JSON value
fn json_number(value: &Json) -> f64 {
    let number = match value {
        Json::Number(number) => number.as_f64().unwrap_or(0.0),
        Json::String(text) => text.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    };
    if number.is_finite() { number } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Json {
        json!({
            "targets": [
                {
                    "isStage": true,
                    "name": "Stage",
                    "variables": {"g1": ["altitude", "120"]},
                    "blocks": {}
                },
                {
                    "isStage": false,
                    "name": "Drone1",
                    "variables": {"v1": ["count", 3], "v2": ["label", "hello"]},
                    "blocks": {
                        "flag": {"opcode": "event_whenflagclicked", "next": "move", "topLevel": true},
                        "move": {"opcode": "motion_movesteps", "next": null,
                                 "inputs": {"STEPS": [1, [4, "50"]]}},
                        "stray": [12, "count", "v1", 100, 200]
                    }
                },
                "not a target"
            ]
        })
    }

    #[test]
    fn test_decode_targets_and_skip_malformed() {
        let project = Project::from_json(&sample()).unwrap();
        assert_eq!(project.targets.len(), 2);

        let sprites: Vec<_> = project.sprites().map(|t| t.name.as_str()).collect();
        assert_eq!(sprites, vec!["Drone1"]);

        let drone = &project.targets[1];
        assert_eq!(drone.blocks.len(), 2);
        let order: Vec<_> = drone.blocks.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(order, vec!["flag", "move"]);
    }

    #[test]
    fn test_initial_variables_default_to_zero() {
        let project = Project::from_json(&sample()).unwrap();
        let vars = project.initial_variables();
        assert_eq!(vars.get("g1"), Some(&120.0));
        assert_eq!(vars.get("v1"), Some(&3.0));
        assert_eq!(vars.get("v2"), Some(&0.0));
    }

    #[test]
    fn test_block_index_spans_targets() {
        let project = Project::from_json(&sample()).unwrap();
        let index = project.block_index();
        assert_eq!(index.get("move").map(|b| &b.opcode), Some(&Opcode::MoveSteps));
        assert!(index.get("stray").is_none());
    }

    #[test]
    fn test_non_object_document_is_malformed() {
        let err = Project::from_json(&json!([1, 2, 3])).unwrap_err();
        assert!(matches!(err, ProjectError::Malformed(_)));
    }

    #[test]
    fn test_missing_targets_is_empty_project() {
        let project = Project::from_json_slice(br#"{"meta": {}}"#).unwrap();
        assert!(project.targets.is_empty());
    }

    #[test]
    fn test_invalid_json_is_error() {
        let err = Project::from_bytes(b"{ not json").unwrap_err();
        assert!(matches!(err, ProjectError::Json(_)));
    }
}
