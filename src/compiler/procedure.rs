use std::collections::HashMap;

use crate::project::{BlockIndex, BlockTable, Opcode};

/// A custom block definition reachable from one sprite
#[derive(Debug, Clone, PartialEq)]
pub struct Procedure {
    /// First block of the body
    pub body: Option<String>,
    /// Argument input ids, in declaration order
    pub argument_ids: Vec<String>,
    /// Argument names, in declaration order
    pub argument_names: Vec<String>,
}

/// Procedures keyed by their call code
pub type ProcedureTable = HashMap<String, Procedure>;

/// Collect the procedures defined in `blocks`
///
/// Each `procedures_definition` points at its prototype through the
/// `custom_block` input; the prototype is looked up project-wide. Definitions
/// whose prototype is missing or carries no call code are ignored. A later
/// definition with the same call code replaces an earlier one.
pub fn discover_procedures(blocks: &BlockTable, index: &BlockIndex<'_>) -> ProcedureTable {
    let mut procedures = ProcedureTable::new();

    for definition in blocks.iter() {
        if definition.opcode != Opcode::ProcedureDefinition {
            continue;
        }
        let Some(prototype) = definition
            .input_block("custom_block")
            .and_then(|id| blocks.get(id).or_else(|| index.get(id)))
        else {
            continue;
        };
        let Some(mutation) = &prototype.mutation else {
            continue;
        };
        let Some(proccode) = &mutation.proccode else {
            continue;
        };

        procedures.insert(
            proccode.clone(),
            Procedure {
                body: definition.next.clone(),
                argument_ids: mutation.argument_ids.clone(),
                argument_names: mutation.argument_names.clone(),
            },
        );
    }

    procedures
}
