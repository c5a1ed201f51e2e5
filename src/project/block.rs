//! Scratch block records
//!
//! Blocks are decoded one at a time from the raw `project.json` value. Any
//! entry that does not have the shape of a block (top-level reporter arrays,
//! records without an opcode) decodes to `None` and is skipped by the caller.

use std::collections::HashMap;

use serde_json::Value as Json;

/// Closed set of opcodes the compiler understands
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// `event_whenflagclicked`: program entry
    WhenFlagClicked,
    /// `data_setvariableto`
    SetVariableTo,
    /// `data_changevariableby`
    ChangeVariableBy,
    /// `motion_gotoxy`
    GoToXY,
    /// `motion_movesteps`
    MoveSteps,
    /// `motion_turnright`
    TurnRight,
    /// `motion_turnleft`
    TurnLeft,
    /// `looks_setsizeto`
    SetSizeTo,
    /// `looks_changesizeby`
    ChangeSizeBy,
    /// `control_wait`
    Wait,
    /// `control_repeat`
    Repeat,
    /// `control_forever`
    Forever,
    /// `control_stop`
    Stop,
    /// `event_broadcast`
    Broadcast,
    /// `event_broadcast_menu` shadow
    BroadcastMenu,
    /// `procedures_definition`
    ProcedureDefinition,
    /// `procedures_prototype`
    ProcedurePrototype,
    /// `procedures_call`
    ProcedureCall,
    /// `argument_reporter_string_number`
    ArgumentReporter,
    /// `math_number` and its sibling numeric shadows
    MathNumber,
    /// Anything else; executes as a no-op
    Unknown(String),
}

impl Opcode {
    /// Decode an opcode tag
    pub fn parse(tag: &str) -> Self {
        match tag {
            "event_whenflagclicked" => Self::WhenFlagClicked,
            "data_setvariableto" => Self::SetVariableTo,
            "data_changevariableby" => Self::ChangeVariableBy,
            "motion_gotoxy" => Self::GoToXY,
            "motion_movesteps" => Self::MoveSteps,
            "motion_turnright" => Self::TurnRight,
            "motion_turnleft" => Self::TurnLeft,
            "looks_setsizeto" => Self::SetSizeTo,
            "looks_changesizeby" => Self::ChangeSizeBy,
            "control_wait" => Self::Wait,
            "control_repeat" => Self::Repeat,
            "control_forever" => Self::Forever,
            "control_stop" => Self::Stop,
            "event_broadcast" => Self::Broadcast,
            "event_broadcast_menu" => Self::BroadcastMenu,
            "procedures_definition" => Self::ProcedureDefinition,
            "procedures_prototype" => Self::ProcedurePrototype,
            "procedures_call" => Self::ProcedureCall,
            "argument_reporter_string_number" => Self::ArgumentReporter,
            "math_number" | "math_positive_number" | "math_whole_number" | "math_integer"
            | "math_angle" => Self::MathNumber,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// Primary value held by an input slot
#[derive(Debug, Clone, PartialEq)]
pub enum InputValue {
    /// Reference to another block by id
    Block(String),
    /// Inline number/text primitive, kept as text
    Literal(String),
    /// Inline variable reporter
    Variable {
        /// Variable display name
        name: String,
        /// Variable id
        id: String,
    },
    /// Inline broadcast primitive
    Broadcast {
        /// Message text
        name: String,
        /// Broadcast id
        id: String,
    },
    /// Nothing usable in the slot
    Empty,
}

/// Named field value (`[value, id?]`)
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Displayed value, stringified
    pub value: String,
    /// Referenced id (variables, broadcasts), when present
    pub id: Option<String>,
}

/// Procedure signature carried by prototype and call blocks
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mutation {
    /// Opaque call code, e.g. `"jump %s times"`
    pub proccode: Option<String>,
    /// Argument input ids, in declaration order
    pub argument_ids: Vec<String>,
    /// Argument display names, in declaration order
    pub argument_names: Vec<String>,
}

/// A decoded block
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    /// Block id
    pub id: String,
    /// Operation tag
    pub opcode: Opcode,
    /// Successor block
    pub next: Option<String>,
    /// Input slots by name
    pub inputs: HashMap<String, InputValue>,
    /// Fields by name
    pub fields: HashMap<String, Field>,
    /// Procedure signature, for prototypes and calls
    pub mutation: Option<Mutation>,
}

impl Block {
    /// Decode a block from its `project.json` record
    pub fn from_json(id: &str, value: &Json) -> Option<Self> {
        let record = value.as_object()?;
        let opcode = Opcode::parse(record.get("opcode")?.as_str()?);

        let next = record
            .get("next")
            .and_then(Json::as_str)
            .map(str::to_string);

        let inputs = record
            .get("inputs")
            .and_then(Json::as_object)
            .map(|inputs| {
                inputs
                    .iter()
                    .map(|(name, slot)| (name.clone(), decode_input(slot)))
                    .collect()
            })
            .unwrap_or_default();

        let fields = record
            .get("fields")
            .and_then(Json::as_object)
            .map(|fields| {
                fields
                    .iter()
                    .filter_map(|(name, field)| Some((name.clone(), decode_field(field)?)))
                    .collect()
            })
            .unwrap_or_default();

        let mutation = record.get("mutation").and_then(decode_mutation);

        Some(Self {
            id: id.to_string(),
            opcode,
            next,
            inputs,
            fields,
            mutation,
        })
    }

    /// Input slot by name
    pub fn input(&self, name: &str) -> Option<&InputValue> {
        self.inputs.get(name)
    }

    /// Block id referenced by an input slot (substacks, shadows)
    pub fn input_block(&self, name: &str) -> Option<&str> {
        match self.inputs.get(name)? {
            InputValue::Block(id) => Some(id),
            _ => None,
        }
    }

    /// Field by name
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }
}

/// Decode `[shadow, primary, shadow_value?]`
fn decode_input(slot: &Json) -> InputValue {
    let Some(primary) = slot.as_array().and_then(|parts| parts.get(1)) else {
        return InputValue::Empty;
    };
    match primary {
        Json::String(id) => InputValue::Block(id.clone()),
        Json::Array(primitive) => decode_primitive(primitive),
        _ => InputValue::Empty,
    }
}

/// Decode an inline primitive `[tag, value, id?]`
fn decode_primitive(primitive: &[Json]) -> InputValue {
    let tag = primitive.first().and_then(Json::as_u64);
    let text = primitive.get(1).map(json_text);
    let id = primitive.get(2).and_then(Json::as_str);

    match (tag, text, id) {
        (Some(4..=10), Some(text), _) => InputValue::Literal(text),
        (Some(11), Some(name), Some(id)) => InputValue::Broadcast {
            name,
            id: id.to_string(),
        },
        (Some(12), Some(name), Some(id)) => InputValue::Variable {
            name,
            id: id.to_string(),
        },
        _ => InputValue::Empty,
    }
}

fn decode_field(field: &Json) -> Option<Field> {
    let parts = field.as_array()?;
    let value = json_text(parts.first()?);
    let id = parts.get(1).and_then(Json::as_str).map(str::to_string);
    Some(Field { value, id })
}

fn decode_mutation(value: &Json) -> Option<Mutation> {
    let record = value.as_object()?;
    Some(Mutation {
        proccode: record
            .get("proccode")
            .and_then(Json::as_str)
            .map(str::to_string),
        argument_ids: decode_string_list(record.get("argumentids")),
        argument_names: decode_string_list(record.get("argumentnames")),
    })
}

/// Mutation lists are JSON arrays encoded inside a string
fn decode_string_list(value: Option<&Json>) -> Vec<String> {
    let parsed = match value {
        Some(Json::String(encoded)) => serde_json::from_str::<Json>(encoded).ok(),
        Some(other) => Some(other.clone()),
        None => None,
    };
    parsed
        .as_ref()
        .and_then(Json::as_array)
        .map(|items| items.iter().map(json_text).collect())
        .unwrap_or_default()
}

fn json_text(value: &Json) -> String {
    match value {
        Json::String(text) => text.clone(),
        Json::Null => String::new(),
        other => other.to_string(),
    }
}
