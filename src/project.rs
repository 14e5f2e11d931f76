//! Typed view of an sb3 `project.json` document.
//!
//! The raw format encodes inputs as small arrays whose first element is a
//! discriminant (`[1, [4, "10"]]`, `[3, "blockId", [10, ""]]`, ...). Everything
//! is decoded here once, so the rest of the pipeline matches on
//! [`InputValue`] variants instead of sniffing array shapes.

use crate::error::{GradeError, Result, Side};
use crate::opcode::{Opcode, LIST_FIELD, PROCCODE_SLOT, REFERENCE_FIELDS, VARIABLE_FIELD};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, warn};

pub type BlockId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LiteralKind {
    Number,
    Color,
    Text,
    Broadcast,
    /// Value picked from a dropdown menu shadow block.
    Menu,
    /// Identity of a variable (its id after normalization).
    Reference,
}

/// A literal value bound to an input slot or field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "LiteralRepr")]
pub struct Literal {
    pub kind: LiteralKind,
    pub text: String,
}

/// Accepted JSON forms for hand-written rubrics: `10`, `"hello"` or the full
/// `{ "kind": "menu", "text": "_mouse_" }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum LiteralRepr {
    Full { kind: LiteralKind, text: String },
    Number(f64),
    Text(String),
}

impl From<LiteralRepr> for Literal {
    fn from(repr: LiteralRepr) -> Self {
        match repr {
            LiteralRepr::Full { kind, text } => Literal { kind, text },
            LiteralRepr::Number(n) => Literal::new(LiteralKind::Number, format_num(n)),
            LiteralRepr::Text(text) => {
                if text.trim().parse::<f64>().is_ok() {
                    Literal::new(LiteralKind::Number, text)
                } else {
                    Literal::new(LiteralKind::Text, text)
                }
            }
        }
    }
}

impl Literal {
    pub fn new(kind: LiteralKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    pub fn number(&self) -> Option<f64> {
        if self.kind == LiteralKind::Reference {
            return None;
        }
        self.text
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
    }

    /// Equality as a learner would see it: `10` and `10.0` are the same number.
    pub fn same_value(&self, other: &Literal) -> bool {
        if (self.kind == LiteralKind::Reference) != (other.kind == LiteralKind::Reference) {
            return false;
        }
        match (self.number(), other.number()) {
            (Some(a), Some(b)) => (a - b).abs() < 1e-9,
            _ => self.text == other.text,
        }
    }

    fn from_primitive(prim: &[Value]) -> Option<Self> {
        let code = prim.first()?.as_i64()?;
        let kind = match code {
            4..=8 => LiteralKind::Number,
            9 => LiteralKind::Color,
            10 => LiteralKind::Text,
            11 => LiteralKind::Broadcast,
            _ => return None,
        };
        Some(Literal::new(kind, scalar_text(prim.get(1)?)))
    }
}

/// A dropdown-style field: `[displayName, internalId]`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldValue {
    pub value: String,
    pub id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputValue {
    /// Shadow value typed directly into the slot.
    Literal(Literal),
    /// Reporter block plugged into the slot.
    Expression(BlockId),
    /// Body of a C-block.
    Substack(BlockId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: BlockId,
    pub opcode: Opcode,
    pub inputs: BTreeMap<String, InputValue>,
    pub fields: BTreeMap<String, FieldValue>,
    pub next: Option<BlockId>,
    pub parent: Option<BlockId>,
    pub top_level: bool,
    pub shadow: bool,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub proccode: Option<String>,
}

impl Block {
    /// The `VARIABLE` or `LIST` field, for blocks that name one.
    pub fn variable_ref(&self) -> Option<&FieldValue> {
        REFERENCE_FIELDS.iter().find_map(|field| self.fields.get(*field))
    }

    /// Literal values carried by this block itself: literal inputs, fields and
    /// the procedure code. Variable and list fields surface as
    /// [`LiteralKind::Reference`].
    pub fn own_values(&self) -> BTreeMap<String, Literal> {
        let mut out = BTreeMap::new();
        for (slot, input) in &self.inputs {
            if let InputValue::Literal(lit) = input {
                out.insert(slot.clone(), lit.clone());
            }
        }
        for (name, field) in &self.fields {
            let lit = if REFERENCE_FIELDS.contains(&name.as_str()) {
                Literal::new(
                    LiteralKind::Reference,
                    field.id.clone().unwrap_or_else(|| field.value.clone()),
                )
            } else {
                Literal::new(LiteralKind::Text, field.value.clone())
            };
            out.insert(name.clone(), lit);
        }
        if let Some(code) = &self.proccode {
            out.insert(
                PROCCODE_SLOT.to_string(),
                Literal::new(LiteralKind::Text, code.clone()),
            );
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VariableKind {
    #[default]
    Scalar,
    List,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub id: String,
    pub name: String,
    /// Initial value; for lists, the item array as JSON text.
    pub initial: String,
    pub kind: VariableKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub name: String,
    pub is_stage: bool,
    pub variables: Vec<Variable>,
    pub blocks: BTreeMap<BlockId, Block>,
}

impl Target {
    pub fn block(&self, id: &str) -> Option<&Block> {
        self.blocks.get(id)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub targets: Vec<Target>,
}

/// A parsed program plus the targets that had to be skipped.
#[derive(Debug, Clone)]
pub struct ParsedProgram {
    pub program: Program,
    pub skipped: Vec<GradeError>,
}

impl Program {
    /// Decodes a `{ "targets": [...] }` document.
    ///
    /// Fails only when the document itself is unusable; unreadable targets
    /// are reported in [`ParsedProgram::skipped`].
    pub fn from_json(doc: &Value, side: Side) -> Result<ParsedProgram> {
        let obj = doc
            .as_object()
            .ok_or(GradeError::MissingProgram(side))?;
        let targets = obj
            .get("targets")
            .and_then(Value::as_array)
            .ok_or(GradeError::MissingTargets(side))?;

        let mut program = Program::default();
        let mut skipped = Vec::new();
        for (index, target) in targets.iter().enumerate() {
            match parse_target(index, target) {
                Ok(target) => program.targets.push(target),
                Err(err) => {
                    warn!(%side, index, error = %err, "skipping unreadable target");
                    skipped.push(err);
                }
            }
        }
        debug!(%side, targets = program.targets.len(), "program decoded");
        Ok(ParsedProgram { program, skipped })
    }

    /// Every declared variable, stage first, in document order.
    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        let stage = self.targets.iter().filter(|t| t.is_stage);
        let sprites = self.targets.iter().filter(|t| !t.is_stage);
        stage.chain(sprites).flat_map(|t| t.variables.iter())
    }
}

fn parse_target(index: usize, target: &Value) -> Result<Target> {
    let obj = target.as_object().ok_or_else(|| GradeError::InvalidTarget {
        index,
        reason: "target is not an object".to_string(),
    })?;
    let name = obj
        .get("name")
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .unwrap_or_else(|| format!("Target {}", index + 1));
    let is_stage = obj.get("isStage").and_then(Value::as_bool).unwrap_or(false);
    let blocks_obj = obj
        .get("blocks")
        .and_then(Value::as_object)
        .ok_or_else(|| GradeError::InvalidTarget {
            index,
            reason: format!("target '{}' has no blocks object", name),
        })?;

    Ok(Target {
        variables: read_variables(obj.get("variables"), VariableKind::Scalar)
            .into_iter()
            .chain(read_variables(obj.get("lists"), VariableKind::List))
            .collect(),
        blocks: read_blocks(blocks_obj),
        name,
        is_stage,
    })
}

/// Reads a `{ id: [name, value] }` table; lists share the shape with the
/// item array in the value position.
fn read_variables(node: Option<&Value>, kind: VariableKind) -> Vec<Variable> {
    let mut out = Vec::new();
    let Some(obj) = node.and_then(Value::as_object) else {
        return out;
    };
    for (id, value) in obj {
        let Some(arr) = value.as_array() else {
            continue;
        };
        let Some(name) = arr.first().and_then(Value::as_str) else {
            continue;
        };
        out.push(Variable {
            id: id.clone(),
            name: name.to_string(),
            initial: arr.get(1).map(scalar_text).unwrap_or_default(),
            kind,
        });
    }
    out
}

fn read_blocks(blocks_obj: &Map<String, Value>) -> BTreeMap<BlockId, Block> {
    let mut blocks = BTreeMap::new();
    let mut synthesized = Vec::new();
    for (id, raw) in blocks_obj {
        if let Some(obj) = raw.as_object() {
            let block = parse_block(id, obj, &mut synthesized);
            blocks.insert(id.clone(), block);
        } else if let Some(prim) = raw.as_array() {
            if let Some(block) = loose_reporter(id, prim) {
                blocks.insert(id.clone(), block);
            }
        }
    }
    for block in synthesized {
        blocks.entry(block.id.clone()).or_insert(block);
    }
    resolve_menu_shadows(&mut blocks);
    blocks
}

fn parse_block(id: &str, obj: &Map<String, Value>, synthesized: &mut Vec<Block>) -> Block {
    let opcode = obj.get("opcode").and_then(Value::as_str).unwrap_or("");
    let mut inputs = BTreeMap::new();
    if let Some(raw_inputs) = obj.get("inputs").and_then(Value::as_object) {
        for (slot, raw) in raw_inputs {
            if let Some(input) = decode_input(id, slot, raw, synthesized) {
                inputs.insert(slot.clone(), input);
            }
        }
    }
    let mut fields = BTreeMap::new();
    if let Some(raw_fields) = obj.get("fields").and_then(Value::as_object) {
        for (name, raw) in raw_fields {
            if let Some(field) = decode_field(raw) {
                fields.insert(name.clone(), field);
            }
        }
    }
    Block {
        id: id.to_string(),
        opcode: Opcode::new(opcode),
        inputs,
        fields,
        next: obj.get("next").and_then(Value::as_str).map(ToString::to_string),
        parent: obj.get("parent").and_then(Value::as_str).map(ToString::to_string),
        top_level: obj.get("topLevel").and_then(Value::as_bool).unwrap_or(false),
        shadow: obj.get("shadow").and_then(Value::as_bool).unwrap_or(false),
        x: obj.get("x").and_then(Value::as_f64),
        y: obj.get("y").and_then(Value::as_f64),
        proccode: obj
            .get("mutation")
            .and_then(|m| m.get("proccode"))
            .and_then(Value::as_str)
            .map(ToString::to_string),
    }
}

fn decode_input(
    owner: &str,
    slot: &str,
    raw: &Value,
    synthesized: &mut Vec<Block>,
) -> Option<InputValue> {
    // Older serializers store a bare block id.
    if let Some(block_id) = raw.as_str() {
        return Some(block_or_substack(slot, block_id));
    }
    let arr = raw.as_array()?;
    if arr.len() < 2 {
        return None;
    }
    match &arr[1] {
        Value::String(block_id) => Some(block_or_substack(slot, block_id)),
        Value::Array(prim) => match prim.first().and_then(Value::as_i64) {
            Some(12) | Some(13) => {
                let synth_id = format!("{}:{}", owner, slot);
                let block = inflate_reporter(&synth_id, prim, Some(owner))?;
                synthesized.push(block);
                Some(InputValue::Expression(synth_id))
            }
            _ => Literal::from_primitive(prim).map(InputValue::Literal),
        },
        _ => None,
    }
}

fn block_or_substack(slot: &str, block_id: &str) -> InputValue {
    if slot.starts_with("SUBSTACK") {
        InputValue::Substack(block_id.to_string())
    } else {
        InputValue::Expression(block_id.to_string())
    }
}

fn decode_field(raw: &Value) -> Option<FieldValue> {
    if let Some(s) = raw.as_str() {
        return Some(FieldValue {
            value: s.to_string(),
            id: None,
        });
    }
    let arr = raw.as_array()?;
    Some(FieldValue {
        value: scalar_text(arr.first()?),
        id: arr.get(1).and_then(Value::as_str).map(ToString::to_string),
    })
}

/// Top-level `[12, name, id, x, y]` entries in the blocks map.
fn loose_reporter(id: &str, prim: &[Value]) -> Option<Block> {
    let mut block = inflate_reporter(id, prim, None)?;
    block.top_level = true;
    block.x = prim.get(3).and_then(Value::as_f64);
    block.y = prim.get(4).and_then(Value::as_f64);
    Some(block)
}

fn inflate_reporter(id: &str, prim: &[Value], parent: Option<&str>) -> Option<Block> {
    let (opcode, field_name) = match prim.first()?.as_i64()? {
        12 => ("data_variable", VARIABLE_FIELD),
        13 => ("data_listcontents", LIST_FIELD),
        _ => return None,
    };
    let mut fields = BTreeMap::new();
    fields.insert(
        field_name.to_string(),
        FieldValue {
            value: scalar_text(prim.get(1)?),
            id: prim.get(2).and_then(Value::as_str).map(ToString::to_string),
        },
    );
    Some(Block {
        id: id.to_string(),
        opcode: Opcode::new(opcode),
        inputs: BTreeMap::new(),
        fields,
        next: None,
        parent: parent.map(ToString::to_string),
        top_level: false,
        shadow: false,
        x: None,
        y: None,
        proccode: None,
    })
}

/// Menu shadows (`motion_goto_menu`, the procedure prototype, ...) collapse
/// into a literal on the slot that holds them.
fn resolve_menu_shadows(blocks: &mut BTreeMap<BlockId, Block>) {
    let mut resolved: Vec<(BlockId, String, Literal)> = Vec::new();
    for (owner, block) in blocks.iter() {
        for (slot, input) in &block.inputs {
            let InputValue::Expression(target) = input else {
                continue;
            };
            let Some(shadow) = blocks.get(target).filter(|b| b.shadow) else {
                continue;
            };
            if let Some(lit) = shadow_literal(shadow) {
                resolved.push((owner.clone(), slot.clone(), lit));
            }
        }
    }
    for (owner, slot, lit) in resolved {
        if let Some(block) = blocks.get_mut(&owner) {
            block.inputs.insert(slot, InputValue::Literal(lit));
        }
    }
}

fn shadow_literal(shadow: &Block) -> Option<Literal> {
    if let Some(code) = &shadow.proccode {
        return Some(Literal::new(LiteralKind::Text, code.clone()));
    }
    if !shadow.inputs.is_empty() || shadow.fields.len() != 1 {
        return None;
    }
    let field = shadow.fields.values().next()?;
    Some(Literal::new(LiteralKind::Menu, field.value.clone()))
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n
            .as_f64()
            .map(format_num)
            .unwrap_or_else(|| n.to_string()),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub(crate) fn format_num(v: f64) -> String {
    if (v - v.round()).abs() < 1e-9 {
        format!("{}", v.round() as i64)
    } else {
        let s = format!("{:.6}", v);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn single_target(blocks: Value) -> Value {
        json!({
            "targets": [{
                "name": "Sprite1",
                "isStage": false,
                "variables": { "v1": ["score", 0], "v2": ["lives", "3"] },
                "blocks": blocks
            }]
        })
    }

    fn parse(doc: &Value) -> Program {
        Program::from_json(doc, Side::Submitted)
            .expect("document should parse")
            .program
    }

    #[test]
    fn missing_document_and_targets_are_input_errors() {
        let err = Program::from_json(&Value::Null, Side::Reference).unwrap_err();
        assert_eq!(err, GradeError::MissingProgram(Side::Reference));
        let err = Program::from_json(&json!({ "meta": {} }), Side::Submitted).unwrap_err();
        assert_eq!(err, GradeError::MissingTargets(Side::Submitted));
        assert!(err.is_input_error());
    }

    #[test]
    fn unreadable_target_is_skipped() {
        let doc = json!({ "targets": [42, { "name": "Stage", "isStage": true, "blocks": {} }] });
        let parsed = Program::from_json(&doc, Side::Submitted).unwrap();
        assert_eq!(parsed.program.targets.len(), 1);
        assert!(matches!(parsed.skipped[0], GradeError::InvalidTarget { index: 0, .. }));
    }

    #[test]
    fn variables_keep_document_order() {
        let program = parse(&single_target(json!({})));
        let names: Vec<_> = program.variables().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["score", "lives"]);
        assert_eq!(program.targets[0].variables[1].initial, "3");
    }

    #[test]
    fn inputs_decode_into_tagged_variants() {
        let program = parse(&single_target(json!({
            "a": {
                "opcode": "control_repeat", "next": null, "parent": null, "topLevel": true,
                "inputs": { "TIMES": [1, [6, "10"]], "SUBSTACK": [2, "b"] }, "fields": {}
            },
            "b": {
                "opcode": "motion_movesteps", "next": null, "parent": "a", "topLevel": false,
                "inputs": { "STEPS": [3, [12, "score", "v1"], [4, "10"]] }, "fields": {}
            }
        })));
        let target = &program.targets[0];
        let repeat = target.block("a").unwrap();
        assert_eq!(
            repeat.inputs["TIMES"],
            InputValue::Literal(Literal::new(LiteralKind::Number, "10"))
        );
        assert_eq!(repeat.inputs["SUBSTACK"], InputValue::Substack("b".to_string()));

        let steps = &target.block("b").unwrap().inputs["STEPS"];
        assert_eq!(*steps, InputValue::Expression("b:STEPS".to_string()));
        let reporter = target.block("b:STEPS").unwrap();
        assert_eq!(reporter.opcode.as_str(), "data_variable");
        assert_eq!(reporter.variable_ref().unwrap().id.as_deref(), Some("v1"));
    }

    #[test]
    fn menu_shadow_becomes_literal() {
        let program = parse(&single_target(json!({
            "go": {
                "opcode": "motion_goto", "next": null, "parent": null, "topLevel": true,
                "inputs": { "TO": [1, "menu"] }, "fields": {}
            },
            "menu": {
                "opcode": "motion_goto_menu", "next": null, "parent": "go", "topLevel": false,
                "shadow": true, "inputs": {}, "fields": { "TO": ["_mouse_", null] }
            }
        })));
        let go = program.targets[0].block("go").unwrap();
        assert_eq!(
            go.inputs["TO"],
            InputValue::Literal(Literal::new(LiteralKind::Menu, "_mouse_"))
        );
    }

    #[test]
    fn variable_field_is_a_reference_value() {
        let program = parse(&single_target(json!({
            "s": {
                "opcode": "data_setvariableto", "next": null, "parent": null, "topLevel": true,
                "inputs": { "VALUE": [1, [10, "0"]] }, "fields": { "VARIABLE": ["score", "v1"] }
            }
        })));
        let values = program.targets[0].block("s").unwrap().own_values();
        assert_eq!(values["VARIABLE"], Literal::new(LiteralKind::Reference, "v1"));
        assert_eq!(values["VALUE"].number(), Some(0.0));
    }

    #[test]
    fn rubric_literals_accept_plain_json() {
        let lits: Vec<Literal> = serde_json::from_str(r#"[10, "hello", "2.5"]"#).unwrap();
        assert_eq!(lits[0], Literal::new(LiteralKind::Number, "10"));
        assert_eq!(lits[1].kind, LiteralKind::Text);
        assert_eq!(lits[2].number(), Some(2.5));
    }

    #[test]
    fn lists_are_declared_and_referenced_like_variables() {
        let doc = json!({ "targets": [{
            "name": "Sprite1",
            "isStage": false,
            "variables": { "v1": ["score", 0] },
            "lists": { "l1": ["items", ["a", "b"]] },
            "blocks": {
                "add": {
                    "opcode": "data_addtolist", "next": null, "parent": null, "topLevel": true,
                    "inputs": { "ITEM": [3, [13, "items", "l1"], [10, ""]] },
                    "fields": { "LIST": ["items", "l1"] }
                }
            }
        }]});
        let program = parse(&doc);
        let target = &program.targets[0];
        assert_eq!(target.variables.len(), 2);
        assert_eq!(target.variables[1].kind, VariableKind::List);
        assert_eq!(target.variables[1].initial, r#"["a","b"]"#);

        let add = target.block("add").unwrap();
        assert_eq!(add.own_values()["LIST"], Literal::new(LiteralKind::Reference, "l1"));
        let contents = target.block("add:ITEM").unwrap();
        assert_eq!(contents.opcode.as_str(), "data_listcontents");
        assert_eq!(contents.variable_ref().unwrap().id.as_deref(), Some("l1"));
    }
}
