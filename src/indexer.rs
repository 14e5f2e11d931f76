//! Turns a target's flat block map into ordered scripts.
//!
//! A script is the `next` chain hanging off a top-level block. C-block bodies
//! are indexed recursively into [`ScriptNode::substacks`]; reporters stay
//! attached to the slot that holds them in [`ScriptNode::expressions`].

use crate::error::{GradeError, Result};
use crate::opcode::{Opcode, REFERENCE_FIELDS};
use crate::project::{Block, InputValue, Literal, LiteralKind, Program, Target, Variable};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct ScriptNode {
    pub id: String,
    pub opcode: Opcode,
    pub values: BTreeMap<String, Literal>,
    pub expressions: BTreeMap<String, ScriptNode>,
    pub substacks: BTreeMap<String, Vec<ScriptNode>>,
}

impl ScriptNode {
    /// Field slot and id of the variable or list this block names.
    pub fn variable_ref(&self) -> Option<(&'static str, &str)> {
        REFERENCE_FIELDS.iter().find_map(|&field| {
            self.values
                .get(field)
                .filter(|lit| lit.kind == LiteralKind::Reference)
                .map(|lit| (field, lit.text.as_str()))
        })
    }

    pub fn variable_id(&self) -> Option<&str> {
        self.variable_ref().map(|(_, id)| id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    /// Program-wide script number, stable across normalization.
    pub ordinal: usize,
    pub body: Vec<ScriptNode>,
}

/// One block visited by [`Script::walk`].
#[derive(Debug, Clone, Copy)]
pub struct Occurrence<'a> {
    pub node: &'a ScriptNode,
    pub script: usize,
    /// Pre-order index inside the script.
    pub position: usize,
    /// Opcode of the nearest C-block whose body contains this block.
    pub context: Option<&'a Opcode>,
}

impl Script {
    /// Pre-order walk: a statement, then its reporters, then its bodies.
    pub fn walk(&self) -> Vec<Occurrence<'_>> {
        let mut out = Vec::new();
        walk_chain(&self.body, self.ordinal, None, &mut out);
        out
    }
}

fn walk_chain<'a>(
    chain: &'a [ScriptNode],
    script: usize,
    context: Option<&'a Opcode>,
    out: &mut Vec<Occurrence<'a>>,
) {
    for node in chain {
        walk_node(node, script, context, out);
    }
}

fn walk_node<'a>(
    node: &'a ScriptNode,
    script: usize,
    context: Option<&'a Opcode>,
    out: &mut Vec<Occurrence<'a>>,
) {
    out.push(Occurrence {
        node,
        script,
        position: out.len(),
        context,
    });
    for expr in node.expressions.values() {
        walk_node(expr, script, context, out);
    }
    for body in node.substacks.values() {
        walk_chain(body, script, Some(&node.opcode), out);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexedTarget {
    pub name: String,
    pub is_stage: bool,
    pub variables: Vec<Variable>,
    pub scripts: Vec<Script>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct IndexedProgram {
    pub targets: Vec<IndexedTarget>,
}

impl IndexedProgram {
    pub fn scripts(&self) -> impl Iterator<Item = &Script> {
        self.targets.iter().flat_map(|t| t.scripts.iter())
    }

    pub fn occurrences(&self) -> Vec<Occurrence<'_>> {
        self.scripts().flat_map(Script::walk).collect()
    }

    /// Declared variables, stage first, in document order.
    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        let stage = self.targets.iter().filter(|t| t.is_stage);
        let sprites = self.targets.iter().filter(|t| !t.is_stage);
        stage.chain(sprites).flat_map(|t| t.variables.iter())
    }
}

/// Indexes every target, skipping the ones whose block graph is malformed.
pub fn index_program(program: &Program, max_depth: usize) -> (IndexedProgram, Vec<GradeError>) {
    let mut indexed = IndexedProgram::default();
    let mut skipped = Vec::new();
    let mut next_ordinal = 0usize;
    for target in &program.targets {
        match index_target(target, max_depth, next_ordinal) {
            Ok(t) => {
                next_ordinal += t.scripts.len();
                indexed.targets.push(t);
            }
            Err(err) => {
                warn!(target = %target.name, error = %err, "skipping malformed target");
                skipped.push(err);
            }
        }
    }
    (indexed, skipped)
}

pub fn index_target(target: &Target, max_depth: usize, first_ordinal: usize) -> Result<IndexedTarget> {
    let mut roots = target
        .blocks
        .values()
        .filter(|b| b.top_level && !b.shadow)
        .collect::<Vec<_>>();
    roots.sort_by_key(|b| block_sort_key(b));

    let mut indexer = Indexer {
        target,
        visited: HashSet::new(),
        max_depth,
    };
    let mut scripts = Vec::with_capacity(roots.len());
    for (i, root) in roots.into_iter().enumerate() {
        let body = indexer.chain(Some(root.id.as_str()), 0)?;
        scripts.push(Script {
            ordinal: first_ordinal + i,
            body,
        });
    }
    debug!(target = %target.name, scripts = scripts.len(), "target indexed");
    Ok(IndexedTarget {
        name: target.name.clone(),
        is_stage: target.is_stage,
        variables: target.variables.clone(),
        scripts,
    })
}

fn block_sort_key(block: &Block) -> (i64, i64, String) {
    let y = block.y.map(|v| v.round() as i64).unwrap_or(i64::MAX);
    let x = block.x.map(|v| v.round() as i64).unwrap_or(i64::MAX);
    (y, x, block.id.clone())
}

struct Indexer<'a> {
    target: &'a Target,
    visited: HashSet<&'a str>,
    max_depth: usize,
}

impl<'a> Indexer<'a> {
    fn chain(&mut self, start: Option<&'a str>, depth: usize) -> Result<Vec<ScriptNode>> {
        let target = self.target;
        let mut nodes = Vec::new();
        let mut current = start;
        while let Some(id) = current {
            let Some(block) = target.block(id) else {
                warn!(target = %target.name, block = id, "chain points at a missing block");
                break;
            };
            nodes.push(self.node(block, depth)?);
            current = block.next.as_deref();
        }
        Ok(nodes)
    }

    fn node(&mut self, block: &'a Block, depth: usize) -> Result<ScriptNode> {
        if depth > self.max_depth {
            return Err(self.malformed(block, format!("nesting deeper than {}", self.max_depth)));
        }
        if !self.visited.insert(block.id.as_str()) {
            return Err(self.malformed(block, "block reached twice (cyclic chain)".to_string()));
        }

        let target = self.target;
        let mut expressions = BTreeMap::new();
        let mut substacks = BTreeMap::new();
        for (slot, input) in &block.inputs {
            match input {
                InputValue::Literal(_) => {}
                InputValue::Expression(id) => match target.block(id) {
                    Some(child) => {
                        expressions.insert(slot.clone(), self.node(child, depth + 1)?);
                    }
                    None => {
                        warn!(target = %target.name, block = %id, "input points at a missing block")
                    }
                },
                InputValue::Substack(id) => {
                    substacks.insert(slot.clone(), self.chain(Some(id.as_str()), depth + 1)?);
                }
            }
        }

        Ok(ScriptNode {
            id: block.id.clone(),
            opcode: block.opcode.clone(),
            values: block.own_values(),
            expressions,
            substacks,
        })
    }

    fn malformed(&self, block: &Block, reason: String) -> GradeError {
        GradeError::MalformedGraph {
            target: self.target.name.clone(),
            block: block.id.clone(),
            reason,
        }
    }
}
