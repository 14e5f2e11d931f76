//! Rewrites variable identities through a [`VariableMapping`].
//!
//! Both programs pass through here (the reference with the identity mapping),
//! so later stages never need to know which side they are looking at.

use crate::indexer::{IndexedProgram, IndexedTarget, Script, ScriptNode};
use crate::mapper::VariableMapping;
use crate::project::{Literal, LiteralKind, Variable};

pub fn normalize(program: &IndexedProgram, mapping: &VariableMapping) -> IndexedProgram {
    IndexedProgram {
        targets: program
            .targets
            .iter()
            .map(|target| normalize_target(target, mapping))
            .collect(),
    }
}

fn normalize_target(target: &IndexedTarget, mapping: &VariableMapping) -> IndexedTarget {
    IndexedTarget {
        name: target.name.clone(),
        is_stage: target.is_stage,
        variables: target
            .variables
            .iter()
            .map(|var| match mapping.resolve(&var.id) {
                Some(mapped) => Variable {
                    id: mapped.id.clone(),
                    name: mapped.name.clone(),
                    ..var.clone()
                },
                None => var.clone(),
            })
            .collect(),
        scripts: target
            .scripts
            .iter()
            .map(|script| Script {
                ordinal: script.ordinal,
                body: normalize_chain(&script.body, mapping),
            })
            .collect(),
    }
}

fn normalize_chain(chain: &[ScriptNode], mapping: &VariableMapping) -> Vec<ScriptNode> {
    chain.iter().map(|node| normalize_node(node, mapping)).collect()
}

fn normalize_node(node: &ScriptNode, mapping: &VariableMapping) -> ScriptNode {
    let mut values = node.values.clone();
    if let Some((field, mapped)) = node
        .variable_ref()
        .and_then(|(field, id)| Some((field, mapping.resolve(id)?)))
    {
        values.insert(
            field.to_string(),
            Literal::new(LiteralKind::Reference, mapped.id.clone()),
        );
    }
    ScriptNode {
        id: node.id.clone(),
        opcode: node.opcode.clone(),
        values,
        expressions: node
            .expressions
            .iter()
            .map(|(slot, expr)| (slot.clone(), normalize_node(expr, mapping)))
            .collect(),
        substacks: node
            .substacks
            .iter()
            .map(|(slot, body)| (slot.clone(), normalize_chain(body, mapping)))
            .collect(),
    }
}
