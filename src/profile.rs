//! Name-free usage fingerprints for variables.

use crate::indexer::IndexedProgram;
use crate::opcode::{Opcode, UsageKind};
use crate::project::VariableKind;
use std::collections::HashMap;

/// Where a usage happened: script ordinal plus pre-order position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PositionHint {
    pub script: usize,
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UsageEvent {
    pub kind: UsageKind,
    pub opcode: Opcode,
    pub position_hint: PositionHint,
}

/// Every use of one variable, in program order. `declared_name` is carried
/// for reporting only and never enters similarity.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableUsageProfile {
    pub id: String,
    pub declared_name: String,
    pub kind: VariableKind,
    pub usages: Vec<UsageEvent>,
}

impl VariableUsageProfile {
    pub fn count(&self, kind: UsageKind) -> usize {
        self.usages.iter().filter(|u| u.kind == kind).count()
    }
}

/// One profile per declared variable, in declaration order (stage first).
pub fn profile_variables(program: &IndexedProgram) -> Vec<VariableUsageProfile> {
    let mut profiles: Vec<VariableUsageProfile> = Vec::new();
    let mut by_id: HashMap<String, usize> = HashMap::new();
    for var in program.variables() {
        if by_id.contains_key(&var.id) {
            continue;
        }
        by_id.insert(var.id.clone(), profiles.len());
        profiles.push(VariableUsageProfile {
            id: var.id.clone(),
            declared_name: var.name.clone(),
            kind: var.kind,
            usages: Vec::new(),
        });
    }

    for occurrence in program.occurrences() {
        let node = occurrence.node;
        let Some(kind) = node.opcode.usage() else {
            continue;
        };
        let Some(slot) = node.variable_id().and_then(|id| by_id.get(id)) else {
            continue;
        };
        profiles[*slot].usages.push(UsageEvent {
            kind,
            opcode: node.opcode.clone(),
            position_hint: PositionHint {
                script: occurrence.script,
                position: occurrence.position,
            },
        });
    }
    profiles
}
