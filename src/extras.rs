//! Blocks and variables in the submission that nothing asked for.

use crate::indexer::IndexedProgram;
use crate::mapper::{VariableMapping, VariableRef};
use crate::opcode::Opcode;
use crate::requirements::Requirement;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, PartialEq)]
pub struct ExtraBlock {
    pub opcode: Opcode,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtraElements {
    /// Grouped by opcode, in the order they first appear in the submission.
    pub blocks: Vec<ExtraBlock>,
    pub variables: Vec<VariableRef>,
}

impl ExtraElements {
    pub fn block_count(&self) -> usize {
        self.blocks.iter().map(|b| b.count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty() && self.variables.is_empty()
    }
}

/// A block is extra when neither a requirement nor the reference program
/// uses its opcode. Surplus copies of a required block are left to the
/// count check.
pub fn detect_extras(
    requirements: &[Requirement],
    reference: &IndexedProgram,
    submission: &IndexedProgram,
    mapping: &VariableMapping,
) -> ExtraElements {
    let reference_occurrences = reference.occurrences();
    let covered = requirements
        .iter()
        .map(|r| &r.opcode)
        .chain(reference_occurrences.iter().map(|o| &o.node.opcode))
        .collect::<BTreeSet<_>>();

    let mut blocks: Vec<ExtraBlock> = Vec::new();
    let mut slots: HashMap<&Opcode, usize> = HashMap::new();
    for occ in submission.occurrences() {
        let opcode = &occ.node.opcode;
        if covered.contains(opcode) {
            continue;
        }
        match slots.get(opcode) {
            Some(&i) => blocks[i].count += 1,
            None => {
                slots.insert(opcode, blocks.len());
                blocks.push(ExtraBlock {
                    opcode: opcode.clone(),
                    count: 1,
                });
            }
        }
    }

    ExtraElements {
        blocks,
        variables: mapping.unmatched_submitted.clone(),
    }
}
