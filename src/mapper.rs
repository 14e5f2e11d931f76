//! Matches submitted variables to reference variables by usage fingerprint.
//!
//! The default policy is greedy: all candidate pairs are ranked by similarity
//! and claimed highest first, each reference variable at most once. It is not
//! an optimal assignment. When [`GradingOptions::exact_matching`] is set and
//! the reference is small, a maximum-total-similarity assignment is computed
//! instead, as long as the reference stays under [`EXACT_MATCHING_CEILING`].
//!
//! Lists only ever pair with lists and scalars with scalars.

use crate::indexer::IndexedProgram;
use crate::options::GradingOptions;
use crate::profile::VariableUsageProfile;
use crate::opcode::UsageKind;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableRef {
    pub id: String,
    pub name: String,
}

/// Partial injective map from submitted variable ids to reference variables.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VariableMapping {
    pub pairs: BTreeMap<String, VariableRef>,
    /// Submitted ids with no counterpart, in declaration order.
    pub unmatched_submitted: Vec<VariableRef>,
    /// Reference ids nobody claimed, in declaration order.
    pub unmatched_reference: Vec<VariableRef>,
    /// Unmatched submitted ids that are also reference ids, moved to a fresh
    /// id so they cannot stand in for the reference variable.
    pub displaced: BTreeMap<String, VariableRef>,
}

impl VariableMapping {
    /// Maps every declared variable onto itself.
    pub fn identity(program: &IndexedProgram) -> Self {
        let mut mapping = VariableMapping::default();
        for var in program.variables() {
            mapping.pairs.entry(var.id.clone()).or_insert_with(|| VariableRef {
                id: var.id.clone(),
                name: var.name.clone(),
            });
        }
        mapping
    }

    pub fn get(&self, submitted_id: &str) -> Option<&VariableRef> {
        self.pairs.get(submitted_id)
    }

    /// The identity `submitted_id` takes after normalization, if it changes.
    pub fn resolve(&self, submitted_id: &str) -> Option<&VariableRef> {
        self.pairs
            .get(submitted_id)
            .or_else(|| self.displaced.get(submitted_id))
    }
}

/// Largest reference the exact DP will take on, whatever the configured
/// limit says. The state table grows as `2^n`.
pub const EXACT_MATCHING_CEILING: usize = 16;

pub fn map_variables(
    submitted: &[VariableUsageProfile],
    reference: &[VariableUsageProfile],
    options: &GradingOptions,
) -> VariableMapping {
    let scores = submitted
        .iter()
        .map(|s| {
            reference
                .iter()
                .map(|r| {
                    if s.kind == r.kind {
                        similarity(s, r, options)
                    } else {
                        f64::NEG_INFINITY
                    }
                })
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    let limit = options.exact_matching_limit.min(EXACT_MATCHING_CEILING);
    let exact = options.exact_matching && reference.len() <= limit;
    if options.exact_matching && !exact {
        debug!(
            reference = reference.len(),
            limit, "reference too large for exact matching, using greedy"
        );
    }
    let assignment = if exact {
        exact_assignment(&scores, options.min_similarity)
    } else {
        greedy_assignment(&scores, options.min_similarity)
    };

    let reference_ids: BTreeSet<&str> = reference.iter().map(|r| r.id.as_str()).collect();
    let submitted_ids: BTreeSet<&str> = submitted.iter().map(|s| s.id.as_str()).collect();
    let taken = |id: &str| reference_ids.contains(id) || submitted_ids.contains(id);

    let mut mapping = VariableMapping::default();
    let mut claimed = vec![false; reference.len()];
    for (i, sub) in submitted.iter().enumerate() {
        match assignment[i] {
            Some(j) => {
                claimed[j] = true;
                mapping.pairs.insert(sub.id.clone(), profile_ref(&reference[j]));
            }
            None => {
                if reference_ids.contains(sub.id.as_str()) {
                    let moved = VariableRef {
                        id: displaced_id(&sub.id, &taken),
                        name: sub.declared_name.clone(),
                    };
                    mapping.displaced.insert(sub.id.clone(), moved);
                }
                mapping.unmatched_submitted.push(profile_ref(sub));
            }
        }
    }
    for (j, reference_var) in reference.iter().enumerate() {
        if !claimed[j] {
            mapping.unmatched_reference.push(profile_ref(reference_var));
        }
    }
    debug!(
        matched = mapping.pairs.len(),
        unmatched_submitted = mapping.unmatched_submitted.len(),
        unmatched_reference = mapping.unmatched_reference.len(),
        displaced = mapping.displaced.len(),
        exact,
        "variables mapped"
    );
    mapping
}

fn displaced_id(id: &str, taken: &dyn Fn(&str) -> bool) -> String {
    let mut candidate = format!("submitted:{}", id);
    while taken(&candidate) {
        candidate.insert(0, '_');
    }
    candidate
}

fn profile_ref(profile: &VariableUsageProfile) -> VariableRef {
    VariableRef {
        id: profile.id.clone(),
        name: profile.declared_name.clone(),
    }
}

/// Weighted agreement of two fingerprints, in `[0, 1]`.
pub fn similarity(a: &VariableUsageProfile, b: &VariableUsageProfile, options: &GradingOptions) -> f64 {
    let count = UsageKind::ALL
        .iter()
        .map(|&kind| agreement(a.count(kind), b.count(kind)))
        .sum::<f64>()
        / UsageKind::ALL.len() as f64;

    let longest = a.usages.len().max(b.usages.len());
    let positional = |same: &dyn Fn(usize) -> bool| {
        if longest == 0 {
            return 1.0;
        }
        let shorter = a.usages.len().min(b.usages.len());
        (0..shorter).filter(|&i| same(i)).count() as f64 / longest as f64
    };
    let opcode = positional(&|i| a.usages[i].opcode == b.usages[i].opcode);
    let position = positional(&|i| a.usages[i].position_hint == b.usages[i].position_hint);

    let total = options.count_weight + options.opcode_weight + options.position_weight;
    if total <= 0.0 {
        return count;
    }
    (options.count_weight * count + options.opcode_weight * opcode + options.position_weight * position)
        / total
}

fn agreement(a: usize, b: usize) -> f64 {
    let max = a.max(b);
    if max == 0 {
        return 1.0;
    }
    1.0 - (a.abs_diff(b) as f64 / max as f64)
}

fn greedy_assignment(scores: &[Vec<f64>], min_similarity: f64) -> Vec<Option<usize>> {
    let mut candidates = Vec::new();
    for (i, row) in scores.iter().enumerate() {
        for (j, &score) in row.iter().enumerate() {
            if score >= min_similarity {
                candidates.push((score, i, j));
            }
        }
    }
    // Highest similarity first; ties go to the earlier declarations.
    candidates.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

    let width = scores.first().map(Vec::len).unwrap_or(0);
    let mut assignment = vec![None; scores.len()];
    let mut taken = vec![false; width];
    for (_, i, j) in candidates {
        if assignment[i].is_none() && !taken[j] {
            assignment[i] = Some(j);
            taken[j] = true;
        }
    }
    assignment
}

/// Maximum total similarity via DP over the set of claimed reference ids.
fn exact_assignment(scores: &[Vec<f64>], min_similarity: f64) -> Vec<Option<usize>> {
    const EPS: f64 = 1e-12;
    let rows = scores.len();
    let width = scores.first().map(Vec::len).unwrap_or(0);
    let states = 1usize << width;

    // best[i][mask]: best total for submitted rows i.. given claimed `mask`.
    let mut best = vec![vec![0.0f64; states]; rows + 1];
    let mut choice = vec![vec![None; states]; rows];
    for i in (0..rows).rev() {
        for mask in 0..states {
            let mut value = best[i + 1][mask];
            let mut pick = None;
            for j in 0..width {
                let score = scores[i][j];
                if mask & (1 << j) != 0 || score < min_similarity {
                    continue;
                }
                let candidate = score + best[i + 1][mask | (1 << j)];
                if candidate > value + EPS {
                    value = candidate;
                    pick = Some(j);
                }
            }
            best[i][mask] = value;
            choice[i][mask] = pick;
        }
    }

    let mut assignment = vec![None; rows];
    let mut mask = 0usize;
    for (i, slot) in assignment.iter_mut().enumerate() {
        if let Some(j) = choice[i][mask] {
            *slot = Some(j);
            mask |= 1 << j;
        }
    }
    assignment
}
