//! Checklist items a submission is graded against.
//!
//! Requirements are normally synthesized from the normalized reference
//! program; problem authors can also hand them in as JSON.

use crate::indexer::IndexedProgram;
use crate::opcode::Opcode;
use crate::project::Literal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requirement {
    pub opcode: Opcode,
    #[serde(default = "default_count")]
    pub expected_count: usize,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub expected_values: BTreeMap<String, Literal>,
    /// Position of the first occurrence inside `script`.
    #[serde(default)]
    pub order_rank: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nesting_context: Option<Opcode>,
    /// Originating script; order is only compared between requirements that share one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

fn default_count() -> usize {
    1
}

impl Requirement {
    pub fn new(opcode: impl Into<Opcode>, expected_count: usize) -> Self {
        Self {
            opcode: opcode.into(),
            expected_count,
            expected_values: BTreeMap::new(),
            order_rank: 0,
            nesting_context: None,
            script: None,
            weight: None,
        }
    }

    pub fn with_value(mut self, slot: &str, value: Literal) -> Self {
        self.expected_values.insert(slot.to_string(), value);
        self
    }

    pub fn ranked(mut self, script: usize, order_rank: usize) -> Self {
        self.script = Some(script);
        self.order_rank = order_rank;
        self
    }

    pub fn inside(mut self, context: impl Into<Opcode>) -> Self {
        self.nesting_context = Some(context.into());
        self
    }

    pub fn weighted(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn share_weight(&self) -> f64 {
        self.weight.filter(|w| w.is_finite() && *w > 0.0).unwrap_or(1.0)
    }
}

struct Tally {
    opcode: Opcode,
    count: usize,
    /// `None` marks a slot whose value differs between occurrences.
    values: BTreeMap<String, Option<Literal>>,
    context: Option<Opcode>,
    context_agrees: bool,
    script: usize,
    rank: usize,
}

/// One requirement per distinct opcode, in first-seen order.
pub fn extract_requirements(reference: &IndexedProgram) -> Vec<Requirement> {
    let mut tallies: Vec<Tally> = Vec::new();
    let mut by_opcode: BTreeMap<Opcode, usize> = BTreeMap::new();

    for occurrence in reference.occurrences() {
        let node = occurrence.node;
        let context = occurrence.context.cloned();
        let seen = by_opcode.get(&node.opcode).copied();
        let Some(slot) = seen else {
            by_opcode.insert(node.opcode.clone(), tallies.len());
            tallies.push(Tally {
                opcode: node.opcode.clone(),
                count: 1,
                values: node
                    .values
                    .iter()
                    .map(|(k, v)| (k.clone(), Some(v.clone())))
                    .collect(),
                context,
                context_agrees: true,
                script: occurrence.script,
                rank: occurrence.position,
            });
            continue;
        };

        let tally = &mut tallies[slot];
        tally.count += 1;
        for (name, expected) in tally.values.iter_mut() {
            let agrees = match (expected.as_ref(), node.values.get(name)) {
                (Some(a), Some(b)) => a.same_value(b),
                _ => false,
            };
            if !agrees {
                *expected = None;
            }
        }
        for name in node.values.keys() {
            tally.values.entry(name.clone()).or_insert(None);
        }
        if tally.context != context {
            tally.context_agrees = false;
        }
    }

    let requirements = tallies
        .into_iter()
        .map(|tally| Requirement {
            opcode: tally.opcode,
            expected_count: tally.count,
            expected_values: tally
                .values
                .into_iter()
                .filter_map(|(k, v)| v.map(|lit| (k, lit)))
                .collect(),
            order_rank: tally.rank,
            nesting_context: if tally.context_agrees { tally.context } else { None },
            script: Some(tally.script),
            weight: None,
        })
        .collect::<Vec<_>>();
    debug!(requirements = requirements.len(), "requirements extracted");
    requirements
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Side;
    use crate::indexer::index_program;
    use crate::project::{LiteralKind, Program};
    use serde_json::json;

    fn reference() -> IndexedProgram {
        let doc = json!({ "targets": [{ "name": "Cat", "isStage": false, "variables": {}, "blocks": {
            "hat": { "opcode": "event_whenflagclicked", "next": "rep", "parent": null, "topLevel": true, "inputs": {}, "fields": {} },
            "rep": { "opcode": "control_repeat", "next": null, "parent": "hat", "topLevel": false,
                     "inputs": { "TIMES": [1, [6, "10"]], "SUBSTACK": [2, "m1"] }, "fields": {} },
            "m1": { "opcode": "motion_movesteps", "next": "t", "parent": "rep", "topLevel": false,
                    "inputs": { "STEPS": [1, [4, "10"]] }, "fields": {} },
            "t": { "opcode": "motion_turnright", "next": "m2", "parent": "m1", "topLevel": false,
                   "inputs": { "DEGREES": [1, [4, "15"]] }, "fields": {} },
            "m2": { "opcode": "motion_movesteps", "next": "t2", "parent": "t", "topLevel": false,
                    "inputs": { "STEPS": [1, [4, "10.0"]] }, "fields": {} },
            "t2": { "opcode": "motion_turnright", "next": null, "parent": "m2", "topLevel": false,
                   "inputs": { "DEGREES": [1, [4, "30"]] }, "fields": {} }
        }}]});
        let program = Program::from_json(&doc, Side::Reference).unwrap().program;
        index_program(&program, 64).0
    }

    #[test]
    fn one_requirement_per_opcode_with_counts_and_ranks() {
        let reqs = extract_requirements(&reference());
        let summary: Vec<_> = reqs
            .iter()
            .map(|r| (r.opcode.as_str(), r.expected_count, r.order_rank))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("event_whenflagclicked", 1, 0),
                ("control_repeat", 1, 1),
                ("motion_movesteps", 2, 2),
                ("motion_turnright", 2, 3),
            ]
        );
        assert!(reqs.iter().all(|r| r.script == Some(0)));
    }

    #[test]
    fn only_values_shared_by_every_occurrence_are_expected() {
        let reqs = extract_requirements(&reference());
        let steps = &reqs[2].expected_values;
        assert!(steps["STEPS"].same_value(&Literal::new(LiteralKind::Number, "10")));
        assert!(reqs[3].expected_values.is_empty());
        assert_eq!(reqs[1].expected_values["TIMES"].text, "10");
    }

    #[test]
    fn nesting_context_is_recorded_when_consistent() {
        let reqs = extract_requirements(&reference());
        assert_eq!(reqs[2].nesting_context.as_ref().map(Opcode::as_str), Some("control_repeat"));
        assert_eq!(reqs[1].nesting_context, None);
    }

    #[test]
    fn curated_rubric_parses_with_defaults() {
        let reqs: Vec<Requirement> = serde_json::from_str(
            r#"[{ "opcode": "motion_movesteps", "expectedValues": { "STEPS": 10 }, "weight": 2 },
                { "opcode": "control_repeat", "expectedCount": 1, "orderRank": 0, "script": 0 }]"#,
        )
        .unwrap();
        assert_eq!(reqs[0].expected_count, 1);
        assert_eq!(reqs[0].share_weight(), 2.0);
        assert_eq!(reqs[0].expected_values["STEPS"].number(), Some(10.0));
        assert_eq!(reqs[1].script, Some(0));
        assert_eq!(reqs[1].share_weight(), 1.0);
    }
}
