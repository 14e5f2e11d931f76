//! Evaluates requirements against the normalized submission.

use crate::indexer::{IndexedProgram, Occurrence};
use crate::opcode::Opcode;
use crate::options::GradingOptions;
use crate::project::{Literal, LiteralKind};
use crate::requirements::Requirement;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MismatchSeverity {
    /// Close to the expected value ("slightly off").
    Minor,
    Major,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckStatus {
    Satisfied,
    Missing,
    CountMismatch {
        expected: usize,
        found: usize,
    },
    ValueMismatch {
        slot: String,
        expected: Literal,
        /// `None` when the slot holds a reporter or is empty.
        found: Option<Literal>,
        severity: MismatchSeverity,
    },
    /// Present, but never inside the required enclosing block.
    Misplaced {
        expected_context: Opcode,
        found: usize,
    },
    OrderViolation {
        expected_after: Opcode,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckResult {
    pub requirement: Requirement,
    pub status: CheckStatus,
    pub detail: String,
}

impl CheckResult {
    pub fn is_satisfied(&self) -> bool {
        self.status == CheckStatus::Satisfied
    }
}

/// Block checks (one result per requirement) followed by order violations.
pub fn check(
    requirements: &[Requirement],
    submission: &IndexedProgram,
    options: &GradingOptions,
) -> Vec<CheckResult> {
    let occurrences = submission.occurrences();
    let mut by_opcode: BTreeMap<&Opcode, Vec<&Occurrence<'_>>> = BTreeMap::new();
    for occ in &occurrences {
        by_opcode.entry(&occ.node.opcode).or_default().push(occ);
    }

    let mut results = requirements
        .iter()
        .map(|req| {
            let found = by_opcode.get(&req.opcode).map(Vec::as_slice).unwrap_or(&[]);
            check_block(req, found, options)
        })
        .collect::<Vec<_>>();
    results.extend(check_order(requirements, &by_opcode));
    results
}

fn check_block(req: &Requirement, found: &[&Occurrence<'_>], options: &GradingOptions) -> CheckResult {
    let result = |status: CheckStatus, detail: String| CheckResult {
        requirement: req.clone(),
        status,
        detail,
    };

    if found.is_empty() {
        if req.expected_count == 0 {
            return result(CheckStatus::Satisfied, String::new());
        }
        return result(
            CheckStatus::Missing,
            format!("expected {} '{}' block(s), found none", req.expected_count, req.opcode),
        );
    }

    let in_context = match &req.nesting_context {
        Some(ctx) => found
            .iter()
            .filter(|occ| occ.context == Some(ctx))
            .copied()
            .collect::<Vec<_>>(),
        None => found.to_vec(),
    };

    if let Some(ctx) = &req.nesting_context {
        if in_context.is_empty() {
            return result(
                CheckStatus::Misplaced {
                    expected_context: ctx.clone(),
                    found: found.len(),
                },
                format!("'{}' found {} time(s), none inside '{}'", req.opcode, found.len(), ctx),
            );
        }
    }

    if in_context.len() != req.expected_count {
        return result(
            CheckStatus::CountMismatch {
                expected: req.expected_count,
                found: in_context.len(),
            },
            format!(
                "expected {} '{}' block(s), found {}",
                req.expected_count,
                req.opcode,
                in_context.len()
            ),
        );
    }

    let mut worst: Option<(MismatchSeverity, &String, &Literal, Option<&Literal>)> = None;
    for (slot, expected) in &req.expected_values {
        for occ in &in_context {
            let actual = occ.node.values.get(slot);
            let Some(severity) = compare_values(expected, actual, options) else {
                continue;
            };
            if worst.map_or(true, |(w, ..)| severity > w) {
                worst = Some((severity, slot, expected, actual));
            }
        }
    }

    match worst {
        Some((severity, slot, expected, actual)) => result(
            CheckStatus::ValueMismatch {
                slot: slot.clone(),
                expected: expected.clone(),
                found: actual.cloned(),
                severity,
            },
            format!(
                "'{}' slot {} expected {}, found {}",
                req.opcode,
                slot,
                expected.text,
                actual.map(|lit| lit.text.as_str()).unwrap_or("a reporter")
            ),
        ),
        None => result(CheckStatus::Satisfied, String::new()),
    }
}

/// `None` when the values agree; otherwise how far off the submission is.
pub fn compare_values(
    expected: &Literal,
    actual: Option<&Literal>,
    options: &GradingOptions,
) -> Option<MismatchSeverity> {
    let Some(actual) = actual else {
        return Some(MismatchSeverity::Major);
    };
    if expected.same_value(actual) {
        return None;
    }
    if expected.kind == LiteralKind::Reference || actual.kind == LiteralKind::Reference {
        return Some(MismatchSeverity::Major);
    }
    let severity = match (expected.number(), actual.number()) {
        (Some(e), Some(a)) => {
            let relative = (e - a).abs() / e.abs().max(1.0);
            if relative <= options.minor_relative_tolerance {
                MismatchSeverity::Minor
            } else {
                MismatchSeverity::Major
            }
        }
        (None, None) if loosely_equal(&expected.text, &actual.text) => MismatchSeverity::Minor,
        _ => MismatchSeverity::Major,
    };
    Some(severity)
}

fn loosely_equal(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

fn check_order(
    requirements: &[Requirement],
    by_opcode: &BTreeMap<&Opcode, Vec<&Occurrence<'_>>>,
) -> Vec<CheckResult> {
    let first = |op: &Opcode| by_opcode.get(op).and_then(|occs| occs.first()).map(|o| (o.script, o.position));

    let mut violations = Vec::new();
    for (i, a) in requirements.iter().enumerate() {
        for b in &requirements[i + 1..] {
            if a.script.is_none() || a.script != b.script || a.order_rank == b.order_rank {
                continue;
            }
            let (earlier, later) = if a.order_rank < b.order_rank { (a, b) } else { (b, a) };
            let (Some(e), Some(l)) = (first(&earlier.opcode), first(&later.opcode)) else {
                continue;
            };
            if e.0 == l.0 && e.1 > l.1 {
                violations.push(CheckResult {
                    requirement: later.clone(),
                    status: CheckStatus::OrderViolation {
                        expected_after: earlier.opcode.clone(),
                    },
                    detail: format!("'{}' should come after '{}'", later.opcode, earlier.opcode),
                });
            }
        }
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Side;
    use crate::indexer::index_program;
    use crate::project::Program;
    use serde_json::{json, Value};

    fn submission(blocks: Value) -> IndexedProgram {
        let doc = json!({ "targets": [{ "name": "Cat", "isStage": false, "variables": {}, "blocks": blocks }] });
        let program = Program::from_json(&doc, Side::Submitted).unwrap().program;
        index_program(&program, 64).0
    }

    fn num(text: &str) -> Literal {
        Literal::new(LiteralKind::Number, text)
    }

    fn moves(steps: &str) -> IndexedProgram {
        submission(json!({
            "mv": { "opcode": "motion_movesteps", "next": null, "parent": null, "topLevel": true,
                    "inputs": { "STEPS": [1, [4, steps]] }, "fields": {} }
        }))
    }

    fn status_for(reqs: &[Requirement], program: &IndexedProgram) -> Vec<CheckStatus> {
        check(reqs, program, &GradingOptions::default())
            .into_iter()
            .map(|r| r.status)
            .collect()
    }

    #[test]
    fn exact_values_are_satisfied() {
        let req = Requirement::new("motion_movesteps", 1).with_value("STEPS", num("10"));
        assert_eq!(status_for(&[req], &moves("10.0")), vec![CheckStatus::Satisfied]);
    }

    #[test]
    fn missing_and_count_mismatch() {
        let reqs = [
            Requirement::new("control_repeat", 1),
            Requirement::new("motion_movesteps", 2),
        ];
        assert_eq!(
            status_for(&reqs, &moves("10")),
            vec![
                CheckStatus::Missing,
                CheckStatus::CountMismatch { expected: 2, found: 1 }
            ]
        );
    }

    #[test]
    fn small_numeric_drift_is_minor_and_large_is_major() {
        let opts = GradingOptions::default();
        let expected = num("10");
        assert_eq!(compare_values(&expected, Some(&num("11")), &opts), Some(MismatchSeverity::Minor));
        assert_eq!(compare_values(&expected, Some(&num("100")), &opts), Some(MismatchSeverity::Major));
        assert_eq!(compare_values(&expected, None, &opts), Some(MismatchSeverity::Major));
        let hello = Literal::new(LiteralKind::Text, "Hello");
        assert_eq!(
            compare_values(&hello, Some(&Literal::new(LiteralKind::Text, " hello")), &opts),
            Some(MismatchSeverity::Minor)
        );
        assert_eq!(
            compare_values(&hello, Some(&Literal::new(LiteralKind::Text, "bye")), &opts),
            Some(MismatchSeverity::Major)
        );
    }

    #[test]
    fn severity_never_drops_as_the_gap_grows() {
        let opts = GradingOptions::default();
        let expected = num("10");
        let mut last = None;
        for step in 0..200 {
            let actual = num(&format!("{}", 10.0 + step as f64 * 0.25));
            let severity = compare_values(&expected, Some(&actual), &opts);
            assert!(severity >= last, "severity dropped at {}", step);
            last = severity;
        }
        assert_eq!(last, Some(MismatchSeverity::Major));
    }

    #[test]
    fn value_mismatch_reports_worst_occurrence() {
        let program = submission(json!({
            "a": { "opcode": "motion_movesteps", "next": "b", "parent": null, "topLevel": true,
                   "inputs": { "STEPS": [1, [4, "11"]] }, "fields": {} },
            "b": { "opcode": "motion_movesteps", "next": null, "parent": "a", "topLevel": false,
                   "inputs": { "STEPS": [1, [4, "90"]] }, "fields": {} }
        }));
        let req = Requirement::new("motion_movesteps", 2).with_value("STEPS", num("10"));
        let results = check(&[req], &program, &GradingOptions::default());
        match &results[0].status {
            CheckStatus::ValueMismatch { severity, found, .. } => {
                assert_eq!(*severity, MismatchSeverity::Major);
                assert_eq!(found.as_ref().map(|l| l.text.as_str()), Some("90"));
            }
            other => panic!("unexpected status {:?}", other),
        }
    }

    #[test]
    fn block_outside_required_loop_is_misplaced() {
        let req = Requirement::new("motion_movesteps", 1).inside("control_repeat");
        assert_eq!(
            status_for(&[req], &moves("10")),
            vec![CheckStatus::Misplaced {
                expected_context: Opcode::from("control_repeat"),
                found: 1
            }]
        );
    }

    #[test]
    fn reversed_blocks_violate_order() {
        let program = submission(json!({
            "a": { "opcode": "looks_hide", "next": "b", "parent": null, "topLevel": true, "inputs": {}, "fields": {} },
            "b": { "opcode": "looks_show", "next": null, "parent": "a", "topLevel": false, "inputs": {}, "fields": {} }
        }));
        let reqs = [
            Requirement::new("looks_show", 1).ranked(0, 0),
            Requirement::new("looks_hide", 1).ranked(0, 1),
        ];
        let results = check(&reqs, &program, &GradingOptions::default());
        assert_eq!(results.len(), 3);
        assert_eq!(
            results[2].status,
            CheckStatus::OrderViolation { expected_after: Opcode::from("looks_show") }
        );
        assert_eq!(results[2].requirement.opcode.as_str(), "looks_hide");

        let in_order = [
            Requirement::new("looks_hide", 1).ranked(0, 0),
            Requirement::new("looks_show", 1).ranked(0, 1),
        ];
        assert!(check(&in_order, &program, &GradingOptions::default())
            .iter()
            .all(CheckResult::is_satisfied));
    }
}
