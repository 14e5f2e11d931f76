//! Turns check results into learner-facing feedback.
//!
//! Only problems are reported: satisfied requirements never produce a
//! detail. Details are ordered by priority (lower first), hints by a fixed
//! status ranking and capped at [`GradingOptions::max_hints`].

use crate::checker::{CheckResult, CheckStatus, MismatchSeverity};
use crate::error::GradeError;
use crate::extras::ExtraElements;
use crate::opcode::Opcode;
use crate::options::GradingOptions;
use crate::project::{Literal, LiteralKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const INVALID_INPUT_SUMMARY: &str =
    "The program data could not be read. Please check the project file and submit it again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Warning,
    Error,
}

impl Severity {
    pub fn icon(self) -> &'static str {
        match self {
            Severity::Success => "✅",
            Severity::Warning => "⚠️",
            Severity::Error => "❌",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackDetail {
    pub severity: Severity,
    pub icon: String,
    pub message: String,
    pub priority: u8,
}

impl FeedbackDetail {
    fn new(severity: Severity, priority: u8, message: String) -> Self {
        Self {
            severity,
            icon: severity.icon().to_string(),
            message,
            priority,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub summary: String,
    pub details: Vec<FeedbackDetail>,
    pub hints: Vec<String>,
}

impl Feedback {
    pub fn invalid_input() -> Self {
        Self {
            summary: INVALID_INPUT_SUMMARY.to_string(),
            details: Vec::new(),
            hints: Vec::new(),
        }
    }
}

/// Fixed sentence for a score band.
pub fn summary_for(score: u8) -> &'static str {
    match score {
        100..=u8::MAX => "Perfect! Your program does everything the task asks for.",
        85..=99 => "Almost there! Only a few small details are left to fix.",
        80..=84 => "Correct, well done! A little polishing would make it perfect.",
        60..=79 => "You're getting there. Work through the points below and try again.",
        _ => "Keep going! Compare your program with the task one step at a time.",
    }
}

mod priority {
    pub const CATEGORY_SUMMARY: u8 = 0;
    pub const MISSING: u8 = 1;
    pub const MAJOR_VALUE: u8 = 2;
    pub const ORDER: u8 = 3;
    pub const MISPLACED: u8 = 4;
    pub const MINOR_VALUE: u8 = 5;
    pub const COUNT: u8 = 6;
    pub const EXTRA_BLOCK: u8 = 7;
    pub const EXTRA_VARIABLE: u8 = 8;
    pub const MALFORMED_TARGET: u8 = 9;
}

/// Hint ranking; lower wins a slot first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum HintRank {
    Missing,
    Major,
    Order,
    Misplaced,
    Minor,
    Count,
    Extra,
}

/// Collects details and hint candidates, then orders and caps them in
/// [`FeedbackBuilder::build`].
#[derive(Debug, Clone)]
pub struct FeedbackBuilder {
    category_threshold: usize,
    max_hints: usize,
    details: Vec<FeedbackDetail>,
    hints: Vec<(HintRank, String)>,
    /// Error-severity details per palette category label. Warnings (order,
    /// minor values, small count gaps, misplaced blocks) are left out, so
    /// they never trigger the category summary.
    error_categories: BTreeMap<&'static str, usize>,
    /// Blocks already named by an order detail.
    ordered: BTreeSet<Opcode>,
}

impl FeedbackBuilder {
    pub fn new(options: &GradingOptions) -> Self {
        Self {
            category_threshold: options.category_summary_threshold,
            max_hints: options.max_hints,
            details: Vec::new(),
            hints: Vec::new(),
            error_categories: BTreeMap::new(),
            ordered: BTreeSet::new(),
        }
    }

    pub fn results(self, results: &[CheckResult]) -> Self {
        results.iter().fold(self, FeedbackBuilder::result)
    }

    pub fn result(mut self, result: &CheckResult) -> Self {
        let opcode = &result.requirement.opcode;
        let block = quoted(opcode);
        let (severity, priority, rank, message, hint) = match &result.status {
            CheckStatus::Satisfied => return self,
            CheckStatus::Missing => (
                Severity::Error,
                priority::MISSING,
                HintRank::Missing,
                format!("The {} block is missing from your program.", block),
                format!("Add a {} block to your program.", block),
            ),
            CheckStatus::CountMismatch { expected, found } => (
                count_severity(*expected, *found),
                priority::COUNT,
                HintRank::Count,
                format!(
                    "You used the {} block {} time(s), but the task needs it {} time(s).",
                    block, found, expected
                ),
                format!("Count your {} blocks again.", block),
            ),
            CheckStatus::ValueMismatch {
                slot,
                expected,
                found,
                severity: MismatchSeverity::Major,
            } => (
                Severity::Error,
                priority::MAJOR_VALUE,
                HintRank::Major,
                value_message(&block, slot, expected, found.as_ref(), "has the wrong value"),
                format!("Look again at the value you typed into {}.", block),
            ),
            CheckStatus::ValueMismatch {
                slot,
                expected,
                found,
                severity: MismatchSeverity::Minor,
            } => (
                Severity::Warning,
                priority::MINOR_VALUE,
                HintRank::Minor,
                value_message(&block, slot, expected, found.as_ref(), "is slightly off"),
                format!("The value in {} is close; double-check it.", block),
            ),
            CheckStatus::Misplaced { expected_context, .. } => (
                Severity::Warning,
                priority::MISPLACED,
                HintRank::Misplaced,
                format!(
                    "The {} block should be inside the {} block.",
                    block,
                    quoted(expected_context)
                ),
                format!("Move {} inside {}.", block, quoted(expected_context)),
            ),
            CheckStatus::OrderViolation { expected_after } => {
                if self.ordered.contains(opcode) || self.ordered.contains(expected_after) {
                    return self;
                }
                self.ordered.insert(opcode.clone());
                self.ordered.insert(expected_after.clone());
                (
                    Severity::Warning,
                    priority::ORDER,
                    HintRank::Order,
                    format!(
                        "The {} block should come after the {} block.",
                        block,
                        quoted(expected_after)
                    ),
                    format!("Check the order of {} and {}.", quoted(expected_after), block),
                )
            }
        };

        if severity == Severity::Error {
            *self.error_categories.entry(opcode.category_label()).or_default() += 1;
        }
        self.details.push(FeedbackDetail::new(severity, priority, message));
        self.hints.push((rank, hint));
        self
    }

    pub fn extras(mut self, extras: &ExtraElements) -> Self {
        for extra in &extras.blocks {
            self.details.push(FeedbackDetail::new(
                Severity::Warning,
                priority::EXTRA_BLOCK,
                format!(
                    "The {} block ({} extra) is not needed for this task.",
                    quoted(&extra.opcode),
                    extra.count
                ),
            ));
            self.hints
                .push((HintRank::Extra, "Remove blocks the task does not need.".to_string()));
        }
        for variable in &extras.variables {
            self.details.push(FeedbackDetail::new(
                Severity::Warning,
                priority::EXTRA_VARIABLE,
                format!("The variable \"{}\" is not needed for this task.", variable.name),
            ));
            self.hints
                .push((HintRank::Extra, "Remove variables the task does not need.".to_string()));
        }
        self
    }

    /// Targets of the submission that could not be graded.
    pub fn skipped_targets(mut self, skipped: &[GradeError]) -> Self {
        for err in skipped {
            let message = match err {
                GradeError::MalformedGraph { target, .. } => format!(
                    "The sprite \"{}\" has blocks that could not be read, so it was skipped.",
                    target
                ),
                GradeError::InvalidTarget { index, .. } => {
                    format!("Sprite #{} could not be read, so it was skipped.", index + 1)
                }
                _ => continue,
            };
            self.details.push(FeedbackDetail::new(
                Severity::Warning,
                priority::MALFORMED_TARGET,
                message,
            ));
        }
        self
    }

    pub fn build(self, score: u8) -> Feedback {
        let mut details = self.details;
        if let Some(summary) = category_summary(&self.error_categories, self.category_threshold) {
            details.push(summary);
        }
        details.sort_by_key(|d| d.priority);

        let mut candidates = self.hints;
        candidates.sort_by_key(|(rank, _)| *rank);
        let mut seen = BTreeSet::new();
        let hints = candidates
            .into_iter()
            .filter(|(_, hint)| seen.insert(hint.clone()))
            .map(|(_, hint)| hint)
            .take(self.max_hints)
            .collect();

        Feedback {
            summary: summary_for(score).to_string(),
            details,
            hints,
        }
    }
}

fn count_severity(expected: usize, found: usize) -> Severity {
    if expected.abs_diff(found) >= 2 || found * 2 < expected {
        Severity::Error
    } else {
        Severity::Warning
    }
}

/// Names the densest category once `threshold` categories carry errors.
fn category_summary(categories: &BTreeMap<&'static str, usize>, threshold: usize) -> Option<FeedbackDetail> {
    if categories.len() < threshold.max(1) {
        return None;
    }
    let mut densest: Option<(&str, usize)> = None;
    for (&label, &count) in categories {
        if densest.map_or(true, |(_, best)| count > best) {
            densest = Some((label, count));
        }
    }
    let (label, count) = densest?;
    Some(FeedbackDetail::new(
        Severity::Error,
        priority::CATEGORY_SUMMARY,
        format!(
            "There are mistakes in {} block categories; most of them ({}) are in {}.",
            categories.len(),
            count,
            label
        ),
    ))
}

fn quoted(opcode: &Opcode) -> String {
    format!("\"{}\"", opcode.label())
}

fn value_message(block: &str, slot: &str, expected: &Literal, found: Option<&Literal>, what: &str) -> String {
    if expected.kind == LiteralKind::Reference {
        return format!("The {} block uses a different variable than expected.", block);
    }
    let found = match found {
        Some(lit) if lit.kind == LiteralKind::Reference => "a variable".to_string(),
        Some(lit) => lit.text.clone(),
        None => "a reporter block".to_string(),
    };
    format!(
        "The {} block {} in {}: expected {}, found {}.",
        block,
        what,
        slot.to_lowercase(),
        expected.text,
        found
    )
}
