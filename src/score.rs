//! Folds check results into a 0–100 score.

use crate::checker::{CheckResult, CheckStatus, MismatchSeverity};
use crate::extras::ExtraElements;
use crate::options::GradingOptions;
use std::collections::{BTreeMap, BTreeSet};

/// Pure function of its inputs; identical inputs always give the same score.
pub fn score(results: &[CheckResult], extras: &ExtraElements, options: &GradingOptions) -> u8 {
    let block_results = results
        .iter()
        .filter(|r| !matches!(r.status, CheckStatus::OrderViolation { .. }))
        .collect::<Vec<_>>();
    let total_weight: f64 = block_results.iter().map(|r| r.requirement.share_weight()).sum();

    let mut earned = 0.0;
    let mut by_script: BTreeMap<usize, f64> = BTreeMap::new();
    if block_results.is_empty() || total_weight <= 0.0 {
        earned = 100.0;
    } else {
        for result in &block_results {
            let share = 100.0 * result.requirement.share_weight() / total_weight;
            let points = share * credit(&result.status, options);
            earned += points;
            if let Some(script) = result.requirement.script {
                *by_script.entry(script).or_default() += points;
            }
        }
    }

    let violated = results
        .iter()
        .filter(|r| matches!(r.status, CheckStatus::OrderViolation { .. }))
        .filter_map(|r| r.requirement.script)
        .collect::<BTreeSet<_>>();
    let order_penalty: f64 = violated
        .iter()
        .map(|script| options.order_penalty * by_script.get(script).copied().unwrap_or(0.0))
        .sum();

    let extra_penalty = (extras.block_count() as f64 * options.extra_block_penalty
        + extras.variables.len() as f64 * options.extra_variable_penalty)
        .min(options.max_extra_penalty);

    (earned - order_penalty - extra_penalty).clamp(0.0, 100.0).round() as u8
}

fn credit(status: &CheckStatus, options: &GradingOptions) -> f64 {
    match status {
        CheckStatus::Satisfied => 1.0,
        CheckStatus::Missing | CheckStatus::OrderViolation { .. } => 0.0,
        CheckStatus::CountMismatch { expected, found } => {
            let hi = (*expected).max(*found);
            if hi == 0 {
                return 1.0;
            }
            options.count_mismatch_credit * ((*expected).min(*found) as f64 / hi as f64)
        }
        CheckStatus::ValueMismatch { severity, .. } => match severity {
            MismatchSeverity::Minor => options.minor_value_credit,
            MismatchSeverity::Major => options.major_value_credit,
        },
        CheckStatus::Misplaced { .. } => options.misplaced_credit,
    }
}
