use serde::{Deserialize, Serialize};

/// Tunable constants of the grading pipeline.
///
/// The defaults are calibrated against the scenario tests under `tests/`;
/// callers may load their own set from JSON (every field is optional).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradingOptions {
    /// Weight of the Write/Delta/Read count agreement in variable similarity.
    pub count_weight: f64,
    /// Weight of opcode agreement at corresponding usage positions.
    pub opcode_weight: f64,
    /// Weight of position-hint agreement at corresponding usage positions.
    pub position_weight: f64,
    /// Pairs scoring below this are never mapped onto each other.
    pub min_similarity: f64,
    /// Use the exact assignment instead of greedy matching when the reference
    /// declares at most `exact_matching_limit` variables.
    pub exact_matching: bool,
    /// Capped at [`crate::mapper::EXACT_MATCHING_CEILING`].
    pub exact_matching_limit: usize,

    /// Relative numeric gap still reported as a minor ("slightly off") mismatch.
    pub minor_relative_tolerance: f64,

    pub minor_value_credit: f64,
    pub major_value_credit: f64,
    pub misplaced_credit: f64,
    /// Credit for a count mismatch, scaled by `min(found, expected) / max(..)`.
    pub count_mismatch_credit: f64,
    /// Fraction of a script's earned credit removed when its order is violated.
    pub order_penalty: f64,
    pub extra_block_penalty: f64,
    pub extra_variable_penalty: f64,
    pub max_extra_penalty: f64,
    pub pass_threshold: u8,

    /// Nesting depth at which a block graph is treated as malformed.
    pub max_depth: usize,
    /// Distinct error categories needed before a category summary is shown.
    pub category_summary_threshold: usize,
    pub max_hints: usize,
}

impl Default for GradingOptions {
    fn default() -> Self {
        Self {
            count_weight: 0.7,
            opcode_weight: 0.2,
            position_weight: 0.1,
            min_similarity: 0.2,
            exact_matching: false,
            exact_matching_limit: 12,
            minor_relative_tolerance: 0.2,
            minor_value_credit: 0.75,
            major_value_credit: 0.4,
            misplaced_credit: 0.5,
            count_mismatch_credit: 0.6,
            order_penalty: 0.25,
            extra_block_penalty: 2.0,
            extra_variable_penalty: 3.0,
            max_extra_penalty: 10.0,
            pass_threshold: 80,
            max_depth: 256,
            category_summary_threshold: 3,
            max_hints: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_other_defaults() {
        let opts: GradingOptions =
            serde_json::from_str(r#"{ "exact_matching": true, "pass_threshold": 70 }"#)
                .expect("options should parse");
        assert!(opts.exact_matching);
        assert_eq!(opts.pass_threshold, 70);
        assert_eq!(opts.max_hints, 3);
        assert_eq!(opts.min_similarity, GradingOptions::default().min_similarity);
    }
}
