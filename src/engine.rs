//! The grading entry point.

use crate::checker::check;
use crate::error::{GradeError, Result, Side};
use crate::extras::detect_extras;
use crate::feedback::{Feedback, FeedbackBuilder};
use crate::indexer::index_program;
use crate::mapper::{map_variables, VariableMapping};
use crate::normalize::normalize;
use crate::options::GradingOptions;
use crate::profile::profile_variables;
use crate::project::Program;
use crate::requirements::{extract_requirements, Requirement};
use crate::score::score;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    pub score: u8,
    pub is_correct: bool,
    pub feedback: Feedback,
}

impl EvaluationResult {
    /// The result returned when either document is absent or has no targets,
    /// or the reference has no target left to grade against.
    pub fn invalid_input() -> Self {
        Self {
            score: 0,
            is_correct: false,
            feedback: Feedback::invalid_input(),
        }
    }
}

/// Holds the options of a grading run; carries no other state.
#[derive(Debug, Clone, Default)]
pub struct Grader {
    options: GradingOptions,
}

impl Grader {
    pub fn new(options: GradingOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &GradingOptions {
        &self.options
    }

    /// Grades `submitted` against `reference`. Never fails: unusable input
    /// yields [`EvaluationResult::invalid_input`].
    pub fn evaluate(
        &self,
        submitted: &Value,
        reference: &Value,
        requirements: Option<&[Requirement]>,
    ) -> EvaluationResult {
        match self.try_evaluate(submitted, reference, requirements) {
            Ok(result) => result,
            Err(err) => {
                warn!(error = %err, "evaluation rejected");
                EvaluationResult::invalid_input()
            }
        }
    }

    /// Like [`Grader::evaluate`], but reports why the input was unusable.
    pub fn try_evaluate(
        &self,
        submitted: &Value,
        reference: &Value,
        requirements: Option<&[Requirement]>,
    ) -> Result<EvaluationResult> {
        let opts = &self.options;
        let submitted = Program::from_json(submitted, Side::Submitted)?;
        let reference = Program::from_json(reference, Side::Reference)?;

        let (submitted_index, malformed) = index_program(&submitted.program, opts.max_depth);
        let skipped: Vec<GradeError> = submitted.skipped.into_iter().chain(malformed).collect();
        let (reference_index, reference_skipped) = index_program(&reference.program, opts.max_depth);
        if !reference.skipped.is_empty() || !reference_skipped.is_empty() {
            warn!(
                skipped = reference.skipped.len() + reference_skipped.len(),
                "reference targets skipped"
            );
        }
        if reference_index.targets.is_empty() {
            return Err(GradeError::MissingTargets(Side::Reference));
        }

        let mapping = map_variables(
            &profile_variables(&submitted_index),
            &profile_variables(&reference_index),
            opts,
        );
        let submission = normalize(&submitted_index, &mapping);
        let solution = normalize(&reference_index, &VariableMapping::identity(&reference_index));

        let requirements = match requirements {
            Some(curated) => curated.to_vec(),
            None => extract_requirements(&solution),
        };
        let results = check(&requirements, &submission, opts);
        let extras = detect_extras(&requirements, &solution, &submission, &mapping);
        debug!(
            results = results.len(),
            extra_blocks = extras.block_count(),
            extra_variables = extras.variables.len(),
            "submission checked"
        );

        let score = score(&results, &extras, opts);
        let feedback = FeedbackBuilder::new(opts)
            .results(&results)
            .extras(&extras)
            .skipped_targets(&skipped)
            .build(score);
        let is_correct = score >= opts.pass_threshold;
        info!(score, is_correct, details = feedback.details.len(), "evaluation finished");

        Ok(EvaluationResult {
            score,
            is_correct,
            feedback,
        })
    }
}

/// Grades with the default [`GradingOptions`].
pub fn evaluate(submitted: &Value, reference: &Value, requirements: Option<&[Requirement]>) -> EvaluationResult {
    Grader::default().evaluate(submitted, reference, requirements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_documents_are_invalid_input() {
        let reference = json!({ "targets": [] });
        let result = evaluate(&Value::Null, &reference, None);
        assert_eq!(result, EvaluationResult::invalid_input());

        let err = Grader::default()
            .try_evaluate(&json!({}), &reference, None)
            .unwrap_err();
        assert_eq!(err, GradeError::MissingTargets(Side::Submitted));
        assert!(err.is_input_error());
    }

    #[test]
    fn empty_reference_is_invalid_input() {
        let empty = json!({ "targets": [] });
        assert_eq!(evaluate(&empty, &empty, None), EvaluationResult::invalid_input());

        let stage = json!({ "targets": [{ "name": "Stage", "isStage": true, "blocks": {} }] });
        let err = Grader::default().try_evaluate(&stage, &empty, None).unwrap_err();
        assert_eq!(err, GradeError::MissingTargets(Side::Reference));

        let unreadable = json!({ "targets": [42, "sprite"] });
        let err = Grader::default().try_evaluate(&stage, &unreadable, None).unwrap_err();
        assert_eq!(err, GradeError::MissingTargets(Side::Reference));
    }

    #[test]
    fn empty_submission_is_graded() {
        let reference = json!({ "targets": [{ "name": "Stage", "isStage": true, "blocks": {} }] });
        let result = evaluate(&json!({ "targets": [] }), &reference, None);
        assert_eq!(result.score, 100);
        assert!(result.is_correct);
        assert!(result.feedback.details.is_empty());
    }

    #[test]
    fn result_serializes_camel_case() {
        let json = serde_json::to_value(EvaluationResult::invalid_input()).unwrap();
        assert_eq!(json["isCorrect"], false);
        assert_eq!(json["score"], 0);
        assert!(json["feedback"]["hints"].as_array().unwrap().is_empty());
    }
}
