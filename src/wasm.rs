use crate::requirements::Requirement;
use serde_json::Value;
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub fn evaluate_json(submitted: &str, reference: &str) -> Result<String, JsValue> {
    evaluate_json_with_requirements(submitted, reference, None)
}

/// `requirements` is a JSON array of requirements, or `None` to extract them
/// from the reference.
#[wasm_bindgen]
pub fn evaluate_json_with_requirements(
    submitted: &str,
    reference: &str,
    requirements: Option<String>,
) -> Result<String, JsValue> {
    let submitted = parse(submitted)?;
    let reference = parse(reference)?;
    let requirements = requirements
        .map(|text| serde_json::from_str::<Vec<Requirement>>(&text))
        .transpose()
        .map_err(|e| JsValue::from_str(&format!("Invalid requirements: {}", e)))?;
    let result = crate::evaluate(&submitted, &reference, requirements.as_deref());
    serde_json::to_string(&result).map_err(|e| JsValue::from_str(&e.to_string()))
}

fn parse(text: &str) -> Result<Value, JsValue> {
    serde_json::from_str(text).map_err(|e| JsValue::from_str(&format!("Invalid project JSON: {}", e)))
}
