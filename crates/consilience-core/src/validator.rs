//! Response validation: free-form model output in, `SynthesisResult` out.
//!
//! Three steps, each with its own failure:
//! 1. locate the first balanced `{...}` span ([`ValidationError::NoJsonFound`])
//! 2. parse it ([`ValidationError::MalformedJson`])
//! 3. check it against the JSON Schema derived from [`SynthesisResult`]
//!    ([`ValidationError::SchemaViolation`])
//!
//! Nothing is coerced. Out-of-range numbers and unknown enum values fail.

use once_cell::sync::Lazy;
use schemars::schema_for;
use serde_json::Value;

use crate::error::ValidationError;
use crate::models::SynthesisResult;

/// Turns raw model output into a validated result.
///
/// The orchestrator only sees this trait, so a backend with native
/// structured output can swap in a simpler implementation.
pub trait ResponseValidator: Send + Sync {
    fn validate(&self, raw: &str) -> Result<SynthesisResult, ValidationError>;
}

/// Default validator backed by the schemars-generated schema.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaValidator;

impl ResponseValidator for SchemaValidator {
    fn validate(&self, raw: &str) -> Result<SynthesisResult, ValidationError> {
        validate(raw)
    }
}

static SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::to_value(schema_for!(SynthesisResult)).unwrap_or(Value::Bool(false))
});

static VALIDATOR: Lazy<Result<jsonschema::Validator, String>> =
    Lazy::new(|| jsonschema::validator_for(&SCHEMA).map_err(|e| e.to_string()));

/// The JSON Schema every synthesis result must satisfy.
pub fn synthesis_schema() -> &'static Value {
    &SCHEMA
}

/// Validate raw model output.
pub fn validate(raw: &str) -> Result<SynthesisResult, ValidationError> {
    let span = find_json_object(raw).ok_or(ValidationError::NoJsonFound)?;

    let value: Value =
        serde_json::from_str(span).map_err(|e| ValidationError::MalformedJson(e.to_string()))?;

    let validator = VALIDATOR
        .as_ref()
        .map_err(|e| ValidationError::SchemaViolation {
            path: "/".to_string(),
            detail: format!("result schema failed to compile: {e}"),
        })?;

    if let Some(err) = validator.iter_errors(&value).next() {
        let path = err.instance_path.to_string();
        return Err(ValidationError::SchemaViolation {
            path: if path.is_empty() { "/".to_string() } else { path },
            detail: err.to_string(),
        });
    }

    serde_json::from_value(value).map_err(|e| ValidationError::SchemaViolation {
        path: "/".to_string(),
        detail: e.to_string(),
    })
}

/// Locate the first balanced top-level `{...}` span in `text`.
///
/// Braces inside JSON string literals (including escaped quotes) do not
/// count. If an opening brace never closes, scanning resumes at the next one.
pub fn find_json_object(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut start = 0;

    while let Some(offset) = text[start..].find('{') {
        let open = start + offset;
        if let Some(close) = matching_brace(bytes, open) {
            return Some(&text[open..=close]);
        }
        start = open + 1;
    }

    None
}

/// Index of the brace closing the one at `open`, if any.
fn matching_brace(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo;

    fn demo_json() -> Value {
        serde_json::to_value(demo::caffeine_result()).unwrap()
    }

    fn expect_violation(value: Value) -> (String, String) {
        match validate(&value.to_string()) {
            Err(ValidationError::SchemaViolation { path, detail }) => (path, detail),
            other => panic!("expected SchemaViolation, got {other:?}"),
        }
    }

    #[test]
    fn test_find_json_object_plain() {
        assert_eq!(find_json_object(r#"{"a":1}"#), Some(r#"{"a":1}"#));
    }

    #[test]
    fn test_find_json_object_in_prose() {
        let text = "Sure! Here you go:\n{\"a\": {\"b\": 2}}\nHope that helps {really}.";
        assert_eq!(find_json_object(text), Some("{\"a\": {\"b\": 2}}"));
    }

    #[test]
    fn test_find_json_object_ignores_braces_in_strings() {
        let text = r#"{"claim": "uses } and { and \" quotes", "n": 1} trailing }"#;
        assert_eq!(
            find_json_object(text),
            Some(r#"{"claim": "uses } and { and \" quotes", "n": 1}"#)
        );
    }

    #[test]
    fn test_find_json_object_skips_unclosed_brace() {
        let text = r#"Note the set {a, b. Result: {"ok": true}"#;
        // The first brace swallows the rest and never closes; the scan retries
        // from the next opening brace.
        assert_eq!(find_json_object(text), Some(r#"{"ok": true}"#));
    }

    #[test]
    fn test_find_json_object_none() {
        assert_eq!(find_json_object("no json here"), None);
        assert_eq!(find_json_object("{ never closed"), None);
        assert_eq!(find_json_object(""), None);
    }

    #[test]
    fn test_validate_no_json() {
        assert_eq!(
            validate("I could not analyze these papers."),
            Err(ValidationError::NoJsonFound)
        );
    }

    #[test]
    fn test_validate_malformed_json() {
        let err = validate(r#"Result: {"topic": "x",}"#).unwrap_err();
        assert!(matches!(err, ValidationError::MalformedJson(_)));
    }

    #[test]
    fn test_validate_recovers_result_from_prose() {
        let expected = demo::caffeine_result();
        let json = serde_json::to_string_pretty(&expected).unwrap();
        let wrappers = [
            json.clone(),
            format!("Here is the synthesis:\n```json\n{json}\n```\nLet me know!"),
            format!("Analysis complete. {json} (confidence is moderate)"),
        ];
        for raw in wrappers {
            assert_eq!(validate(&raw).unwrap(), expected);
        }
    }

    #[test]
    fn test_validate_accepts_missing_synthesis_id() {
        let mut value = demo_json();
        value.as_object_mut().unwrap().remove("synthesis_id");
        let result = validate(&value.to_string()).unwrap();
        assert_eq!(result.synthesis_id, None);
    }

    #[test]
    fn test_validate_rejects_missing_papers_analyzed() {
        let mut value = demo_json();
        value.as_object_mut().unwrap().remove("papers_analyzed");
        let (_, detail) = expect_violation(value);
        assert!(detail.contains("papers_analyzed"), "detail: {detail}");
    }

    #[test]
    fn test_validate_rejects_confidence_above_one() {
        let mut value = demo_json();
        value["synthesis_confidence"] = serde_json::json!(1.5);
        let (path, _) = expect_violation(value);
        assert_eq!(path, "/synthesis_confidence");
    }

    #[test]
    fn test_validate_rejects_negative_finding_confidence() {
        let mut value = demo_json();
        value["agreed_findings"][1]["confidence"] = serde_json::json!(-0.1);
        let (path, _) = expect_violation(value);
        assert_eq!(path, "/agreed_findings/1/confidence");
    }

    #[test]
    fn test_validate_accepts_inclusive_bounds() {
        let mut value = demo_json();
        value["synthesis_confidence"] = serde_json::json!(1.0);
        value["contradictions"][0]["confidence_in_resolution"] = serde_json::json!(0.0);
        assert!(validate(&value.to_string()).is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_effect_size() {
        let mut value = demo_json();
        value["contradictions"][0]["paper_a_claim"]["effect_size"] = serde_json::json!("huge");
        let (path, _) = expect_violation(value);
        assert_eq!(path, "/contradictions/0/paper_a_claim/effect_size");
    }

    #[test]
    fn test_validate_rejects_unknown_evidence_strength() {
        let mut value = demo_json();
        value["agreed_findings"][0]["evidence_strength"] = serde_json::json!("Strong");
        expect_violation(value);
    }

    #[test]
    fn test_validate_rejects_wrong_element_shape() {
        let mut value = demo_json();
        value["agreed_findings"][0]["supporting_papers"] = serde_json::json!([1, 2]);
        let (path, _) = expect_violation(value);
        assert!(path.starts_with("/agreed_findings/0/supporting_papers"));
    }

    #[test]
    fn test_validate_rejects_avg_quality_out_of_range() {
        let mut value = demo_json();
        value["methodology_comparison"]["study_types"][0]["avg_quality"] = serde_json::json!(85);
        expect_violation(value);
    }

    #[test]
    fn test_validate_rejects_negative_count() {
        let mut value = demo_json();
        value["methodology_comparison"]["study_types"][0]["count"] = serde_json::json!(-1);
        expect_violation(value);
    }

    #[test]
    fn test_schema_validator_trait_delegates() {
        let raw = serde_json::to_string(&demo::caffeine_result()).unwrap();
        let validator: &dyn ResponseValidator = &SchemaValidator;
        assert_eq!(validator.validate(&raw).unwrap(), demo::caffeine_result());
    }

    #[test]
    fn test_schema_compiles() {
        assert!(VALIDATOR.is_ok());
        assert!(synthesis_schema().get("required").is_some());
    }
}
