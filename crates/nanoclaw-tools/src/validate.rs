//! Minimal structural argument validation against a tool's JSON schema.
//!
//! Tool schemas in this codebase are plain `{"type":"object", "properties":
//! {...}, "required": [...]}` objects, same shape as the ones tools
//! self-describe for function-calling. Validation checks the two things
//! that matter for dispatch safety: the arguments are an object, and
//! every name in `required` is present.

/// Validate `args` against `schema`, returning the first problem found.
pub fn validate_args(schema: &serde_json::Value, args: &serde_json::Value) -> Result<(), String> {
    if !args.is_object() {
        return Err("arguments must be a JSON object".to_string());
    }

    let Some(required) = schema.get("required").and_then(|r| r.as_array()) else {
        return Ok(());
    };

    let obj = args.as_object().expect("checked above");
    for field in required {
        let Some(name) = field.as_str() else {
            continue;
        };
        if !obj.contains_key(name) {
            return Err(format!("missing required field '{name}'"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_object_with_required_fields() {
        let schema = json!({"type": "object", "required": ["text"]});
        let args = json!({"text": "hi"});
        assert!(validate_args(&schema, &args).is_ok());
    }

    #[test]
    fn rejects_missing_required_field() {
        let schema = json!({"type": "object", "required": ["text"]});
        let args = json!({"other": "hi"});
        let err = validate_args(&schema, &args).unwrap_err();
        assert!(err.contains("text"));
    }

    #[test]
    fn rejects_non_object_arguments() {
        let schema = json!({"type": "object"});
        let args = json!("not an object");
        assert!(validate_args(&schema, &args).is_err());
    }

    #[test]
    fn schema_without_required_accepts_anything_shaped_as_object() {
        let schema = json!({"type": "object"});
        let args = json!({});
        assert!(validate_args(&schema, &args).is_ok());
    }
}
