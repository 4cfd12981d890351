//! Redacts API keys out of run-journal artifacts before they touch disk
//! (spec.md §4.5: "API keys are replaced with `\"***\"` before persisting").

use serde_json::Value;

/// JSON object keys that carry bearer credentials anywhere in the request
/// payloads this system journals (Critic/Assistant calls, brain HTTP bodies).
const KEY_FIELDS: &[&str] = &[
    "criticKey",
    "assistantKey",
    "assistantId",
    "apiKey",
    "api_key",
    "authorization",
    "Authorization",
];

const REDACTED: &str = "***";

/// Recursively walk a JSON value and replace the value of any key-bearing
/// field with `"***"`, leaving everything else untouched.
pub fn redact_keys(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, v) in map.iter_mut() {
                if KEY_FIELDS.iter().any(|f| f.eq_ignore_ascii_case(key)) {
                    if !v.is_null() {
                        *v = Value::String(REDACTED.to_string());
                    }
                } else {
                    redact_keys(v);
                }
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                redact_keys(item);
            }
        }
        _ => {}
    }
}

/// Redact a value and serialize it to a pretty JSON string, for writing
/// directly into a journal artifact file.
pub fn redact_to_string(mut value: Value) -> String {
    redact_keys(&mut value);
    serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn redacts_nested_keys() {
        let mut payload = json!({
            "prompt": "do the thing",
            "criticKey": "sk-abc123",
            "nested": {
                "assistantKey": "sk-def456",
                "other": "keep me"
            }
        });
        redact_keys(&mut payload);
        assert_eq!(payload["criticKey"], "***");
        assert_eq!(payload["nested"]["assistantKey"], "***");
        assert_eq!(payload["nested"]["other"], "keep me");
        assert_eq!(payload["prompt"], "do the thing");
    }

    #[test]
    fn leaves_null_keys_as_null() {
        let mut payload = json!({ "criticKey": null });
        redact_keys(&mut payload);
        assert!(payload["criticKey"].is_null());
    }

    #[test]
    fn redacts_inside_arrays() {
        let mut payload = json!([{ "apiKey": "x" }, { "apiKey": "y" }]);
        redact_keys(&mut payload);
        assert_eq!(payload[0]["apiKey"], "***");
        assert_eq!(payload[1]["apiKey"], "***");
    }
}
