use serde_json::Value;

use super::types::TaskKind;
use crate::error::TaskError;

/// Validates kind-specific submission parameters before any request is sent.
pub fn validate_params(kind: TaskKind, params: &Value) -> Result<(), TaskError> {
    let Some(map) = params.as_object() else {
        return Err(TaskError::validation(format!(
            "parameters for {kind} must be a JSON object"
        )));
    };

    for field in kind.required_params() {
        let present = match map.get(*field) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(Value::Array(a)) => !a.is_empty(),
            Some(Value::Object(o)) => !o.is_empty(),
            Some(_) => true,
        };
        if !present {
            return Err(TaskError::validation(format!(
                "{kind} requires a non-empty `{field}` parameter"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_required_fields() {
        validate_params(TaskKind::SyncJob, &json!({"project": "default"})).unwrap();
        validate_params(TaskKind::DiscoveryAgent, &json!({"concepts": ["care"]})).unwrap();
        validate_params(TaskKind::SuggestionRunner, &json!({"seed_text": "we helped"})).unwrap();
    }

    #[test]
    fn rejects_blank_or_missing() {
        assert!(matches!(
            validate_params(TaskKind::SuggestionRunner, &json!({"seed_text": "   "})),
            Err(TaskError::Validation(_))
        ));
        assert!(validate_params(TaskKind::DiscoveryAgent, &json!({"concepts": []})).is_err());
        assert!(validate_params(TaskKind::CleanupJob, &json!({})).is_err());
        assert!(validate_params(TaskKind::SyncJob, &json!({"project": null})).is_err());
    }

    #[test]
    fn rejects_non_object() {
        assert!(validate_params(TaskKind::SyncJob, &json!(["project"])).is_err());
    }
}
