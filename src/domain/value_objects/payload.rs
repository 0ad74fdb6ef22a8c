use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON body of a pending operation.
///
/// Always a JSON object: a queued `create` accumulates later offline edits by
/// deep-merging patches into it, which requires a keyed structure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperationPayload(Value);

impl OperationPayload {
    pub fn new(value: Value) -> Result<Self, String> {
        Self::validate(&value)?;
        Ok(Self(value))
    }

    pub fn from_json_str(json: &str) -> Result<Self, String> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| format!("Invalid JSON payload: {e}"))?;
        Self::new(value)
    }

    pub fn as_json(&self) -> &Value {
        &self.0
    }

    pub fn into_inner(self) -> Value {
        self.0
    }

    /// Merge `patch` into the payload. Nested objects merge recursively; any
    /// other value (including arrays) is overridden wholesale. Keys absent
    /// from the patch are preserved.
    pub fn deep_merge(&mut self, patch: &Value) {
        merge_json(&mut self.0, patch);
    }

    /// String value under `key`, if present and non-empty.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
    }

    /// String array under `key`, with non-string entries skipped.
    pub fn get_str_array(&self, key: &str) -> Vec<String> {
        self.0
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn validate(value: &Value) -> Result<(), String> {
        if !value.is_object() {
            return Err("Operation payload must be a JSON object".to_string());
        }
        Ok(())
    }
}

impl From<OperationPayload> for Value {
    fn from(payload: OperationPayload) -> Self {
        payload.0
    }
}

/// Deep merge used both for payload amendment and for folding patches into
/// cached entity documents.
pub fn merge_json(base: &mut Value, patch: &Value) {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            for (key, patch_value) in patch_map {
                match base_map.get_mut(key) {
                    Some(slot) => merge_json(slot, patch_value),
                    None => {
                        base_map.insert(key.clone(), patch_value.clone());
                    }
                }
            }
        }
        (slot, value) => *slot = value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_must_be_object() {
        assert!(OperationPayload::new(Value::Null).is_err());
        assert!(OperationPayload::new(json!([1, 2])).is_err());
        assert!(OperationPayload::new(json!({"name": "x"})).is_ok());
    }

    #[test]
    fn test_deep_merge_preserves_unspecified_keys() {
        let mut payload =
            OperationPayload::new(json!({"name": "Old", "region": "north"})).unwrap();
        payload.deep_merge(&json!({"name": "New"}));
        assert_eq!(
            payload.as_json(),
            &json!({"name": "New", "region": "north"})
        );
    }

    #[test]
    fn test_deep_merge_recurses_into_objects() {
        let mut payload = OperationPayload::new(
            json!({"contact": {"phone": "111", "email": "a@b"}, "name": "A"}),
        )
        .unwrap();
        payload.deep_merge(&json!({"contact": {"phone": "222"}}));
        assert_eq!(
            payload.as_json(),
            &json!({"contact": {"phone": "222", "email": "a@b"}, "name": "A"})
        );
    }

    #[test]
    fn test_deep_merge_replaces_arrays_wholesale() {
        let mut payload = OperationPayload::new(json!({"memberIds": ["p1", "p2"]})).unwrap();
        payload.deep_merge(&json!({"memberIds": ["p3"]}));
        assert_eq!(payload.get_str_array("memberIds"), vec!["p3".to_string()]);
    }
}
