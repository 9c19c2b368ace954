//! Encode/decode step for JSON-typed columns
//!
//! Values are written as JSONB documents and decoded on read. A NULL column
//! decodes to the type's empty value. Malformed documents surface as
//! `Validation` errors naming the column.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::error::RepoError;

/// Free-form JSON object (custom fields, metadata, audit snapshots)
pub type JsonMap = serde_json::Map<String, JsonValue>;

pub(crate) fn encode<T: Serialize>(field: &'static str, value: &T) -> Result<JsonValue, RepoError> {
    serde_json::to_value(value)
        .map_err(|e| RepoError::validation(field, format!("cannot encode as JSON: {e}")))
}

pub(crate) fn decode<T>(field: &'static str, stored: Option<JsonValue>) -> Result<T, RepoError>
where
    T: DeserializeOwned + Default,
{
    match stored {
        None | Some(JsonValue::Null) => Ok(T::default()),
        Some(value) => serde_json::from_value(value)
            .map_err(|e| RepoError::validation(field, format!("stored document is malformed: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_null_decodes_to_empty() {
        let map: JsonMap = decode("custom_fields", None).unwrap();
        assert!(map.is_empty());

        let tags: Vec<String> = decode("tags", Some(JsonValue::Null)).unwrap();
        assert!(tags.is_empty());
    }

    #[test]
    fn test_object_round_trip() {
        let mut fields = JsonMap::new();
        fields.insert("key".into(), json!("value"));

        let stored = encode("custom_fields", &fields).unwrap();
        let decoded: JsonMap = decode("custom_fields", Some(stored)).unwrap();
        assert_eq!(decoded, fields);
    }

    #[test]
    fn test_shape_mismatch_is_validation() {
        let err = decode::<Vec<String>>("tags", Some(json!({"not": "an array"}))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().starts_with("invalid tags"));
    }
}
