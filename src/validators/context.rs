//! Request snapshot - the parts of a request body the gate looks at

use super::resolver::SubtypeKey;
use crate::config::ValidationSettings;
use serde_json::{Map, Value};

/// Names of the body fields that drive validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFields {
    pub subtype: String,
    pub trigger: String,
    pub attributes: String,
}

impl RequestFields {
    pub fn from_settings(settings: &ValidationSettings) -> Self {
        Self {
            subtype: settings.subtype_field.clone(),
            trigger: settings.trigger_field.clone(),
            attributes: settings.attributes_field.clone(),
        }
    }

    /// Client-facing message when any of the fields is absent
    pub fn missing_message(&self) -> String {
        format!(
            "Missing required fields ({}, {}, {}).",
            self.subtype, self.trigger, self.attributes
        )
    }
}

impl Default for RequestFields {
    fn default() -> Self {
        Self::from_settings(&ValidationSettings::default())
    }
}

/// Why a body could not be turned into a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotError {
    /// Body is not the expected shape
    Malformed,
    /// One of the required fields is absent
    MissingRequired,
}

/// Per-request view of the fields validation depends on
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSnapshot {
    pub subtype: SubtypeKey,
    pub trigger_value: Value,
    pub attributes: Map<String, Value>,
}

impl RequestSnapshot {
    /// Pull the subtype, trigger value and attribute bag out of a parsed body.
    ///
    /// Presence is checked before shape: a body missing any of the three
    /// fields is `MissingRequired` even if the others are malformed.
    pub fn extract(body: &Value, fields: &RequestFields) -> Result<Self, SnapshotError> {
        let root = body.as_object().ok_or(SnapshotError::Malformed)?;

        let (Some(subtype), Some(trigger_value), Some(attributes)) = (
            root.get(&fields.subtype),
            root.get(&fields.trigger),
            root.get(&fields.attributes),
        ) else {
            return Err(SnapshotError::MissingRequired);
        };

        let subtype = match subtype {
            Value::Number(n) => n.as_i64().map(SubtypeKey::Id),
            Value::String(name) => Some(SubtypeKey::Name(name.clone())),
            _ => None,
        }
        .ok_or(SnapshotError::Malformed)?;

        let attributes = attributes
            .as_object()
            .cloned()
            .ok_or(SnapshotError::Malformed)?;

        Ok(Self {
            subtype,
            trigger_value: trigger_value.clone(),
            attributes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_by_id() {
        let body = json!({
            "name": "Watch 1",
            "typeId": 1,
            "isEnabled": true,
            "additionalProperties": { "batteryLevel": "80", "band": "Sport" }
        });
        let snapshot = RequestSnapshot::extract(&body, &RequestFields::default()).unwrap();
        assert_eq!(snapshot.subtype, SubtypeKey::Id(1));
        assert_eq!(snapshot.trigger_value, json!(true));
        let keys: Vec<_> = snapshot.attributes.keys().cloned().collect();
        assert_eq!(keys, vec!["batteryLevel", "band"]);
    }

    #[test]
    fn test_extract_by_name() {
        let body = json!({ "typeId": "PC", "isEnabled": "false", "additionalProperties": {} });
        let snapshot = RequestSnapshot::extract(&body, &RequestFields::default()).unwrap();
        assert_eq!(snapshot.subtype, SubtypeKey::Name("PC".into()));
        assert_eq!(snapshot.trigger_value, json!("false"));
    }

    #[test]
    fn test_missing_fields() {
        let fields = RequestFields::default();
        for body in [
            json!({ "isEnabled": true, "additionalProperties": {} }),
            json!({ "typeId": 1, "additionalProperties": {} }),
            json!({ "typeId": 1, "isEnabled": true }),
            json!({ "typeId": "not-a-number", "isEnabled": true }),
            json!({}),
        ] {
            assert_eq!(
                RequestSnapshot::extract(&body, &fields),
                Err(SnapshotError::MissingRequired)
            );
        }
    }

    #[test]
    fn test_malformed_shapes() {
        let fields = RequestFields::default();
        for body in [
            json!([1, 2, 3]),
            json!("text"),
            json!({ "typeId": 1.5, "isEnabled": true, "additionalProperties": {} }),
            json!({ "typeId": [1], "isEnabled": true, "additionalProperties": {} }),
            json!({ "typeId": 1, "isEnabled": true, "additionalProperties": "oops" }),
            json!({ "typeId": 1, "isEnabled": true, "additionalProperties": null }),
        ] {
            assert_eq!(
                RequestSnapshot::extract(&body, &fields),
                Err(SnapshotError::Malformed)
            );
        }
    }

    #[test]
    fn test_custom_field_names() {
        let fields = RequestFields {
            subtype: "kind".into(),
            trigger: "active".into(),
            attributes: "props".into(),
        };
        assert_eq!(fields.missing_message(), "Missing required fields (kind, active, props).");

        let body = json!({ "kind": 4, "active": 1, "props": { "x": 1 } });
        let snapshot = RequestSnapshot::extract(&body, &fields).unwrap();
        assert_eq!(snapshot.subtype, SubtypeKey::Id(4));
    }

    #[test]
    fn test_default_missing_message() {
        assert_eq!(
            RequestFields::default().missing_message(),
            "Missing required fields (typeId, isEnabled, additionalProperties)."
        );
    }
}
