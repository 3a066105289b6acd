//! Stored form of a recall model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::model::{RecallModel, Strength, SCHEMA_VERSION};
use crate::error::{Error, Result};

/// Model document as written under a `model/` key.
///
/// All fields are optional: `{}` is the unknown (or tombstoned) model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strength_a: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strength_b: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_half_life_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
}

impl ModelDocument {
    pub fn from_model(model: &RecallModel) -> Self {
        Self {
            strength_a: Some(model.strength.alpha),
            strength_b: Some(model.strength.beta),
            reference_half_life_hours: Some(model.strength.half_life_hours),
            last_seen: Some(model.last_seen),
            schema_version: Some(SCHEMA_VERSION.to_string()),
        }
    }

    /// The model this document describes, `None` when it is empty.
    pub fn into_model(self) -> Result<Option<RecallModel>> {
        if let Some(version) = &self.schema_version {
            if version != SCHEMA_VERSION {
                return Err(Error::model(format!(
                    "unsupported model schema version {version:?}"
                )));
            }
        }
        match (
            self.strength_a,
            self.strength_b,
            self.reference_half_life_hours,
            self.last_seen,
        ) {
            (None, None, None, None) => Ok(None),
            (Some(a), Some(b), Some(t), Some(last_seen)) => Ok(Some(RecallModel {
                strength: Strength::new(a, b, t)?,
                last_seen,
            })),
            _ => Err(Error::model("incomplete model document")),
        }
    }
}

/// Decode a raw store document into an optional model.
pub fn decode_model(doc: &Value) -> Result<Option<RecallModel>> {
    if doc.as_object().is_some_and(|fields| fields.is_empty()) || doc.is_null() {
        return Ok(None);
    }
    let parsed: ModelDocument = serde_json::from_value(doc.clone())?;
    parsed.into_model()
}

/// Encode a model as a raw store document.
pub fn encode_model(model: &RecallModel) -> Result<Value> {
    Ok(serde_json::to_value(ModelDocument::from_model(model))?)
}

/// Write `model`'s fields into `existing`, keeping any fields it does not own.
pub fn merge_model(existing: Value, model: &RecallModel) -> Result<Value> {
    let encoded = encode_model(model)?;
    let mut merged = match existing {
        Value::Object(fields) => fields,
        _ => serde_json::Map::new(),
    };
    if let Value::Object(fields) = encoded {
        merged.extend(fields);
    }
    Ok(Value::Object(merged))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn model() -> RecallModel {
        RecallModel {
            strength: Strength::new(3.5, 3.0, 0.5).unwrap(),
            last_seen: Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_document_field_names() {
        let doc = encode_model(&model()).unwrap();
        assert_eq!(
            doc,
            json!({
                "strengthA": 3.5,
                "strengthB": 3.0,
                "referenceHalfLifeHours": 0.5,
                "lastSeen": "2024-03-01T09:00:00Z",
                "schemaVersion": "1",
            })
        );
    }

    #[test]
    fn test_empty_document_is_unknown() {
        assert_eq!(decode_model(&json!({})).unwrap(), None);
        assert_eq!(decode_model(&Value::Null).unwrap(), None);
    }

    #[test]
    fn test_decode_ignores_foreign_fields() {
        let mut doc = encode_model(&model()).unwrap();
        doc["_rev"] = json!("3-abc");
        assert_eq!(decode_model(&doc).unwrap(), Some(model()));
    }

    #[test]
    fn test_partial_or_future_documents_fail() {
        assert!(decode_model(&json!({"strengthA": 1.0})).is_err());
        let mut doc = encode_model(&model()).unwrap();
        doc["schemaVersion"] = json!("2");
        assert!(decode_model(&doc).is_err());
    }

    #[test]
    fn test_merge_keeps_foreign_fields() {
        let merged = merge_model(json!({"_id": "model/x/meaning"}), &model()).unwrap();
        assert_eq!(merged["_id"], "model/x/meaning");
        assert_eq!(merged["strengthA"], 3.5);
        let fresh = merge_model(json!({}), &model()).unwrap();
        assert_eq!(fresh, encode_model(&model()).unwrap());
    }
}
