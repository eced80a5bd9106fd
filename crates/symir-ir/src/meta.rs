//! Record metadata: a closed set of optional provenance keys.

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

pub const META_KEYS: [&str; 9] = [
    "source",
    "observed_at",
    "ingested_at",
    "confidence",
    "status",
    "evidence_id",
    "trace_id",
    "provenance",
    "tags",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Asserted,
    Inferred,
    Retracted,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Meta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingested_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RecordStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl Meta {
    /// Parse a JSON object, reporting unknown keys (sorted) before shape errors.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, SchemaError> {
        let object = match value {
            serde_json::Value::Null => return Ok(Self::default()),
            serde_json::Value::Object(object) => object,
            _ => {
                return Err(SchemaError::InvalidMeta {
                    key: "meta".to_string(),
                    reason: "must be an object".to_string(),
                })
            }
        };
        let mut unknown: Vec<String> = object
            .keys()
            .filter(|k| !META_KEYS.contains(&k.as_str()))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            unknown.sort();
            return Err(SchemaError::UnknownMetaKeys(unknown));
        }
        let meta: Meta = serde_json::from_value(value.clone()).map_err(|e| SchemaError::InvalidMeta {
            key: "meta".to_string(),
            reason: e.to_string(),
        })?;
        meta.validate()?;
        Ok(meta)
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        if let Some(c) = self.confidence {
            if !(0.0..=1.0).contains(&c) {
                return Err(SchemaError::InvalidMeta {
                    key: "confidence".to_string(),
                    reason: format!("{c} is outside [0.0, 1.0]"),
                });
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn to_json(&self) -> Result<serde_json::Map<String, serde_json::Value>, SchemaError> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map),
            _ => Ok(serde_json::Map::new()),
        }
    }
}
