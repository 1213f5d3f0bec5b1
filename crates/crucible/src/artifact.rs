//! Persisted pipeline artifacts
//!
//! The ground-truth and extraction artifacts are the on-disk contract
//! between pipeline stages. Each one carries the schema fingerprint it was
//! produced under so that later stages can refuse stale combinations.

use common::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::obfuscate::DisclosureMap;
use crate::schema::Schema;
use crate::value::Record;

/// Reference record plus its disclosure plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundTruthArtifact {
    pub schema_fingerprint: String,
    /// The obfuscated record; omitted fields hold null
    pub record: JsonValue,
    pub disclosure: DisclosureMap,
}

impl GroundTruthArtifact {
    pub fn new(schema: &Schema, record: &Record, disclosure: DisclosureMap) -> Self {
        Self {
            schema_fingerprint: schema.fingerprint(),
            record: record.to_json(),
            disclosure,
        }
    }

    /// Rehydrate the record, checking it still belongs to `schema`
    pub fn record(&self, schema: &Schema) -> Result<Record> {
        let fingerprint = schema.fingerprint();
        if self.schema_fingerprint != fingerprint {
            return Err(Error::SchemaMismatch {
                expected: fingerprint,
                actual: self.schema_fingerprint.clone(),
            });
        }
        Record::from_json(&self.record, schema)
    }
}

/// Raw extractor output as captured from the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionArtifact {
    pub schema_fingerprint: String,
    pub record: JsonValue,
}

impl ExtractionArtifact {
    pub fn new(schema: &Schema, record: JsonValue) -> Self {
        Self {
            schema_fingerprint: schema.fingerprint(),
            record,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::from_json(&json!({
            "fields": [{"name": "balance", "type": "number"}]
        }))
        .unwrap()
    }

    #[test]
    fn test_ground_truth_round_trip() {
        let schema = schema();
        let record = Record::new(vec![("balance".into(), Value::Number(42.0))]);
        let artifact = GroundTruthArtifact::new(&schema, &record, DisclosureMap::new());
        let restored = artifact.record(&schema).unwrap();
        assert_eq!(restored, record);
    }

    #[test]
    fn test_stale_artifact_rejected() {
        let schema = schema();
        let record = Record::new(vec![("balance".into(), Value::Number(42.0))]);
        let mut artifact = GroundTruthArtifact::new(&schema, &record, DisclosureMap::new());
        artifact.schema_fingerprint = "deadbeef".into();
        assert!(matches!(
            artifact.record(&schema).unwrap_err(),
            Error::SchemaMismatch { .. }
        ));
    }
}
