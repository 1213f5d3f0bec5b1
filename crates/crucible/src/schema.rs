//! Field schema model
//!
//! In-memory representation of a fact-find schema: an ordered set of named,
//! typed fields, possibly nested. Schemas are produced by an external
//! template-derivation step, loaded once per experiment, and immutable
//! thereafter. A schema carries a content fingerprint so that evaluation can
//! detect artifacts generated against a different schema.

use std::collections::HashSet;
use std::path::Path;

use common::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Field type - the variant dimension the generator and comparator
/// pattern-match on
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// Free text (names, addresses, notes)
    Text,
    /// Numeric value (balances, incomes, rates)
    Number,
    /// Calendar date
    Date,
    /// Yes/no flag
    Boolean,
    /// One of a closed set of options
    Choice(Vec<String>),
    /// Nested sub-schema
    Record(Schema),
    /// Homogeneous sequence of a sub-kind
    Sequence(Box<FieldKind>),
}

impl FieldKind {
    /// Canonical type name used in schema files and error messages
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Number => "number",
            FieldKind::Date => "date",
            FieldKind::Boolean => "boolean",
            FieldKind::Choice(_) => "enum",
            FieldKind::Record(_) => "record",
            FieldKind::Sequence(_) => "sequence",
        }
    }

    /// Whether values of this kind are leaves (scalar) rather than containers
    pub fn is_scalar(&self) -> bool {
        !matches!(self, FieldKind::Record(_) | FieldKind::Sequence(_))
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A single field definition
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Field name - identity, unique within its nesting level
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
    pub description: Option<String>,
}

impl Field {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            description: None,
        }
    }

    /// Mark as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Set description
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }
}

/// An ordered, validated set of fields
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub fields: Vec<Field>,
}

impl Schema {
    /// Build a schema, checking name uniqueness and kind well-formedness
    /// at every nesting level
    pub fn new(fields: Vec<Field>) -> Result<Self> {
        let mut seen = HashSet::new();
        for field in &fields {
            if field.name.is_empty() {
                return Err(Error::schema("field with empty name"));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(Error::schema(format!(
                    "duplicate field name '{}'",
                    field.name
                )));
            }
            check_kind(&field.name, &field.kind)?;
        }
        Ok(Self { fields })
    }

    /// Look up a field by name at this level
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Load a schema from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let raw: RawSchema = serde_json::from_str(&content)?;
        raw.into_schema()
    }

    /// Parse a schema from a JSON document
    pub fn from_json(json: &JsonValue) -> Result<Self> {
        let raw: RawSchema = serde_json::from_value(json.clone())?;
        raw.into_schema()
    }

    /// Serialize to the canonical schema file format
    pub fn to_json(&self) -> JsonValue {
        serde_json::to_value(RawSchema::from_schema(self)).unwrap_or(JsonValue::Null)
    }

    /// Content fingerprint over the canonical serialization
    ///
    /// Two schemas fingerprint equal iff their canonical JSON is identical,
    /// including field order.
    pub fn fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};
        let canonical = serde_json::to_string(&RawSchema::from_schema(self)).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

fn check_kind(name: &str, kind: &FieldKind) -> Result<()> {
    match kind {
        FieldKind::Choice(options) => {
            if options.is_empty() {
                return Err(Error::schema(format!(
                    "enum field '{}' declares no options",
                    name
                )));
            }
            let mut seen = HashSet::new();
            for opt in options {
                if !seen.insert(opt.as_str()) {
                    return Err(Error::schema(format!(
                        "enum field '{}' has duplicate option '{}'",
                        name, opt
                    )));
                }
            }
            Ok(())
        }
        FieldKind::Sequence(inner) => check_kind(name, inner),
        // Nested schemas are validated by Schema::new on construction
        _ => Ok(()),
    }
}

// =============================================================================
// External JSON schema format
// =============================================================================

/// On-disk schema format (human-friendly), converted to the internal model
/// with validation
#[derive(Debug, Serialize, Deserialize)]
struct RawSchema {
    fields: Vec<RawField>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawField {
    #[serde(default)]
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "is_false")]
    required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    /// For enum fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    options: Option<Vec<String>>,
    /// For record fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fields: Option<Vec<RawField>>,
    /// For sequence fields: the element definition (name is ignored)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    item: Option<Box<RawField>>,
}

fn is_false(b: &bool) -> bool {
    !b
}

impl RawSchema {
    fn into_schema(self) -> Result<Schema> {
        let fields = self
            .fields
            .into_iter()
            .map(|raw| raw.into_field(false))
            .collect::<Result<Vec<_>>>()?;
        Schema::new(fields)
    }

    fn from_schema(schema: &Schema) -> Self {
        Self {
            fields: schema.fields.iter().map(RawField::from_field).collect(),
        }
    }
}

impl RawField {
    fn into_field(self, unnamed: bool) -> Result<Field> {
        if self.name.is_empty() && !unnamed {
            return Err(Error::schema("field with no name"));
        }
        let kind = match self.kind.as_str() {
            "text" | "string" => FieldKind::Text,
            "number" => FieldKind::Number,
            "date" => FieldKind::Date,
            "boolean" | "bool" => FieldKind::Boolean,
            "enum" => {
                let options = self.options.unwrap_or_default();
                FieldKind::Choice(options)
            }
            "record" | "object" => {
                let fields = self
                    .fields
                    .ok_or_else(|| {
                        Error::schema(format!("record field '{}' declares no fields", self.name))
                    })?
                    .into_iter()
                    .map(|raw| raw.into_field(false))
                    .collect::<Result<Vec<_>>>()?;
                FieldKind::Record(Schema::new(fields)?)
            }
            "sequence" | "array" => {
                let item = self.item.ok_or_else(|| {
                    Error::schema(format!("sequence field '{}' declares no item", self.name))
                })?;
                FieldKind::Sequence(Box::new(item.into_field(true)?.kind))
            }
            other => {
                return Err(Error::schema(format!(
                    "field '{}' has unsupported type '{}'",
                    self.name, other
                )))
            }
        };
        let mut field = Field::new(self.name, kind);
        field.required = self.required;
        field.description = self.description;
        Ok(field)
    }

    fn from_field(field: &Field) -> Self {
        Self::from_kind(&field.kind, field.name.clone(), field.required, field.description.clone())
    }

    fn from_kind(kind: &FieldKind, name: String, required: bool, description: Option<String>) -> Self {
        let mut raw = Self {
            name,
            kind: kind.name().to_string(),
            required,
            description,
            options: None,
            fields: None,
            item: None,
        };
        match kind {
            FieldKind::Choice(options) => raw.options = Some(options.clone()),
            FieldKind::Record(schema) => {
                raw.fields = Some(schema.fields.iter().map(RawField::from_field).collect())
            }
            FieldKind::Sequence(inner) => {
                raw.item = Some(Box::new(Self::from_kind(inner, String::new(), false, None)))
            }
            _ => {}
        }
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_json() -> JsonValue {
        json!({
            "fields": [
                {"name": "full_name", "type": "text", "required": true},
                {"name": "annual_income", "type": "number"},
                {"name": "date_of_birth", "type": "date"},
                {"name": "homeowner", "type": "boolean"},
                {"name": "risk_tolerance", "type": "enum", "options": ["low", "medium", "high"]},
                {"name": "address", "type": "record", "fields": [
                    {"name": "city", "type": "text"},
                    {"name": "postcode", "type": "text"}
                ]},
                {"name": "accounts", "type": "sequence", "item": {"type": "record", "fields": [
                    {"name": "provider", "type": "text"},
                    {"name": "balance", "type": "number"}
                ]}}
            ]
        })
    }

    #[test]
    fn test_parse_sample_schema() {
        let schema = Schema::from_json(&sample_json()).unwrap();
        assert_eq!(schema.fields.len(), 7);
        assert!(schema.field("full_name").unwrap().required);
        assert_eq!(schema.field("annual_income").unwrap().kind, FieldKind::Number);

        match &schema.field("risk_tolerance").unwrap().kind {
            FieldKind::Choice(options) => assert_eq!(options.len(), 3),
            other => panic!("expected enum, got {}", other),
        }

        match &schema.field("accounts").unwrap().kind {
            FieldKind::Sequence(inner) => match inner.as_ref() {
                FieldKind::Record(sub) => assert!(sub.field("balance").is_some()),
                other => panic!("expected record item, got {}", other),
            },
            other => panic!("expected sequence, got {}", other),
        }
    }

    #[test]
    fn test_duplicate_field_names_rejected() {
        let json = json!({"fields": [
            {"name": "city", "type": "text"},
            {"name": "city", "type": "number"}
        ]});
        let err = Schema::from_json(&json).unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[test]
    fn test_unsupported_type_rejected() {
        let json = json!({"fields": [{"name": "photo", "type": "blob"}]});
        let err = Schema::from_json(&json).unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[test]
    fn test_enum_without_options_rejected() {
        let json = json!({"fields": [{"name": "tier", "type": "enum"}]});
        assert!(matches!(
            Schema::from_json(&json).unwrap_err(),
            Error::Schema(_)
        ));
    }

    #[test]
    fn test_record_without_fields_rejected() {
        let json = json!({"fields": [{"name": "address", "type": "record"}]});
        assert!(matches!(
            Schema::from_json(&json).unwrap_err(),
            Error::Schema(_)
        ));
    }

    #[test]
    fn test_json_round_trip() {
        let schema = Schema::from_json(&sample_json()).unwrap();
        let round = Schema::from_json(&schema.to_json()).unwrap();
        assert_eq!(schema, round);
    }

    #[test]
    fn test_fingerprint_stable_and_sensitive() {
        let a = Schema::from_json(&sample_json()).unwrap();
        let b = Schema::from_json(&sample_json()).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());

        let mut altered = sample_json();
        altered["fields"][0]["name"] = json!("client_name");
        let c = Schema::from_json(&altered).unwrap();
        assert_ne!(a.fingerprint(), c.fingerprint());
    }
}
