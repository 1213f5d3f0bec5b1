//! Typed values and records
//!
//! Values are a tagged variant type mirroring [`FieldKind`](crate::schema::FieldKind)
//! so the generator and comparator can pattern-match exhaustively instead of
//! duck-typing JSON. A [`Record`] is a schema-conformant tree of values,
//! addressable by dot/`[i]` field paths.

use chrono::NaiveDate;
use common::{Error, Result};
use serde_json::Value as JsonValue;

use crate::schema::{FieldKind, Schema};

/// Date format used in all artifacts
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A typed field value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Number(f64),
    Date(NaiveDate),
    Bool(bool),
    /// A selected enum option
    Choice(String),
    /// Nested record, order-preserving
    Record(Vec<(String, Value)>),
    Sequence(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Text(_) => "text",
            Value::Number(_) => "number",
            Value::Date(_) => "date",
            Value::Bool(_) => "boolean",
            Value::Choice(_) => "enum",
            Value::Record(_) => "record",
            Value::Sequence(_) => "sequence",
        }
    }

    /// Convert to plain JSON for artifacts and prompts
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Text(s) => JsonValue::String(s.clone()),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Value::Date(d) => JsonValue::String(d.format(DATE_FORMAT).to_string()),
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Choice(s) => JsonValue::String(s.clone()),
            Value::Record(entries) => {
                let mut map = serde_json::Map::new();
                for (name, value) in entries {
                    map.insert(name.clone(), value.to_json());
                }
                JsonValue::Object(map)
            }
            Value::Sequence(items) => {
                JsonValue::Array(items.iter().map(Value::to_json).collect())
            }
        }
    }

    /// Parse a JSON value into a typed value of the given kind
    ///
    /// Strict: used for loading our own artifacts back, so shape violations
    /// are schema errors. Nulls are accepted anywhere (obfuscated fields).
    pub fn from_json(json: &JsonValue, kind: &FieldKind) -> Result<Value> {
        if json.is_null() {
            return Ok(Value::Null);
        }
        match kind {
            FieldKind::Text => json
                .as_str()
                .map(|s| Value::Text(s.to_string()))
                .ok_or_else(|| type_error(kind, json)),
            FieldKind::Number => parse_number(json).ok_or_else(|| type_error(kind, json)),
            FieldKind::Date => json
                .as_str()
                .and_then(parse_date)
                .map(Value::Date)
                .ok_or_else(|| type_error(kind, json)),
            FieldKind::Boolean => parse_bool(json).ok_or_else(|| type_error(kind, json)),
            FieldKind::Choice(options) => {
                let s = json.as_str().ok_or_else(|| type_error(kind, json))?;
                options
                    .iter()
                    .find(|opt| opt.eq_ignore_ascii_case(s))
                    .map(|opt| Value::Choice(opt.clone()))
                    .ok_or_else(|| {
                        Error::schema(format!("'{}' is not a declared enum option", s))
                    })
            }
            FieldKind::Record(schema) => {
                let obj = json.as_object().ok_or_else(|| type_error(kind, json))?;
                let mut entries = Vec::with_capacity(schema.fields.len());
                for field in &schema.fields {
                    let value = match obj.get(&field.name) {
                        Some(v) => Value::from_json(v, &field.kind)?,
                        None => Value::Null,
                    };
                    entries.push((field.name.clone(), value));
                }
                Ok(Value::Record(entries))
            }
            FieldKind::Sequence(inner) => {
                let arr = json.as_array().ok_or_else(|| type_error(kind, json))?;
                let items = arr
                    .iter()
                    .map(|item| Value::from_json(item, inner))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::Sequence(items))
            }
        }
    }

    /// Best-effort coercion of untrusted JSON into the same variant as
    /// `expected`. Returns `None` when the shapes are irreconcilable,
    /// which the evaluator treats as a type mismatch.
    pub fn coerce_like(expected: &Value, actual: &JsonValue) -> Option<Value> {
        if actual.is_null() {
            return Some(Value::Null);
        }
        match expected {
            Value::Null => Some(Value::Null),
            Value::Text(_) => actual.as_str().map(|s| Value::Text(s.to_string())),
            Value::Number(_) => parse_number(actual),
            Value::Date(_) => actual.as_str().and_then(parse_date).map(Value::Date),
            Value::Bool(_) => parse_bool(actual),
            Value::Choice(_) => actual.as_str().map(|s| Value::Choice(s.to_string())),
            // Containers are never compared directly; their leaves are.
            Value::Record(_) | Value::Sequence(_) => None,
        }
    }
}

fn type_error(kind: &FieldKind, json: &JsonValue) -> Error {
    Error::schema(format!("expected {} value, got {}", kind, json))
}

fn parse_number(json: &JsonValue) -> Option<Value> {
    match json {
        JsonValue::Number(n) => n.as_f64().map(Value::Number),
        // Extractors often quote amounts ("125000.00", "£1,200")
        JsonValue::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            cleaned.parse::<f64>().ok().map(Value::Number)
        }
        _ => None,
    }
}

fn parse_bool(json: &JsonValue) -> Option<Value> {
    match json {
        JsonValue::Bool(b) => Some(Value::Bool(*b)),
        JsonValue::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" => Some(Value::Bool(true)),
            "false" | "no" => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    }
}

/// Parse a date in the artifact format or common transcript variants
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    for format in [DATE_FORMAT, "%d/%m/%Y", "%m/%d/%Y", "%d %B %Y", "%B %d, %Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return Some(date);
        }
    }
    None
}

// =============================================================================
// Records and field paths
// =============================================================================

/// A schema-conformant record of field values
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    entries: Vec<(String, Value)>,
}

impl Record {
    pub fn new(entries: Vec<(String, Value)>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[(String, Value)] {
        &self.entries
    }

    /// Parse a JSON object into a record shaped by the schema
    pub fn from_json(json: &JsonValue, schema: &Schema) -> Result<Self> {
        match Value::from_json(json, &FieldKind::Record(schema.clone()))? {
            Value::Record(entries) => Ok(Self { entries }),
            _ => Err(Error::schema("record artifact is not a JSON object")),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        Value::Record(self.entries.clone()).to_json()
    }

    /// All leaf paths with their values, depth-first in schema order
    pub fn flatten(&self) -> Vec<(String, &Value)> {
        let mut leaves = Vec::new();
        flatten_entries(&self.entries, "", &mut leaves);
        leaves
    }

    /// Leaf value at a dot/`[i]` path
    pub fn get(&self, path: &str) -> Option<&Value> {
        self.flatten()
            .into_iter()
            .find(|(p, _)| p == path)
            .map(|(_, v)| v)
    }

    /// Copy of this record with the given leaf paths cleared to null
    ///
    /// Unknown paths are ignored; the obfuscation engine only passes paths
    /// it took from [`Record::flatten`].
    pub fn with_nulled(&self, paths: &[String]) -> Record {
        let mut root = Value::Record(self.entries.clone());
        for path in paths {
            null_out(&mut root, path);
        }
        let Value::Record(entries) = root else {
            return self.clone();
        };
        Record { entries }
    }

    /// Check structural and type conformance against a schema
    ///
    /// Nulls are accepted at any leaf; obfuscated records stay valid.
    pub fn validate(&self, schema: &Schema) -> Result<()> {
        validate_record(&self.entries, schema)
    }

    /// True when no leaf is null
    pub fn is_fully_populated(&self) -> bool {
        self.flatten().iter().all(|(_, v)| !v.is_null())
    }
}

fn flatten_entries<'a>(
    entries: &'a [(String, Value)],
    prefix: &str,
    out: &mut Vec<(String, &'a Value)>,
) {
    for (name, value) in entries {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{}.{}", prefix, name)
        };
        flatten_value(value, &path, out);
    }
}

fn flatten_value<'a>(value: &'a Value, path: &str, out: &mut Vec<(String, &'a Value)>) {
    match value {
        Value::Record(entries) => flatten_entries(entries, path, out),
        Value::Sequence(items) => {
            for (i, item) in items.iter().enumerate() {
                flatten_value(item, &format!("{}[{}]", path, i), out);
            }
        }
        leaf => out.push((path.to_string(), leaf)),
    }
}

/// Flatten arbitrary JSON (extraction output) into leaf paths
///
/// Extraction output is not assumed schema-valid, so this works over raw
/// JSON rather than typed values.
pub fn flatten_json(json: &JsonValue) -> Vec<(String, JsonValue)> {
    let mut leaves = Vec::new();
    flatten_json_inner(json, "", &mut leaves);
    leaves
}

fn flatten_json_inner(json: &JsonValue, path: &str, out: &mut Vec<(String, JsonValue)>) {
    match json {
        JsonValue::Object(map) => {
            for (key, value) in map {
                let child = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", path, key)
                };
                flatten_json_inner(value, &child, out);
            }
        }
        JsonValue::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                flatten_json_inner(item, &format!("{}[{}]", path, i), out);
            }
        }
        leaf => out.push((path.to_string(), leaf.clone())),
    }
}

fn null_out(root: &mut Value, path: &str) -> bool {
    let mut current = root;
    for segment in parse_path(path) {
        let next = match segment {
            PathSegment::Field(name) => match current {
                Value::Record(entries) => entries
                    .iter_mut()
                    .find(|(n, _)| *n == name)
                    .map(|(_, v)| v),
                _ => None,
            },
            PathSegment::Index(i) => match current {
                Value::Sequence(items) => items.get_mut(i),
                _ => None,
            },
        };
        match next {
            Some(value) => current = value,
            None => return false,
        }
    }
    *current = Value::Null;
    true
}

#[derive(Debug, PartialEq)]
enum PathSegment {
    Field(String),
    Index(usize),
}

fn parse_path(path: &str) -> Vec<PathSegment> {
    let mut segments = Vec::new();
    for part in path.split('.') {
        let mut rest = part;
        if let Some(bracket) = rest.find('[') {
            segments.push(PathSegment::Field(rest[..bracket].to_string()));
            rest = &rest[bracket..];
            while let Some(close) = rest.find(']') {
                if let Ok(i) = rest[1..close].parse::<usize>() {
                    segments.push(PathSegment::Index(i));
                }
                rest = &rest[close + 1..];
                if !rest.starts_with('[') {
                    break;
                }
            }
        } else {
            segments.push(PathSegment::Field(rest.to_string()));
        }
    }
    segments
}

fn validate_record(entries: &[(String, Value)], schema: &Schema) -> Result<()> {
    for (name, value) in entries {
        let field = schema
            .field(name)
            .ok_or_else(|| Error::schema(format!("field '{}' not in schema", name)))?;
        validate_value(name, value, &field.kind)?;
    }
    Ok(())
}

fn validate_value(name: &str, value: &Value, kind: &FieldKind) -> Result<()> {
    match (value, kind) {
        (Value::Null, _) => Ok(()),
        (Value::Text(_), FieldKind::Text) => Ok(()),
        (Value::Number(_), FieldKind::Number) => Ok(()),
        (Value::Date(_), FieldKind::Date) => Ok(()),
        (Value::Bool(_), FieldKind::Boolean) => Ok(()),
        (Value::Choice(s), FieldKind::Choice(options)) => {
            if options.iter().any(|opt| opt == s) {
                Ok(())
            } else {
                Err(Error::schema(format!(
                    "field '{}': '{}' is not a declared option",
                    name, s
                )))
            }
        }
        (Value::Record(entries), FieldKind::Record(sub)) => validate_record(entries, sub),
        (Value::Sequence(items), FieldKind::Sequence(inner)) => {
            for item in items {
                validate_value(name, item, inner)?;
            }
            Ok(())
        }
        (value, kind) => Err(Error::schema(format!(
            "field '{}': expected {}, got {}",
            name,
            kind,
            value.type_name()
        ))),
    }
}
