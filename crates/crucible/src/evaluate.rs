//! Extraction scoring
//!
//! Compares an extractor's output against the ground-truth record and its
//! disclosure map. Every leaf path of the ground truth receives a verdict;
//! withheld fields are scored on whether the extractor correctly left them
//! empty. Extraction quality problems are recorded as data, never raised:
//! the evaluator always completes and returns a report.

use common::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::obfuscate::{DisclosureMap, DisclosureStatus};
use crate::schema::Schema;
use crate::value::{flatten_json, Record, Value};

/// Tolerances for type-aware value comparison
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparatorConfig {
    /// Two numbers match when they differ by at most this much
    #[serde(default = "default_number_epsilon")]
    pub number_epsilon: f64,
    /// Two dates match when they differ by at most this many days
    #[serde(default)]
    pub date_tolerance_days: i64,
}

fn default_number_epsilon() -> f64 {
    0.01
}

impl Default for ComparatorConfig {
    fn default() -> Self {
        Self {
            number_epsilon: default_number_epsilon(),
            date_tolerance_days: 0,
        }
    }
}

/// Per-field outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictStatus {
    /// Extracted value matches the reference within tolerance
    ExactMatch,
    /// Right type, wrong value
    PartialMatch,
    /// Absent, null, or not coercible to the expected type
    Missed,
    /// A value was produced for a field that was never disclosed
    Hallucinated,
    /// An omitted field was correctly left empty
    CorrectlyWithheld,
}

/// Verdict for a single field path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldVerdict {
    pub path: String,
    pub disclosure: DisclosureStatus,
    pub status: VerdictStatus,
    pub expected: JsonValue,
    pub actual: JsonValue,
}

/// Counts of verdicts by status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub exact_match: usize,
    pub partial_match: usize,
    pub missed: usize,
    pub hallucinated: usize,
    pub correctly_withheld: usize,
}

impl StatusCounts {
    fn record(&mut self, status: VerdictStatus) {
        match status {
            VerdictStatus::ExactMatch => self.exact_match += 1,
            VerdictStatus::PartialMatch => self.partial_match += 1,
            VerdictStatus::Missed => self.missed += 1,
            VerdictStatus::Hallucinated => self.hallucinated += 1,
            VerdictStatus::CorrectlyWithheld => self.correctly_withheld += 1,
        }
    }

    /// Fields the extractor was expected to recover
    fn evaluable(&self) -> usize {
        self.exact_match + self.partial_match + self.missed
    }
}

/// Accuracy, precision, and recall over a set of verdicts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSet {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
}

impl MetricSet {
    fn from_counts(counts: &StatusCounts) -> Self {
        let exact = counts.exact_match as f64;
        Self {
            accuracy: ratio(exact, counts.evaluable() as f64),
            precision: ratio(
                exact,
                (counts.exact_match + counts.partial_match + counts.hallucinated) as f64,
            ),
            recall: ratio(
                exact,
                (counts.exact_match + counts.missed + counts.partial_match) as f64,
            ),
        }
    }
}

fn ratio(num: f64, denom: f64) -> f64 {
    if denom == 0.0 {
        0.0
    } else {
        num / denom
    }
}

/// Complete evaluation of one conversation's extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub schema_fingerprint: String,
    /// One verdict per ground-truth leaf path, in schema order
    pub verdicts: Vec<FieldVerdict>,
    pub counts: StatusCounts,
    /// Metrics over all evaluable fields
    pub metrics: MetricSet,
    /// Direct-recall performance: DISCLOSED fields only
    pub disclosed: MetricSet,
    /// Reasoning-extraction performance: INFERABLE fields only
    pub inferable: MetricSet,
    /// Paths in the extraction output that do not exist in the schema
    pub extraneous_fields: Vec<String>,
    pub extraneous_count: usize,
}

impl EvaluationReport {
    /// Canonical serialization; identical inputs yield identical bytes
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Scores extraction output against ground truth
pub struct Evaluator {
    comparator: ComparatorConfig,
}

impl Evaluator {
    pub fn new(comparator: ComparatorConfig) -> Self {
        Self { comparator }
    }

    /// Evaluate one extraction against its reference record
    ///
    /// `extraction_fingerprint` is the schema fingerprint recorded when the
    /// extraction artifact was produced; a mismatch with the ground truth's
    /// fingerprint aborts this conversation's evaluation.
    pub fn evaluate(
        &self,
        schema: &Schema,
        ground_truth: &Record,
        disclosure: &DisclosureMap,
        extraction: &JsonValue,
        extraction_fingerprint: &str,
    ) -> Result<EvaluationReport> {
        let fingerprint = schema.fingerprint();
        if extraction_fingerprint != fingerprint {
            return Err(Error::SchemaMismatch {
                expected: fingerprint,
                actual: extraction_fingerprint.to_string(),
            });
        }

        let truth_leaves = ground_truth.flatten();
        let extracted: Vec<(String, JsonValue)> = flatten_json(extraction);

        let mut verdicts = Vec::with_capacity(truth_leaves.len());
        let mut counts = StatusCounts::default();
        let mut disclosed_counts = StatusCounts::default();
        let mut inferable_counts = StatusCounts::default();

        for (path, expected) in &truth_leaves {
            let status_for_path = disclosure.get(path).copied().unwrap_or_else(|| {
                tracing::warn!(path = %path, "leaf missing from disclosure map, treating as disclosed");
                DisclosureStatus::Disclosed
            });
            let actual = extracted
                .iter()
                .find(|(p, _)| p == path)
                .map(|(_, v)| v.clone())
                .unwrap_or(JsonValue::Null);

            let status = match status_for_path {
                DisclosureStatus::Omitted => {
                    if actual.is_null() {
                        VerdictStatus::CorrectlyWithheld
                    } else {
                        VerdictStatus::Hallucinated
                    }
                }
                DisclosureStatus::Disclosed | DisclosureStatus::Inferable => {
                    self.judge_value(expected, &actual)
                }
            };

            counts.record(status);
            match status_for_path {
                DisclosureStatus::Disclosed => disclosed_counts.record(status),
                DisclosureStatus::Inferable => inferable_counts.record(status),
                DisclosureStatus::Omitted => {}
            }

            verdicts.push(FieldVerdict {
                path: path.clone(),
                disclosure: status_for_path,
                status,
                expected: expected.to_json(),
                actual,
            });
        }

        // Schema-violating extras get their own metric, not verdicts
        let truth_paths: std::collections::HashSet<&str> =
            truth_leaves.iter().map(|(p, _)| p.as_str()).collect();
        let extraneous_fields: Vec<String> = extracted
            .iter()
            .filter(|(p, _)| !truth_paths.contains(p.as_str()))
            .map(|(p, _)| p.clone())
            .collect();

        Ok(EvaluationReport {
            schema_fingerprint: fingerprint,
            metrics: MetricSet::from_counts(&counts),
            disclosed: MetricSet::from_counts(&disclosed_counts),
            inferable: MetricSet::from_counts(&inferable_counts),
            counts,
            verdicts,
            extraneous_count: extraneous_fields.len(),
            extraneous_fields,
        })
    }

    /// Type-aware comparison of a disclosed/inferable field
    fn judge_value(&self, expected: &Value, actual: &JsonValue) -> VerdictStatus {
        if actual.is_null() {
            return VerdictStatus::Missed;
        }
        // Ground truth nulls only occur on omitted fields, which are
        // handled before this point; treat a stray one as evaluable-empty.
        if expected.is_null() {
            return VerdictStatus::Missed;
        }
        let Some(coerced) = Value::coerce_like(expected, actual) else {
            // Wrong type entirely
            return VerdictStatus::Missed;
        };
        if self.values_match(expected, &coerced) {
            VerdictStatus::ExactMatch
        } else {
            VerdictStatus::PartialMatch
        }
    }

    fn values_match(&self, expected: &Value, actual: &Value) -> bool {
        match (expected, actual) {
            (Value::Text(a), Value::Text(b)) => normalize_text(a) == normalize_text(b),
            (Value::Number(a), Value::Number(b)) => {
                (a - b).abs() <= self.comparator.number_epsilon
            }
            (Value::Date(a), Value::Date(b)) => {
                (*a - *b).num_days().abs() <= self.comparator.date_tolerance_days
            }
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Choice(a), Value::Choice(b)) => a.eq_ignore_ascii_case(b),
            _ => false,
        }
    }
}

/// Case- and whitespace-insensitive text form
fn normalize_text(s: &str) -> String {
    s.split_whitespace()
        .map(|word| word.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obfuscate::DisclosureStatus;
    use crate::schema::Schema;
    use serde_json::json;

    fn balance_schema() -> Schema {
        Schema::from_json(&json!({
            "fields": [{"name": "balance", "type": "number"}]
        }))
        .unwrap()
    }

    fn balance_record(value: Value) -> Record {
        Record::new(vec![("balance".into(), value)])
    }

    fn one_field_map(status: DisclosureStatus) -> DisclosureMap {
        let mut map = DisclosureMap::new();
        map.insert("balance".into(), status);
        map
    }

    fn evaluate_one(
        expected: Value,
        status: DisclosureStatus,
        extraction: JsonValue,
        comparator: ComparatorConfig,
    ) -> EvaluationReport {
        let schema = balance_schema();
        let fingerprint = schema.fingerprint();
        Evaluator::new(comparator)
            .evaluate(
                &schema,
                &balance_record(expected),
                &one_field_map(status),
                &extraction,
                &fingerprint,
            )
            .unwrap()
    }

    #[test]
    fn test_disclosed_exact_match() {
        let report = evaluate_one(
            Value::Number(1000.0),
            DisclosureStatus::Disclosed,
            json!({"balance": 1000.0}),
            ComparatorConfig::default(),
        );
        assert_eq!(report.verdicts[0].status, VerdictStatus::ExactMatch);
        assert_eq!(report.metrics.accuracy, 1.0);
    }

    #[test]
    fn test_disclosed_missing_is_missed() {
        let report = evaluate_one(
            Value::Number(1000.0),
            DisclosureStatus::Disclosed,
            json!({}),
            ComparatorConfig::default(),
        );
        assert_eq!(report.verdicts[0].status, VerdictStatus::Missed);
        assert_eq!(report.metrics.accuracy, 0.0);
        assert_eq!(report.metrics.recall, 0.0);
    }

    #[test]
    fn test_omitted_with_value_is_hallucinated() {
        let report = evaluate_one(
            Value::Null,
            DisclosureStatus::Omitted,
            json!({"balance": 1000.0}),
            ComparatorConfig::default(),
        );
        assert_eq!(report.verdicts[0].status, VerdictStatus::Hallucinated);
        assert_eq!(report.counts.hallucinated, 1);
        // Hallucinations hurt precision even though the field was not evaluable
        assert_eq!(report.metrics.precision, 0.0);
    }

    #[test]
    fn test_omitted_absent_is_correctly_withheld() {
        let report = evaluate_one(
            Value::Null,
            DisclosureStatus::Omitted,
            json!({}),
            ComparatorConfig::default(),
        );
        assert_eq!(report.verdicts[0].status, VerdictStatus::CorrectlyWithheld);
    }

    #[test]
    fn test_number_epsilon_boundary() {
        let loose = ComparatorConfig {
            number_epsilon: 0.01,
            date_tolerance_days: 0,
        };
        let report = evaluate_one(
            Value::Number(1000.0),
            DisclosureStatus::Disclosed,
            json!({"balance": 1000.004}),
            loose,
        );
        assert_eq!(report.verdicts[0].status, VerdictStatus::ExactMatch);

        let tight = ComparatorConfig {
            number_epsilon: 0.001,
            date_tolerance_days: 0,
        };
        let report = evaluate_one(
            Value::Number(1000.0),
            DisclosureStatus::Disclosed,
            json!({"balance": 1000.004}),
            tight,
        );
        assert_eq!(report.verdicts[0].status, VerdictStatus::PartialMatch);
    }

    #[test]
    fn test_wrong_type_is_missed() {
        let report = evaluate_one(
            Value::Number(1000.0),
            DisclosureStatus::Disclosed,
            json!({"balance": {"nested": true}}),
            ComparatorConfig::default(),
        );
        assert_eq!(report.verdicts[0].status, VerdictStatus::Missed);
    }

    #[test]
    fn test_text_match_ignores_case_and_whitespace() {
        let schema = Schema::from_json(&json!({
            "fields": [{"name": "city", "type": "text"}]
        }))
        .unwrap();
        let fingerprint = schema.fingerprint();
        let record = Record::new(vec![("city".into(), Value::Text("Milton  Keynes".into()))]);
        let mut map = DisclosureMap::new();
        map.insert("city".into(), DisclosureStatus::Disclosed);

        let report = Evaluator::new(ComparatorConfig::default())
            .evaluate(&schema, &record, &map, &json!({"city": "milton keynes"}), &fingerprint)
            .unwrap();
        assert_eq!(report.verdicts[0].status, VerdictStatus::ExactMatch);
    }

    #[test]
    fn test_fingerprint_mismatch_rejected() {
        let schema = balance_schema();
        let err = Evaluator::new(ComparatorConfig::default())
            .evaluate(
                &schema,
                &balance_record(Value::Number(1.0)),
                &one_field_map(DisclosureStatus::Disclosed),
                &json!({"balance": 1.0}),
                "deadbeef",
            )
            .unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch { .. }));
    }

    #[test]
    fn test_extraneous_fields_counted_separately() {
        let report = evaluate_one(
            Value::Number(1000.0),
            DisclosureStatus::Disclosed,
            json!({"balance": 1000.0, "pet_name": "Rex", "extra": {"deep": 1}}),
            ComparatorConfig::default(),
        );
        assert_eq!(report.extraneous_count, 2);
        assert!(report.extraneous_fields.contains(&"pet_name".to_string()));
        assert!(report.extraneous_fields.contains(&"extra.deep".to_string()));
        // Extras never affect verdicts
        assert_eq!(report.verdicts.len(), 1);
        assert_eq!(report.metrics.accuracy, 1.0);
    }

    #[test]
    fn test_perfect_extraction_scores_one() {
        use crate::generate::{Generator, GeneratorConfig};
        use crate::obfuscate::{ObfuscationConfig, Obfuscator};
        use chrono::NaiveDate;

        let schema = Schema::from_json(&json!({
            "fields": [
                {"name": "full_name", "type": "text"},
                {"name": "annual_income", "type": "number"},
                {"name": "homeowner", "type": "boolean"},
                {"name": "risk_tolerance", "type": "enum", "options": ["low", "medium", "high"]},
                {"name": "date_of_birth", "type": "date"}
            ]
        }))
        .unwrap();

        let generator = Generator::new(GeneratorConfig {
            sequence_len_min: 1,
            sequence_len_max: 2,
            reference_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
        });
        let full = generator.generate(&schema, 21).unwrap();
        let obfuscator = Obfuscator::new(ObfuscationConfig {
            omit_ratio: 0.25,
            infer_ratio: 0.25,
            exempt_fields: vec![],
            obfuscate_sequence_items: false,
        });
        let (truth, disclosure) = obfuscator.obfuscate(&full, &schema, 21).unwrap();

        // An extractor that returns the ground truth verbatim, leaving
        // omitted fields null
        let extraction = truth.to_json();
        let report = Evaluator::new(ComparatorConfig::default())
            .evaluate(&schema, &truth, &disclosure, &extraction, &schema.fingerprint())
            .unwrap();

        for verdict in &report.verdicts {
            match verdict.disclosure {
                DisclosureStatus::Omitted => {
                    assert_eq!(verdict.status, VerdictStatus::CorrectlyWithheld)
                }
                _ => assert_eq!(verdict.status, VerdictStatus::ExactMatch),
            }
        }
        assert_eq!(report.metrics.accuracy, 1.0);
        assert_eq!(report.disclosed.accuracy, 1.0);
        assert_eq!(report.inferable.accuracy, 1.0);
        assert_eq!(report.extraneous_count, 0);
    }

    #[test]
    fn test_evaluation_idempotent() {
        let run = || {
            evaluate_one(
                Value::Number(1000.0),
                DisclosureStatus::Inferable,
                json!({"balance": "1,000.00", "spurious": 3}),
                ComparatorConfig::default(),
            )
            .to_json_string()
            .unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_subset_metrics_split_disclosed_and_inferable() {
        let schema = Schema::from_json(&json!({
            "fields": [
                {"name": "a", "type": "number"},
                {"name": "b", "type": "number"}
            ]
        }))
        .unwrap();
        let record = Record::new(vec![
            ("a".into(), Value::Number(1.0)),
            ("b".into(), Value::Number(2.0)),
        ]);
        let mut map = DisclosureMap::new();
        map.insert("a".into(), DisclosureStatus::Disclosed);
        map.insert("b".into(), DisclosureStatus::Inferable);

        // Disclosed field correct, inferable field missed
        let report = Evaluator::new(ComparatorConfig::default())
            .evaluate(&schema, &record, &map, &json!({"a": 1.0}), &schema.fingerprint())
            .unwrap();

        assert_eq!(report.disclosed.accuracy, 1.0);
        assert_eq!(report.inferable.accuracy, 0.0);
        assert_eq!(report.metrics.accuracy, 0.5);
    }
}
