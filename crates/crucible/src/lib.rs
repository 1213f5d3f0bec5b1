//! Ground-truth synthesis and extraction scoring
//!
//! The core of the fact-find evaluation pipeline: schema-driven record
//! generation, disclosure obfuscation, and verdict-based scoring of
//! extractor output. Everything here is deterministic given a seed; LLM
//! access lives in the harness, not in this crate.

pub mod artifact;
pub mod evaluate;
pub mod generate;
pub mod obfuscate;
pub mod schema;
pub mod value;

pub use artifact::{ExtractionArtifact, GroundTruthArtifact};
pub use evaluate::{
    ComparatorConfig, EvaluationReport, Evaluator, FieldVerdict, MetricSet, StatusCounts,
    VerdictStatus,
};
pub use generate::{Generator, GeneratorConfig};
pub use obfuscate::{DisclosureMap, DisclosureStatus, ObfuscationConfig, Obfuscator};
pub use schema::{Field, FieldKind, Schema};
pub use value::{Record, Value};
