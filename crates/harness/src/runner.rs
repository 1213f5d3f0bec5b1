//! Experiment pipeline
//!
//! Drives the full loop for each conversation: generate ground truth,
//! obfuscate, synthesize a transcript, extract, evaluate, persist. A failed
//! conversation is logged and skipped; the run continues and aggregation
//! covers whatever completed.

use anyhow::{Context, Result};
use crucible::{
    ComparatorConfig, EvaluationReport, Evaluator, ExtractionArtifact, Generator,
    GeneratorConfig, GroundTruthArtifact, MetricSet, ObfuscationConfig, Obfuscator, Schema,
};
use serde::{Deserialize, Serialize};

use crate::extraction::TranscriptExtractor;
use crate::store::{
    ExperimentStore, AGGREGATE_FILE, CONVERSATION_FILE, EVALUATION_FILE, EXTRACTION_FILE,
    GROUND_TRUTH_FILE, SCHEMA_FILE,
};
use crate::synthesis::ConversationSynthesizer;

pub struct Runner {
    pub generator: Generator,
    pub obfuscator: Obfuscator,
    pub comparator: ComparatorConfig,
    pub synthesizer: ConversationSynthesizer,
    pub extractor: TranscriptExtractor,
}

impl Runner {
    pub fn new(
        generator_config: GeneratorConfig,
        obfuscation_config: ObfuscationConfig,
        comparator: ComparatorConfig,
        synthesizer: ConversationSynthesizer,
        extractor: TranscriptExtractor,
    ) -> Self {
        Self {
            generator: Generator::new(generator_config),
            obfuscator: Obfuscator::new(obfuscation_config),
            comparator,
            synthesizer,
            extractor,
        }
    }

    /// Run `count` conversations, numbered from 0
    ///
    /// Returns the number that completed through evaluation.
    pub async fn run(
        &self,
        store: &ExperimentStore,
        schema: &Schema,
        count: usize,
        base_seed: u64,
    ) -> Result<usize> {
        store
            .save_root_json(SCHEMA_FILE, &schema.to_json())
            .context("Failed to persist schema")?;

        let mut completed = 0;
        for index in 0..count {
            let seed = base_seed.wrapping_add(index as u64);
            match self.run_one(store, schema, index, seed).await {
                Ok(report) => {
                    completed += 1;
                    tracing::info!(
                        conversation = index,
                        accuracy = report.metrics.accuracy,
                        "conversation evaluated"
                    );
                }
                Err(e) => {
                    tracing::error!(conversation = index, error = %e, "conversation failed, skipping");
                }
            }
        }
        Ok(completed)
    }

    /// One conversation end to end
    async fn run_one(
        &self,
        store: &ExperimentStore,
        schema: &Schema,
        index: usize,
        seed: u64,
    ) -> Result<EvaluationReport> {
        let full_record = self.generator.generate(schema, seed)?;
        let (truth, disclosure) = self.obfuscator.obfuscate(&full_record, schema, seed)?;
        let ground_truth = GroundTruthArtifact::new(schema, &truth, disclosure);
        store.save_json(index, GROUND_TRUTH_FILE, &ground_truth)?;

        let transcript = self
            .synthesizer
            .synthesize(&truth, &ground_truth.disclosure)
            .await?;
        store.save_text(index, CONVERSATION_FILE, &transcript)?;

        let extraction = self.extractor.extract(schema, &transcript).await?;
        store.save_json(index, EXTRACTION_FILE, &extraction)?;

        let report = evaluate_conversation(schema, &ground_truth, &extraction, &self.comparator)?;
        store.save_json(index, EVALUATION_FILE, &report)?;
        Ok(report)
    }
}

/// Score one persisted conversation
pub fn evaluate_conversation(
    schema: &Schema,
    ground_truth: &GroundTruthArtifact,
    extraction: &ExtractionArtifact,
    comparator: &ComparatorConfig,
) -> Result<EvaluationReport> {
    let truth = ground_truth.record(schema)?;
    let report = Evaluator::new(comparator.clone()).evaluate(
        schema,
        &truth,
        &ground_truth.disclosure,
        &extraction.record,
        &extraction.schema_fingerprint,
    )?;
    Ok(report)
}

/// Re-evaluate a stored conversation from its artifacts
pub fn evaluate_stored(
    store: &ExperimentStore,
    index: usize,
    comparator: &ComparatorConfig,
) -> Result<EvaluationReport> {
    let schema_json: serde_json::Value = store.load_root_json(SCHEMA_FILE)?;
    let schema = Schema::from_json(&schema_json)?;
    let ground_truth: GroundTruthArtifact = store.load_json(index, GROUND_TRUTH_FILE)?;
    let extraction: ExtractionArtifact = store.load_json(index, EXTRACTION_FILE)?;
    let report = evaluate_conversation(&schema, &ground_truth, &extraction, comparator)?;
    store.save_json(index, EVALUATION_FILE, &report)?;
    Ok(report)
}

/// Re-score a batch of stored conversations
///
/// A conversation that fails to re-score is logged and skipped, same as
/// the run path; a fingerprint mismatch is fatal for that conversation
/// only. Returns the successful reports by index plus the failure count.
pub fn evaluate_stored_batch(
    store: &ExperimentStore,
    indices: &[usize],
    comparator: &ComparatorConfig,
) -> (Vec<(usize, EvaluationReport)>, usize) {
    let mut reports = Vec::new();
    let mut failed = 0;
    for &index in indices {
        match evaluate_stored(store, index, comparator) {
            Ok(report) => reports.push((index, report)),
            Err(e) => {
                failed += 1;
                match e.downcast_ref::<common::Error>() {
                    Some(common::Error::SchemaMismatch { .. }) => tracing::error!(
                        conversation = index,
                        error = %e,
                        "artifacts belong to a different schema, skipping"
                    ),
                    _ => tracing::error!(
                        conversation = index,
                        error = %e,
                        "re-scoring failed, skipping"
                    ),
                }
            }
        }
    }
    (reports, failed)
}

/// Mean metrics across an experiment's evaluated conversations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateReport {
    pub conversations: usize,
    pub skipped: usize,
    pub metrics: MetricSet,
    pub disclosed: MetricSet,
    pub inferable: MetricSet,
    pub total_hallucinated: usize,
    pub total_extraneous: usize,
}

impl AggregateReport {
    pub fn print_summary(&self) {
        println!("\n=== Aggregate Results ===");
        println!(
            "Conversations: {} evaluated, {} skipped",
            self.conversations, self.skipped
        );
        println!(
            "Overall:    accuracy={:.3}  precision={:.3}  recall={:.3}",
            self.metrics.accuracy, self.metrics.precision, self.metrics.recall
        );
        println!(
            "Disclosed:  accuracy={:.3}  precision={:.3}  recall={:.3}",
            self.disclosed.accuracy, self.disclosed.precision, self.disclosed.recall
        );
        println!(
            "Inferable:  accuracy={:.3}  precision={:.3}  recall={:.3}",
            self.inferable.accuracy, self.inferable.precision, self.inferable.recall
        );
        println!(
            "Hallucinated fields: {}, extraneous fields: {}",
            self.total_hallucinated, self.total_extraneous
        );
    }
}

/// Average the per-conversation reports found in the store
///
/// Conversations without an evaluation file are counted as skipped and
/// excluded from the averages.
pub fn aggregate(store: &ExperimentStore) -> Result<AggregateReport> {
    let mut reports = Vec::new();
    let mut skipped = 0;
    for index in store.conversations()? {
        if !store.has_file(index, EVALUATION_FILE) {
            tracing::warn!(conversation = index, "no evaluation found, excluding");
            skipped += 1;
            continue;
        }
        let report: EvaluationReport = store.load_json(index, EVALUATION_FILE)?;
        reports.push(report);
    }

    let aggregate = AggregateReport {
        conversations: reports.len(),
        skipped,
        metrics: mean_metrics(reports.iter().map(|r| &r.metrics)),
        disclosed: mean_metrics(reports.iter().map(|r| &r.disclosed)),
        inferable: mean_metrics(reports.iter().map(|r| &r.inferable)),
        total_hallucinated: reports.iter().map(|r| r.counts.hallucinated).sum(),
        total_extraneous: reports.iter().map(|r| r.extraneous_count).sum(),
    };
    store.save_root_json(AGGREGATE_FILE, &aggregate)?;
    Ok(aggregate)
}

fn mean_metrics<'a>(sets: impl Iterator<Item = &'a MetricSet>) -> MetricSet {
    let mut sum = MetricSet::default();
    let mut n = 0usize;
    for set in sets {
        sum.accuracy += set.accuracy;
        sum.precision += set.precision;
        sum.recall += set.recall;
        n += 1;
    }
    if n == 0 {
        return MetricSet::default();
    }
    let n = n as f64;
    MetricSet {
        accuracy: sum.accuracy / n,
        precision: sum.precision / n,
        recall: sum.recall / n,
    }
}
