//! Transcript extraction
//!
//! Asks the model to recover a structured record from a transcript, guided
//! by the schema's JSON description. The raw model output is captured as an
//! artifact without coercion; the evaluator judges it later.

use anyhow::{Context, Result};
use crucible::{ExtractionArtifact, Schema};
use llm::LlmClient;

const SYSTEM_PROMPT: &str = "You extract structured client data from financial advice \
meeting transcripts. You respond with a single JSON object matching the provided \
schema and nothing else. Use null for any field the transcript does not support. \
Never guess or fabricate values.";

pub struct TranscriptExtractor {
    llm: LlmClient,
}

impl TranscriptExtractor {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }

    /// Extract a record from a transcript
    pub async fn extract(&self, schema: &Schema, transcript: &str) -> Result<ExtractionArtifact> {
        let prompt = build_prompt(schema, transcript);
        let response = self
            .llm
            .complete(SYSTEM_PROMPT, &prompt)
            .await
            .context("Transcript extraction failed")?;

        let json = extract_json(&response);
        let record = serde_json::from_str(json)
            .with_context(|| format!("Extractor returned invalid JSON: {}", json))?;
        Ok(ExtractionArtifact::new(schema, record))
    }
}

pub fn build_prompt(schema: &Schema, transcript: &str) -> String {
    format!(
        "Extract the client's details from the transcript below into a JSON object \
         with exactly this structure:\n\n{}\n\nUse null for anything the transcript \
         does not state or imply. Dates must be formatted YYYY-MM-DD.\n\n\
         Transcript:\n{}",
        schema.to_json(),
        transcript
    )
}

/// Strip an optional markdown code fence from a model response
fn extract_json(response: &str) -> &str {
    let trimmed = response.trim();

    if let Some(start) = trimmed.find("```") {
        let after_start = &trimmed[start + 3..];
        let json_start = if after_start.starts_with("json") {
            after_start.find('\n').map(|i| i + 1).unwrap_or(0)
        } else if after_start.starts_with('\n') {
            1
        } else {
            0
        };
        let content = &after_start[json_start..];
        if let Some(end) = content.find("```") {
            return content[..end].trim();
        }
    }

    trimmed
}
