//! Conversation synthesis
//!
//! Turns an obfuscated ground-truth record into an adviser/client
//! transcript. Disclosed facts must be stated outright, inferable facts
//! only hinted at, and omitted facts never surface. The prompt carries the
//! full disclosure plan so the model knows which treatment each fact gets.

use anyhow::{Context, Result};
use crucible::{DisclosureMap, DisclosureStatus, Record};
use llm::LlmClient;

const SYSTEM_PROMPT: &str = "You are a scriptwriter producing realistic transcripts of \
financial advice meetings. You write natural, flowing dialogue between a financial \
adviser and their client. You follow the fact disclosure plan exactly: facts marked \
as stated must appear clearly in the client's own words, facts marked as implied may \
only be hinted at indirectly (the reader should be able to infer them, but the exact \
value is never spoken), and no other personal facts may be invented. Monetary amounts \
and dates in stated facts must be spoken precisely.";

pub struct ConversationSynthesizer {
    llm: LlmClient,
}

impl ConversationSynthesizer {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }

    /// Generate a transcript realizing the record's disclosure plan
    pub async fn synthesize(&self, record: &Record, disclosure: &DisclosureMap) -> Result<String> {
        let prompt = build_prompt(record, disclosure);
        let transcript = self
            .llm
            .complete(SYSTEM_PROMPT, &prompt)
            .await
            .context("Conversation synthesis failed")?;
        if transcript.trim().is_empty() {
            anyhow::bail!("Model returned an empty transcript");
        }
        Ok(transcript)
    }
}

/// Render the disclosure plan as a prompt
///
/// Omitted facts are left out entirely rather than listed as forbidden.
/// Naming them would put the exact values in front of the model, and a
/// leaked value can no longer be scored as a hallucination.
pub fn build_prompt(record: &Record, disclosure: &DisclosureMap) -> String {
    let mut stated = Vec::new();
    let mut implied = Vec::new();

    for (path, value) in record.flatten() {
        let status = disclosure
            .get(&path)
            .copied()
            .unwrap_or(DisclosureStatus::Disclosed);
        match status {
            DisclosureStatus::Disclosed => {
                stated.push(format!("- {}: {}", path, render_value(value)))
            }
            DisclosureStatus::Inferable => {
                implied.push(format!("- {}: {}", path, render_value(value)))
            }
            DisclosureStatus::Omitted => {}
        }
    }

    let mut prompt = String::from(
        "Write a transcript of a first fact-finding meeting between a financial \
         adviser and a client. Alternate speakers, prefixing each turn with \
         \"Adviser:\" or \"Client:\".\n\n",
    );
    prompt.push_str("Facts the client STATES clearly during the meeting:\n");
    prompt.push_str(&stated.join("\n"));
    if !implied.is_empty() {
        prompt.push_str(
            "\n\nFacts the client only IMPLIES. Hint at each one indirectly so an \
             attentive reader could infer it, but never speak the exact value:\n",
        );
        prompt.push_str(&implied.join("\n"));
    }
    prompt.push_str(
        "\n\nDo not mention any personal or financial fact that is not listed above.",
    );
    prompt
}

fn render_value(value: &crucible::Value) -> String {
    value.to_json().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crucible::Value;

    fn sample() -> (Record, DisclosureMap) {
        let record = Record::new(vec![
            ("full_name".into(), Value::Text("Priya Shah".into())),
            ("annual_income".into(), Value::Number(52000.0)),
            ("employer".into(), Value::Null),
        ]);
        let mut disclosure = DisclosureMap::new();
        disclosure.insert("full_name".into(), DisclosureStatus::Disclosed);
        disclosure.insert("annual_income".into(), DisclosureStatus::Inferable);
        disclosure.insert("employer".into(), DisclosureStatus::Omitted);
        (record, disclosure)
    }

    #[test]
    fn test_disclosed_facts_listed_as_stated() {
        let (record, disclosure) = sample();
        let prompt = build_prompt(&record, &disclosure);
        let stated_section = prompt.split("IMPLIES").next().unwrap();
        assert!(stated_section.contains("full_name: \"Priya Shah\""));
        assert!(!stated_section.contains("annual_income"));
    }

    #[test]
    fn test_inferable_facts_listed_as_implied() {
        let (record, disclosure) = sample();
        let prompt = build_prompt(&record, &disclosure);
        let implied_section = prompt.split("IMPLIES").nth(1).unwrap();
        assert!(implied_section.contains("annual_income: 52000"));
    }

    #[test]
    fn test_omitted_facts_never_mentioned() {
        let (record, disclosure) = sample();
        let prompt = build_prompt(&record, &disclosure);
        assert!(!prompt.contains("employer"));
    }

    #[test]
    fn test_no_implied_section_when_nothing_inferable() {
        let record = Record::new(vec![("full_name".into(), Value::Text("Priya".into()))]);
        let mut disclosure = DisclosureMap::new();
        disclosure.insert("full_name".into(), DisclosureStatus::Disclosed);
        let prompt = build_prompt(&record, &disclosure);
        assert!(!prompt.contains("IMPLIES"));
    }
}
