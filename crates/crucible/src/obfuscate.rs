//! Controlled field withholding
//!
//! Takes a complete reference record and marks a sampled subset of leaf
//! fields as OMITTED (value withheld entirely) or INFERABLE (value must be
//! restated indirectly by the conversation step). The resulting disclosure
//! map covers every leaf path and travels with the ground truth artifact;
//! it never round-trips through the text layer.

use std::collections::BTreeMap;

use common::{Error, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::schema::Schema;
use crate::value::Record;

/// How a field's value is revealed to the conversation-synthesis step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DisclosureStatus {
    /// Stated plainly in the conversation
    #[default]
    Disclosed,
    /// Withheld entirely; the value never reaches the text layer
    Omitted,
    /// Stated indirectly; the extractor must infer the value
    Inferable,
}

impl std::fmt::Display for DisclosureStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisclosureStatus::Disclosed => write!(f, "disclosed"),
            DisclosureStatus::Omitted => write!(f, "omitted"),
            DisclosureStatus::Inferable => write!(f, "inferable"),
        }
    }
}

/// Per-path disclosure statuses, sorted by path for stable serialization
pub type DisclosureMap = BTreeMap<String, DisclosureStatus>;

/// Obfuscation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObfuscationConfig {
    /// Fraction of eligible fields to omit entirely
    #[serde(default = "default_omit_ratio")]
    pub omit_ratio: f64,
    /// Fraction of eligible fields to state indirectly
    #[serde(default = "default_infer_ratio")]
    pub infer_ratio: f64,
    /// Field names exempt from obfuscation (identity/compliance fields);
    /// matched against the final path segment, ignoring sequence indices
    #[serde(default)]
    pub exempt_fields: Vec<String>,
    /// Whether leaves inside sequences are eligible. Off by default:
    /// withholding single list items reads unnaturally in a conversation.
    #[serde(default)]
    pub obfuscate_sequence_items: bool,
}

fn default_omit_ratio() -> f64 {
    0.2
}

fn default_infer_ratio() -> f64 {
    0.2
}

impl Default for ObfuscationConfig {
    fn default() -> Self {
        Self {
            omit_ratio: default_omit_ratio(),
            infer_ratio: default_infer_ratio(),
            exempt_fields: Vec::new(),
            obfuscate_sequence_items: false,
        }
    }
}

impl ObfuscationConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.omit_ratio) || !(0.0..=1.0).contains(&self.infer_ratio) {
            return Err(Error::config(format!(
                "obfuscation ratios must be in [0, 1], got omit={} infer={}",
                self.omit_ratio, self.infer_ratio
            )));
        }
        if self.omit_ratio + self.infer_ratio > 1.0 {
            return Err(Error::config(format!(
                "obfuscation ratios sum to {} > 1",
                self.omit_ratio + self.infer_ratio
            )));
        }
        Ok(())
    }

    fn is_exempt(&self, path: &str) -> bool {
        let leaf = leaf_name(path);
        self.exempt_fields.iter().any(|name| name == leaf)
    }
}

/// Final path segment with any sequence index stripped:
/// `accounts[0].balance` -> `balance`
fn leaf_name(path: &str) -> &str {
    let last = path.rsplit('.').next().unwrap_or(path);
    match last.find('[') {
        Some(i) => &last[..i],
        None => last,
    }
}

/// Selects fields to withhold and produces the obfuscated record plus its
/// disclosure map
pub struct Obfuscator {
    config: ObfuscationConfig,
}

impl Obfuscator {
    pub fn new(config: ObfuscationConfig) -> Self {
        Self { config }
    }

    /// Obfuscate a reference record
    ///
    /// Returns the record with OMITTED values cleared to null, and a
    /// disclosure map covering every leaf path. The OMITTED and INFERABLE
    /// subsets are disjoint; exempt fields are always DISCLOSED; whenever
    /// the eligible set allows it, at least one field lands in each
    /// positive-ratio class.
    pub fn obfuscate(
        &self,
        record: &Record,
        schema: &Schema,
        seed: u64,
    ) -> Result<(Record, DisclosureMap)> {
        self.config.validate()?;
        record.validate(schema)?;

        let all_paths: Vec<String> = record.flatten().into_iter().map(|(p, _)| p).collect();

        let mut eligible: Vec<String> = all_paths
            .iter()
            .filter(|path| {
                !self.config.is_exempt(path)
                    && (self.config.obfuscate_sequence_items || !path.contains('['))
            })
            .cloned()
            .collect();

        let wants_obfuscation = self.config.omit_ratio > 0.0 || self.config.infer_ratio > 0.0;
        if eligible.is_empty() && wants_obfuscation {
            return Err(Error::config(
                "no fields eligible for obfuscation but ratios are positive",
            ));
        }

        let n = eligible.len();
        let mut n_omit = target_count(self.config.omit_ratio, n);
        let mut n_infer = target_count(self.config.infer_ratio, n);
        // Rounding plus the one-each minimum can overshoot the eligible set
        while n_omit + n_infer > n {
            if n_infer >= n_omit && n_infer > 0 {
                n_infer -= 1;
            } else {
                n_omit -= 1;
            }
        }

        let mut rng = StdRng::seed_from_u64(seed);
        eligible.shuffle(&mut rng);

        let omitted: Vec<String> = eligible[..n_omit].to_vec();
        let inferable: Vec<String> = eligible[n_omit..n_omit + n_infer].to_vec();

        let mut disclosure = DisclosureMap::new();
        for path in &all_paths {
            disclosure.insert(path.clone(), DisclosureStatus::Disclosed);
        }
        for path in &omitted {
            disclosure.insert(path.clone(), DisclosureStatus::Omitted);
        }
        for path in &inferable {
            disclosure.insert(path.clone(), DisclosureStatus::Inferable);
        }

        let obfuscated = record.with_nulled(&omitted);
        Ok((obfuscated, disclosure))
    }
}

/// Seats for a ratio over `n` eligible fields: `round(ratio * n)`, but at
/// least one whenever the ratio is positive so both difficulty modes get
/// test coverage
fn target_count(ratio: f64, n: usize) -> usize {
    if ratio <= 0.0 || n == 0 {
        return 0;
    }
    ((ratio * n as f64).round() as usize).max(1)
}
