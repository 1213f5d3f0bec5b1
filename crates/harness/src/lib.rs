//! Experiment harness for fact-find extraction evaluation
//!
//! Wires the LLM stages (conversation synthesis, transcript extraction)
//! around the deterministic core, and persists every artifact so runs can
//! be re-scored without re-generating.

pub mod config;
pub mod extraction;
pub mod runner;
pub mod store;
pub mod synthesis;

pub use config::Config;
pub use extraction::TranscriptExtractor;
pub use runner::{aggregate, evaluate_stored, evaluate_stored_batch, AggregateReport, Runner};
pub use store::ExperimentStore;
pub use synthesis::ConversationSynthesizer;
