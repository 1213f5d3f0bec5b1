//! Fact-find evaluation runner
//!
//! Generates synthetic fact-find conversations, runs extraction against
//! them, and reports how faithfully the extractor recovered the record.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crucible::Schema;
use harness::config::{get_results_dir, load_config};
use harness::{
    aggregate, evaluate_stored_batch, ConversationSynthesizer, ExperimentStore, Runner,
    TranscriptExtractor,
};

#[derive(Parser)]
#[command(name = "factfind")]
#[command(about = "Ground-truth evaluation harness for fact-find extraction")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Root directory for experiment results
    #[arg(long)]
    results_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full experiment: generate, converse, extract, evaluate
    Run {
        /// Experiment name (directory under the results root)
        name: String,

        /// Path to the schema JSON file
        #[arg(short, long)]
        schema: PathBuf,

        /// Number of conversations to run
        #[arg(short, long, default_value_t = 10)]
        count: usize,

        /// Base seed; conversation N uses seed + N
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },

    /// Re-score stored conversations from their artifacts
    Evaluate {
        /// Experiment name
        name: String,

        /// Only re-score this conversation index
        #[arg(short, long)]
        conversation: Option<usize>,
    },

    /// Aggregate evaluated conversations into a single report
    Aggregate {
        /// Experiment name
        name: String,
    },

    /// List experiments under the results root
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config()?;
    let results_dir = cli
        .results_dir
        .map(Ok)
        .unwrap_or_else(|| get_results_dir(&config))?;

    match cli.command {
        Commands::Run {
            name,
            schema,
            count,
            seed,
        } => {
            let schema = Schema::load(&schema)
                .with_context(|| format!("Failed to load schema: {}", schema.display()))?;
            let store = ExperimentStore::open(&results_dir, &name)?;

            let llm_config = config.llm.clone();
            let synthesizer =
                ConversationSynthesizer::new(llm::LlmClient::new(llm_config.clone())?);
            let extractor = TranscriptExtractor::new(llm::LlmClient::new(llm_config)?);
            let runner = Runner::new(
                config.generator,
                config.obfuscation,
                config.comparator,
                synthesizer,
                extractor,
            );

            println!("Running {} conversation(s) for '{}'...", count, name);
            let completed = runner.run(&store, &schema, count, seed).await?;
            println!("Completed {}/{} conversations", completed, count);

            let report = aggregate(&store)?;
            report.print_summary();

            if completed < count {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Evaluate { name, conversation } => {
            let store = ExperimentStore::open(&results_dir, &name)?;
            let indices = match conversation {
                Some(index) => vec![index],
                None => store.conversations()?,
            };
            let (reports, failed) = evaluate_stored_batch(&store, &indices, &config.comparator);
            for (index, report) in &reports {
                println!(
                    "conversation_{}: accuracy={:.3} precision={:.3} recall={:.3}",
                    index,
                    report.metrics.accuracy,
                    report.metrics.precision,
                    report.metrics.recall
                );
            }
            if failed > 0 {
                println!("{} conversation(s) could not be re-scored", failed);
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Aggregate { name } => {
            let store = ExperimentStore::open(&results_dir, &name)?;
            let report = aggregate(&store)?;
            report.print_summary();
            Ok(())
        }
        Commands::List => {
            let experiments = harness::store::list_experiments(&results_dir)?;
            if experiments.is_empty() {
                println!("No experiments under {}", results_dir.display());
                return Ok(());
            }
            println!("Experiments under {}:\n", results_dir.display());
            for name in experiments {
                let store = ExperimentStore::open(&results_dir, &name)?;
                let evaluated = store
                    .conversations()?
                    .into_iter()
                    .filter(|&i| store.has_file(i, harness::store::EVALUATION_FILE))
                    .count();
                println!("  {} - {} evaluated conversation(s)", name, evaluated);
            }
            Ok(())
        }
    }
}
