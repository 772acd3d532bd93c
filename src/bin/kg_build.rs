//! Batch knowledge graph builder
//!
//! Processes every file of an input directory through the pipeline and writes
//! the `ner/` and `kg/` outputs described in [`text_to_kg::batch`]. Files that
//! fail are logged and skipped.
//!
//! Usage:
//!   kg-build --input data/input --output data/output --verbose
//!
//! Requires a running CoreNLP server (`CORENLP_URL`, default `http://localhost:9000`).

use std::path::PathBuf;

use clap::Parser;
use text_to_kg::batch::{input_files, process_files};
use text_to_kg::{KnowledgeGraphBuilder, PipelineConfig};

/// Build knowledge graphs from a directory of text files
#[derive(Parser, Debug)]
#[command(name = "kg-build", version)]
struct Args {
    /// Directory of input text files
    #[arg(short, long)]
    input: PathBuf,

    /// Directory receiving the `ner/` and `kg/` outputs
    #[arg(short, long)]
    output: PathBuf,

    /// CoreNLP server URL (overrides the environment)
    #[arg(long, env = "CORENLP_URL")]
    corenlp_url: Option<String>,

    /// Directory for cached coreference annotations
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Log every coreference replacement
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    text_to_kg::init()?;
    let args = Args::parse();

    let default_filter = if args.verbose {
        "info,text_to_kg=debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();

    let mut config = PipelineConfig::from_env()?.with_verbose(args.verbose);
    if let Some(url) = args.corenlp_url {
        config = config.with_corenlp_url(url);
    }
    if let Some(dir) = args.cache_dir {
        config = config.with_coref_cache_dir(dir);
    }

    let builder = KnowledgeGraphBuilder::from_config(&config)?;

    let files = input_files(&args.input)?;
    tracing::info!(files = files.len(), input = %args.input.display(), "Starting batch");

    let summary = process_files(&builder, &files, &args.output, &config.base_iri).await;

    for file in &summary.failed {
        eprintln!("Failed: {}", file.display());
    }

    Ok(())
}
