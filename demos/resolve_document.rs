//! Coreference realignment without a CoreNLP server
//!
//! Replays a coreference annotation and entity map the way CoreNLP would
//! return them, then prints the rewritten text in both rewrite modes.
//!
//! Run: cargo run --example resolve_document

use anyhow::Context;
use text_to_kg::{CorefAnnotation, CorefRealigner, EntityMap, RealignerConfig, RewriteMode};

const TEXT: &str = "Ada Lovelace met Charles Babbage in 1833. \
                    She admired his engine. \
                    He sent her the designs.";

const COREFS: &str = r#"{
  "corefs": {
    "1": [
      {"text": "Ada Lovelace", "sentNum": 1, "startIndex": 1, "endIndex": 3, "headIndex": 2, "isRepresentativeMention": true},
      {"text": "She", "sentNum": 2, "startIndex": 1, "endIndex": 2, "headIndex": 1},
      {"text": "her", "sentNum": 3, "startIndex": 3, "endIndex": 4, "headIndex": 3}
    ],
    "4": [
      {"text": "Charles Babbage", "sentNum": 1, "startIndex": 4, "endIndex": 6, "headIndex": 5, "isRepresentativeMention": true},
      {"text": "his", "sentNum": 2, "startIndex": 3, "endIndex": 4, "headIndex": 3},
      {"text": "He", "sentNum": 3, "startIndex": 1, "endIndex": 2, "headIndex": 1}
    ]
  }
}"#;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,text_to_kg=debug")),
        )
        .init();

    let annotation = CorefAnnotation::from_json(COREFS).context("parsing coreference JSON")?;
    let entities: EntityMap = [
        ("Ada", "PERSON"),
        ("Lovelace", "PERSON"),
        ("Ada Lovelace", "PERSON"),
        ("Charles Babbage", "PERSON"),
        ("1833", "DATE"),
    ]
    .into_iter()
    .collect();

    println!("Input: {TEXT}");
    println!();

    for mode in [RewriteMode::Progressive, RewriteMode::Snapshot] {
        let realigner = CorefRealigner::new(RealignerConfig {
            mode,
            verbose: true,
            ..Default::default()
        });

        let realignment = realigner
            .realign(&annotation, TEXT, &entities)
            .with_context(|| format!("realigning in {mode:?} mode"))?;

        println!("--- {mode:?} ---");
        for r in &realignment.replacements {
            println!(
                "  sentence {}: '{}' -> '{}'",
                r.sentence + 1,
                r.original,
                r.canonical
            );
        }
        println!("Resolved: {}", realignment.resolved_text);
        println!();
    }

    Ok(())
}
