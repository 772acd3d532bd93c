//! Integration tests for the coreference realigner and the knowledge graph pipeline
//!
//! The collaborators are replaced by fakes replaying a recorded CoreNLP
//! response (`tests/fixtures/acme_corenlp.json`), so no server is needed
//! except for the ignored live test.

use async_trait::async_trait;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use text_to_kg::batch::{input_files, process_files};
use text_to_kg::corenlp::CoreNlpDocument;
use text_to_kg::graph::objects_of;
use text_to_kg::ner::tagged_sentences;
use text_to_kg::{
    ner_to_entity_map, CorefAnnotation, CorefCache, CorefRealigner, CoreferenceAnnotator,
    EntityMap, KnowledgeGraphBuilder, NamedEntityRecognizer, OpenIeScript, PipelineConfig,
    RealignerConfig, Result, RewriteMode, TaggedToken,
};

const BASE: &str = "http://example.org/kg/";

const RESOLVED: &str = "Varun Kumar founded Acme in Pune . \
                        Varun Kumar sold Acme in 2019 . \
                        Acme was Varun Kumar first startup . ";

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn corenlp_response() -> String {
    fs::read_to_string(fixture("acme_corenlp.json")).expect("Failed to read CoreNLP fixture")
}

/// Input lines joined without a separator, as the batch driver does
fn document() -> String {
    fs::read_to_string(fixture("acme.txt"))
        .expect("Failed to read text fixture")
        .lines()
        .collect()
}

fn entities() -> EntityMap {
    let doc = CoreNlpDocument::from_json(&corenlp_response()).unwrap();
    ner_to_entity_map(&tagged_sentences(&doc))
}

struct RecordedNer;

#[async_trait]
impl NamedEntityRecognizer for RecordedNer {
    async fn process(&self, _text: &str) -> Result<Vec<Vec<TaggedToken>>> {
        let doc = CoreNlpDocument::from_json(&corenlp_response())?;
        Ok(tagged_sentences(&doc))
    }
}

struct RecordedCoref {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl CoreferenceAnnotator for RecordedCoref {
    async fn process(&self, _text: &str) -> Result<CorefAnnotation> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        CorefAnnotation::from_json(&corenlp_response())
    }
}

fn builder(calls: &Arc<AtomicUsize>) -> KnowledgeGraphBuilder {
    KnowledgeGraphBuilder::new(
        Box::new(RecordedNer),
        Box::new(RecordedCoref {
            calls: Arc::clone(calls),
        }),
        Box::new(OpenIeScript::new(fixture("openie_stub.sh")).with_interpreter("sh")),
    )
}

#[test]
fn test_entity_map_from_recorded_response() {
    let entities = entities();

    assert_eq!(entities.entity_type("Varun Kumar"), Some("PERSON"));
    assert_eq!(entities.entity_type("Kumar"), Some("PERSON"));
    assert_eq!(entities.entity_type("Acme"), Some("ORGANIZATION"));
    assert_eq!(entities.entity_type("Pune"), Some("CITY"));
    assert!(!entities.contains("He"));
    assert!(!entities.contains("the company"));
}

#[test]
fn test_recorded_clusters_keep_annotator_order() {
    let annotation = CorefAnnotation::from_json(&corenlp_response()).unwrap();

    let ids: Vec<&str> = annotation.clusters.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2"]);
    assert_eq!(annotation.mention_count(), 6);
    assert!(annotation.clusters[0].mentions[0].is_representative);
}

#[test]
fn test_realign_recorded_document() {
    let annotation = CorefAnnotation::from_json(&corenlp_response()).unwrap();
    let realigner = CorefRealigner::default();

    let realignment = realigner
        .realign(&annotation, &document(), &entities())
        .unwrap();

    assert_eq!(realignment.resolved_text, RESOLVED);
    assert_eq!(realignment.replacements.len(), 6);
    assert!(realignment
        .replacements
        .iter()
        .any(|r| r.original == "the company" && r.canonical == "Acme"));
}

#[test]
fn test_snapshot_mode_agrees_on_single_token_replacements() {
    let annotation = CorefAnnotation::from_json(&corenlp_response()).unwrap();
    let realigner = CorefRealigner::new(RealignerConfig {
        mode: RewriteMode::Snapshot,
        ..Default::default()
    });

    let resolved = realigner
        .resolve(&annotation, &document(), &entities())
        .unwrap();

    assert_eq!(resolved, RESOLVED);
}

#[test]
fn test_without_entities_first_mention_is_canonical() {
    let annotation = CorefAnnotation::from_json(&corenlp_response()).unwrap();

    let resolved = CorefRealigner::default()
        .resolve(&annotation, &document(), &EntityMap::new())
        .unwrap();

    // Both clusters already start with their proper-noun mention
    assert_eq!(resolved, RESOLVED);
}

#[tokio::test]
async fn test_pipeline_builds_graph() {
    let calls = Arc::new(AtomicUsize::new(0));
    let output = builder(&calls).build(&document()).await.unwrap();

    assert_eq!(output.resolved_text, RESOLVED);
    assert_eq!(output.graph.len(), 3);
    assert_eq!(output.graph.triples_about("varun kumar").len(), 2);
    assert_eq!(output.graph.triples()[0].confidence, Some(1.0));

    let nt = output.graph.to_ntriples(BASE).unwrap();
    assert!(nt.contains(
        "<http://example.org/kg/entity/varun_kumar> <http://example.org/kg/relation/sold> <http://example.org/kg/entity/acme> ."
    ));
    assert!(nt.contains(
        "<http://example.org/kg/entity/acme> <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://example.org/kg/type/organization> ."
    ));

    let store = output.graph.to_store(BASE).unwrap();
    let founded = objects_of(&store, BASE, "Varun Kumar", "founds").unwrap();
    assert_eq!(founded, vec!["Acme"]);
}

#[tokio::test]
async fn test_pipeline_reuses_cached_annotation_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let text = document();

    let first = builder(&calls).with_cache(CorefCache::with_dir(dir.path()));
    first.build(&text).await.unwrap();

    let cached_file = dir
        .path()
        .join(format!("{}.json", CorefCache::key_for(&text)));
    assert!(cached_file.exists());

    // A fresh builder with an empty memory layer reads the file instead of
    // calling the annotator again.
    let second = builder(&calls).with_cache(CorefCache::with_dir(dir.path()));
    let output = second.build(&text).await.unwrap();

    assert_eq!(output.resolved_text, RESOLVED);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

struct NoCoref;

#[async_trait]
impl CoreferenceAnnotator for NoCoref {
    async fn process(&self, _text: &str) -> Result<CorefAnnotation> {
        Ok(CorefAnnotation::default())
    }
}

#[tokio::test]
async fn test_failing_extractor_script_is_a_collaborator_error() {
    let builder = KnowledgeGraphBuilder::new(
        Box::new(RecordedNer),
        Box::new(NoCoref),
        Box::new(OpenIeScript::new(fixture("openie_stub.sh")).with_interpreter("sh")),
    );

    // The stub exits non-zero for text it does not recognize
    let err = builder
        .build("Nobody went anywhere.")
        .await
        .unwrap_err();

    assert!(matches!(err, text_to_kg::Error::Collaborator(_)));
}

#[tokio::test]
async fn test_batch_skips_unreadable_file_and_continues() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();

    // Sorts before "acme.txt" and is not valid UTF-8
    fs::write(input.path().join("a_broken.txt"), [0xFF, 0xFE, b'x']).unwrap();
    fs::copy(fixture("acme.txt"), input.path().join("acme.txt")).unwrap();

    let files = input_files(input.path()).unwrap();
    assert_eq!(files.len(), 2);

    let calls = Arc::new(AtomicUsize::new(0));
    let summary = process_files(&builder(&calls), &files, output.path(), BASE).await;

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.failed, vec![input.path().join("a_broken.txt")]);

    let kg = output.path().join("kg");
    assert_eq!(fs::read_to_string(kg.join("acme.txt")).unwrap(), RESOLVED);
    assert!(kg.join("acme.nt").exists());
    assert!(output.path().join("ner").join("named_entity_acme.json").exists());
    assert!(!output.path().join("ner").join("named_entity_a_broken.json").exists());

    let csv = fs::read_to_string(kg.join("acme.txt-out.csv")).unwrap();
    let rows: Vec<&str> = csv.lines().collect();
    assert_eq!(
        rows,
        vec![
            "subject,relation,object",
            "Varun Kumar,founded,Acme",
            "Varun Kumar,sold,Acme",
            "Acme,was,Varun Kumar first startup",
        ]
    );
}

#[tokio::test]
#[ignore = "requires a CoreNLP server at CORENLP_URL"]
async fn test_live_corenlp_pipeline() {
    let config = PipelineConfig::from_env().unwrap();
    let builder = KnowledgeGraphBuilder::from_config(&config).unwrap();

    let output = builder.build(&document()).await.unwrap();

    println!("Resolved: {}", output.resolved_text);
    println!("{}", output.graph.to_ntriples(&config.base_iri).unwrap());

    assert!(output.entities.contains("Acme"));
    assert!(!output.resolved_text.contains(" He "));
}
