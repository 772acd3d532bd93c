//! End-to-end knowledge graph construction
//!
//! ```text
//! text ──► NER ──► entity map ─────────────┐
//!   │                                       ▼
//!   └────► coreference (cached) ──► realigner ──► resolved text ──► OpenIE ──► graph
//! ```

use std::sync::Arc;

use crate::coref::{CoreNlpCoref, CorefCache};
use crate::corenlp::{CoreNlpClient, CoreNlpConfig};
use crate::error::Result;
use crate::graph::KnowledgeGraph;
use crate::ner::{ner_to_entity_map, CoreNlpNer};
use crate::openie::{CoreNlpOpenIe, OpenIeScript};
use crate::realign::CorefRealigner;
use crate::types::{CorefAnnotation, EntityMap};
use crate::{CoreferenceAnnotator, NamedEntityRecognizer, PipelineConfig, RelationExtractor};

/// Everything produced for one document
#[derive(Debug, Clone)]
pub struct KgOutput {
    pub entities: EntityMap,
    pub resolved_text: String,
    pub graph: KnowledgeGraph,
}

/// Runs the collaborators and the realigner over documents
pub struct KnowledgeGraphBuilder {
    recognizer: Box<dyn NamedEntityRecognizer>,
    annotator: Box<dyn CoreferenceAnnotator>,
    extractor: Box<dyn RelationExtractor>,
    realigner: CorefRealigner,
    cache: Option<CorefCache>,
}

impl KnowledgeGraphBuilder {
    /// Create a builder from injected collaborators
    #[must_use]
    pub fn new(
        recognizer: Box<dyn NamedEntityRecognizer>,
        annotator: Box<dyn CoreferenceAnnotator>,
        extractor: Box<dyn RelationExtractor>,
    ) -> Self {
        Self {
            recognizer,
            annotator,
            extractor,
            realigner: CorefRealigner::default(),
            cache: None,
        }
    }

    /// Create a builder talking to the CoreNLP server described by `config`
    ///
    /// Relations come from the OpenIE script when one is configured, from the
    /// server's `openie` annotator otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the CoreNLP client cannot be created
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let client = CoreNlpClient::new(CoreNlpConfig {
            url: config.corenlp_url.clone(),
            timeout: config.timeout,
            ..CoreNlpConfig::default()
        })?
        .shared();

        let extractor: Box<dyn RelationExtractor> = match &config.openie_script {
            Some(script) => Box::new(OpenIeScript::new(script)),
            None => Box::new(CoreNlpOpenIe::new(Arc::clone(&client))),
        };

        let mut builder = Self::new(
            Box::new(CoreNlpNer::new(Arc::clone(&client))),
            Box::new(CoreNlpCoref::new(client)),
            extractor,
        )
        .with_realigner(CorefRealigner::new(config.realigner.clone()));

        if let Some(dir) = &config.coref_cache_dir {
            builder = builder.with_cache(CorefCache::with_dir(dir));
        }

        Ok(builder)
    }

    #[must_use]
    pub fn with_realigner(mut self, realigner: CorefRealigner) -> Self {
        self.realigner = realigner;
        self
    }

    #[must_use]
    pub fn with_cache(mut self, cache: CorefCache) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    pub const fn cache(&self) -> Option<&CorefCache> {
        self.cache.as_ref()
    }

    /// Tag the document and collect its named entities
    ///
    /// # Errors
    ///
    /// Returns an error if the recognizer fails
    pub async fn recognize_entities(&self, text: &str) -> Result<EntityMap> {
        let tagged = self.recognizer.process(text).await?;
        let entities = ner_to_entity_map(&tagged);
        tracing::info!(entities = entities.len(), "Named entities recognized");
        Ok(entities)
    }

    /// Coreference clusters of the document, from the cache when possible
    ///
    /// # Errors
    ///
    /// Returns an error if the annotator fails or a cache file is unreadable
    pub async fn annotate_coreferences(&self, text: &str) -> Result<CorefAnnotation> {
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.load(text)? {
                tracing::info!(clusters = hit.clusters.len(), "Coreference cache hit");
                return Ok(hit);
            }
        }

        let annotation = self.annotator.process(text).await?;
        tracing::info!(clusters = annotation.clusters.len(), "Coreferences annotated");

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.store(text, &annotation) {
                tracing::warn!(error = %e, "Failed to cache coreference annotation");
            }
        }

        Ok(annotation)
    }

    /// Replace coreferent mentions with their canonical entity mentions
    ///
    /// # Errors
    ///
    /// Returns an error if annotation fails or the clusters do not fit the text
    pub async fn resolve_coreferences(&self, text: &str, entities: &EntityMap) -> Result<String> {
        let annotation = self.annotate_coreferences(text).await?;
        self.realigner.resolve(&annotation, text, entities)
    }

    /// Run the whole pipeline on one document
    ///
    /// # Errors
    ///
    /// Returns the first collaborator or realignment error
    pub async fn build(&self, text: &str) -> Result<KgOutput> {
        let entities = self.recognize_entities(text).await?;
        let resolved_text = self.resolve_coreferences(text, &entities).await?;

        let triples = self.extractor.process(&resolved_text).await?;
        tracing::info!(triples = triples.len(), "Relations extracted");

        let mut graph = KnowledgeGraph::new(entities.clone());
        graph.extend(triples);
        graph.dedup();

        Ok(KgOutput {
            entities,
            resolved_text,
            graph,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::types::{Cluster, Mention, TaggedToken, Triple};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedNer;

    #[async_trait]
    impl NamedEntityRecognizer for FixedNer {
        async fn process(&self, _text: &str) -> Result<Vec<Vec<TaggedToken>>> {
            Ok(vec![vec![
                TaggedToken::new("Varun", "PERSON"),
                TaggedToken::new("went", "O"),
                TaggedToken::new("home", "O"),
            ]])
        }
    }

    struct CountingCoref {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl CoreferenceAnnotator for CountingCoref {
        async fn process(&self, _text: &str) -> Result<CorefAnnotation> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(CorefAnnotation::new(vec![Cluster::new(
                "1",
                vec![Mention::new("Varun", 1, 1, 2, 1), Mention::new("He", 2, 1, 2, 1)],
            )]))
        }
    }

    struct EchoRelations;

    #[async_trait]
    impl RelationExtractor for EchoRelations {
        async fn process(&self, text: &str) -> Result<Vec<Triple>> {
            let mut triples = Vec::new();
            if text.contains("Varun was tired") {
                triples.push(Triple::new("Varun", "was", "tired"));
                triples.push(Triple::new("varun", "WAS", "tired"));
            }
            Ok(triples)
        }
    }

    struct Unreachable;

    #[async_trait]
    impl CoreferenceAnnotator for Unreachable {
        async fn process(&self, _text: &str) -> Result<CorefAnnotation> {
            Err(Error::Collaborator("connection refused".to_string()))
        }
    }

    fn builder(calls: &Arc<AtomicUsize>) -> KnowledgeGraphBuilder {
        KnowledgeGraphBuilder::new(
            Box::new(FixedNer),
            Box::new(CountingCoref {
                calls: Arc::clone(calls),
            }),
            Box::new(EchoRelations),
        )
    }

    #[tokio::test]
    async fn test_build_resolves_and_extracts() {
        let calls = Arc::new(AtomicUsize::new(0));
        let output = builder(&calls)
            .build("Varun went home. He was tired.")
            .await
            .unwrap();

        assert_eq!(output.resolved_text, "Varun went home . Varun was tired . ");
        assert!(output.entities.contains("Varun"));
        assert_eq!(output.graph.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cache_skips_second_annotation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let builder = builder(&calls).with_cache(CorefCache::in_memory(8));
        let text = "Varun went home. He was tired.";

        builder.build(text).await.unwrap();
        builder.build(text).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(builder.cache().map(CorefCache::len), Some(1));
    }

    #[tokio::test]
    async fn test_collaborator_failure_propagates() {
        let builder = KnowledgeGraphBuilder::new(
            Box::new(FixedNer),
            Box::new(Unreachable),
            Box::new(EchoRelations),
        );

        let err = builder.build("Varun went home.").await.unwrap_err();
        assert!(matches!(err, Error::Collaborator(_)));
    }

    #[test]
    fn test_from_config_with_cache_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::new().with_coref_cache_dir(dir.path());

        let builder = KnowledgeGraphBuilder::from_config(&config).unwrap();
        assert_eq!(builder.cache().and_then(CorefCache::dir), Some(dir.path()));
    }
}
