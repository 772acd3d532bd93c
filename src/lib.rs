//! # Text to Knowledge Graph
//!
//! Builds a knowledge graph from unstructured text by chaining external NLP
//! tools: named entity recognition, coreference resolution and open relation
//! extraction (Stanford CoreNLP / OpenIE).
//!
//! ## Features
//!
//! - Coreference Realignment: pronouns and other mentions are rewritten to the
//!   canonical mention of their cluster, preferring known named entities
//! - Pluggable Collaborators: NER, coreference and relation extraction sit behind traits
//! - Coreference Cache: annotations keyed by document hash, in memory and on disk
//! - RDF Output: N-Triples serialization and SPARQL lookups through Oxigraph
//! - Environment Variable Support: Load configuration from .env files
//!
//! ## Example
//!
//! ```rust,no_run
//! use text_to_kg::{KnowledgeGraphBuilder, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::from_env()?;
//!     let builder = KnowledgeGraphBuilder::from_config(&config)?;
//!
//!     let output = builder.build("Varun went home. He was tired.").await?;
//!     println!("{}", output.resolved_text);
//!     println!("{}", output.graph.to_ntriples(&config.base_iri)?);
//!
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub mod batch;
pub mod coref;
pub mod corenlp;
pub mod error;
pub mod graph;
pub mod ner;
pub mod normalize;
pub mod openie;
pub mod pipeline;
pub mod realign;
pub mod tokenize;
pub mod types;

pub use batch::BatchSummary;
pub use coref::{CoreNlpCoref, CorefCache};
pub use corenlp::{CoreNlpClient, CoreNlpConfig};
pub use error::{Error, Result};
pub use graph::KnowledgeGraph;
pub use ner::{ner_to_entity_map, CoreNlpNer};
pub use openie::{CoreNlpOpenIe, OpenIeScript};
pub use pipeline::{KgOutput, KnowledgeGraphBuilder};
pub use realign::{
    group_mentions_by_sentence, rewrite, select_canonical, CorefRealigner, RealignerConfig,
    Realignment, Replacement, RewriteMode,
};
pub use tokenize::{Tokenizer, TreebankTokenizer};
pub use types::{Cluster, CorefAnnotation, EntityMap, Mention, TaggedToken, Triple};

/// Initialize the library by loading .env file
///
/// # Errors
///
/// Returns an error if the .env file exists but cannot be read or parsed
pub fn init() -> Result<()> {
    dotenvy::dotenv().ok(); // Ignore if .env doesn't exist
    Ok(())
}

/// Tags every token of a document with an entity type
#[async_trait]
pub trait NamedEntityRecognizer: Send + Sync {
    /// Token/tag pairs, one list per sentence
    ///
    /// # Errors
    ///
    /// Returns [`Error::Collaborator`] if the tagger cannot be reached
    async fn process(&self, text: &str) -> Result<Vec<Vec<TaggedToken>>>;
}

/// Groups the mentions of a document into coreference clusters
#[async_trait]
pub trait CoreferenceAnnotator: Send + Sync {
    /// # Errors
    ///
    /// Returns [`Error::Collaborator`] if the annotator cannot be reached
    async fn process(&self, text: &str) -> Result<CorefAnnotation>;
}

/// Extracts subject-relation-object triples from text
#[async_trait]
pub trait RelationExtractor: Send + Sync {
    /// # Errors
    ///
    /// Returns [`Error::Collaborator`] if the extractor cannot be launched
    async fn process(&self, text: &str) -> Result<Vec<Triple>>;
}

/// Configuration for the knowledge graph pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// CoreNLP server URL
    pub corenlp_url: String,

    /// Timeout for each CoreNLP request
    pub timeout: Duration,

    /// Directory for cached coreference annotations (disabled when `None`)
    pub coref_cache_dir: Option<PathBuf>,

    /// Path to `process_large_corpus.sh`; the CoreNLP `openie` annotator is
    /// used when `None`
    pub openie_script: Option<PathBuf>,

    /// Realigner behaviour
    pub realigner: RealignerConfig,

    /// Namespace for generated graph IRIs
    pub base_iri: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            corenlp_url: "http://localhost:9000".to_string(),
            timeout: Duration::from_secs(120),
            coref_cache_dir: None,
            openie_script: None,
            realigner: RealignerConfig::default(),
            base_iri: "http://example.org/kg/".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables
    ///
    /// Automatically loads .env file if present. Supports these variables:
    /// - `CORENLP_URL`: CoreNLP server URL (default: `http://localhost:9000`)
    /// - `CORENLP_TIMEOUT_SECS`: Request timeout in seconds (default: 120)
    /// - `KG_COREF_CACHE_DIR`: Directory for cached coreference annotations
    /// - `KG_OPENIE_SCRIPT`: Path to the OpenIE `process_large_corpus.sh` script
    /// - `KG_REWRITE_MODE`: `progressive` or `snapshot` (default: `progressive`)
    /// - `KG_SORT_ALL_SENTENCES`: Sort mentions in every sentence (default: false)
    /// - `KG_VERBOSE`: Log every replacement decision (default: false)
    /// - `KG_BASE_IRI`: Namespace for graph IRIs (default: `http://example.org/kg/`)
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an invalid value
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let corenlp_url = env::var("CORENLP_URL").unwrap_or(defaults.corenlp_url);

        let timeout = match env::var("CORENLP_TIMEOUT_SECS") {
            Ok(v) => Duration::from_secs(v.parse::<u64>().map_err(|e| {
                Error::Config(format!("CORENLP_TIMEOUT_SECS must be a number of seconds: {e}"))
            })?),
            Err(_) => defaults.timeout,
        };

        let mode = match env::var("KG_REWRITE_MODE") {
            Ok(v) => v.parse::<RewriteMode>()?,
            Err(_) => RewriteMode::default(),
        };

        let sort_all_sentences = env::var("KG_SORT_ALL_SENTENCES")
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(false);

        let verbose = env::var("KG_VERBOSE")
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(false);

        Ok(Self {
            corenlp_url,
            timeout,
            coref_cache_dir: env::var("KG_COREF_CACHE_DIR").ok().map(PathBuf::from),
            openie_script: env::var("KG_OPENIE_SCRIPT").ok().map(PathBuf::from),
            realigner: RealignerConfig {
                mode,
                sort_all_sentences,
                verbose,
            },
            base_iri: env::var("KG_BASE_IRI").unwrap_or(defaults.base_iri),
        })
    }

    /// Set the CoreNLP server URL
    #[must_use]
    pub fn with_corenlp_url(mut self, url: impl Into<String>) -> Self {
        self.corenlp_url = url.into();
        self
    }

    /// Set the CoreNLP request timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Cache coreference annotations in a directory
    #[must_use]
    pub fn with_coref_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.coref_cache_dir = Some(dir.into());
        self
    }

    /// Extract relations with the OpenIE corpus script
    #[must_use]
    pub fn with_openie_script(mut self, script: impl Into<PathBuf>) -> Self {
        self.openie_script = Some(script.into());
        self
    }

    /// Set the rewrite mode
    #[must_use]
    pub const fn with_rewrite_mode(mut self, mode: RewriteMode) -> Self {
        self.realigner.mode = mode;
        self
    }

    /// Enable or disable verbose replacement logging
    #[must_use]
    pub const fn with_verbose(mut self, verbose: bool) -> Self {
        self.realigner.verbose = verbose;
        self
    }

    /// Set the namespace for graph IRIs
    #[must_use]
    pub fn with_base_iri(mut self, base_iri: impl Into<String>) -> Self {
        self.base_iri = base_iri.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = PipelineConfig::new()
            .with_corenlp_url("http://corenlp:9000")
            .with_timeout(Duration::from_secs(30))
            .with_rewrite_mode(RewriteMode::Snapshot)
            .with_verbose(true)
            .with_openie_script("/opt/openie/process_large_corpus.sh");

        assert_eq!(config.corenlp_url, "http://corenlp:9000");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.realigner.mode, RewriteMode::Snapshot);
        assert!(config.realigner.verbose);
        assert_eq!(
            config.openie_script,
            Some(PathBuf::from("/opt/openie/process_large_corpus.sh"))
        );
    }

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.corenlp_url, "http://localhost:9000");
        assert_eq!(config.realigner.mode, RewriteMode::Progressive);
        assert!(!config.realigner.sort_all_sentences);
        assert!(config.coref_cache_dir.is_none());
    }

    #[test]
    fn test_init() {
        // Should not fail even if .env doesn't exist
        assert!(init().is_ok());
    }
}
