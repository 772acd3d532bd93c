//! Coreference annotation through CoreNLP, with a cache keyed by document
//!
//! Coreference is by far the slowest stage of the pipeline, so annotations
//! can be kept between runs. The cache is an explicit object owned by the
//! caller: an in-memory LRU layer in front of an optional directory of
//! `<sha256>.json` files.

use async_trait::async_trait;
use cached::{Cached, SizedCache};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::corenlp::{CoreNlpClient, COREF_ANNOTATORS};
use crate::error::Result;
use crate::types::CorefAnnotation;
use crate::CoreferenceAnnotator;

/// Annotator backed by the CoreNLP `coref` annotator
pub struct CoreNlpCoref {
    client: Arc<CoreNlpClient>,
}

impl CoreNlpCoref {
    #[must_use]
    pub const fn new(client: Arc<CoreNlpClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CoreferenceAnnotator for CoreNlpCoref {
    async fn process(&self, text: &str) -> Result<CorefAnnotation> {
        let raw = self.client.annotate_raw(text, COREF_ANNOTATORS).await?;
        let annotation = CorefAnnotation::from_json(&raw)?;

        tracing::debug!(
            clusters = annotation.clusters.len(),
            mentions = annotation.mention_count(),
            "CoreNLP coreference annotation received"
        );

        Ok(annotation)
    }
}

/// Default number of annotations kept in memory
const DEFAULT_CAPACITY: usize = 64;

/// Cache of coreference annotations keyed by document hash
pub struct CorefCache {
    memory: Mutex<SizedCache<String, CorefAnnotation>>,
    dir: Option<PathBuf>,
}

impl CorefCache {
    /// In-memory cache only
    #[must_use]
    pub fn in_memory(capacity: usize) -> Self {
        Self {
            memory: Mutex::new(SizedCache::with_size(capacity.max(1))),
            dir: None,
        }
    }

    /// In-memory cache backed by a directory of JSON files
    #[must_use]
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            ..Self::in_memory(DEFAULT_CAPACITY)
        }
    }

    #[must_use]
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Hex SHA-256 of the document text
    #[must_use]
    pub fn key_for(text: &str) -> String {
        hex::encode(Sha256::digest(text.as_bytes()))
    }

    /// Look up the annotation of a document
    ///
    /// A disk hit is promoted into the memory layer.
    ///
    /// # Errors
    ///
    /// Returns an error if a cache file exists but cannot be read or parsed
    pub fn load(&self, text: &str) -> Result<Option<CorefAnnotation>> {
        let key = Self::key_for(text);

        if let Some(hit) = self.lock().cache_get(&key) {
            return Ok(Some(hit.clone()));
        }

        let Some(path) = self.path_for(&key) else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }

        let annotation = CorefAnnotation::from_json(&std::fs::read_to_string(&path)?)?;
        tracing::debug!(path = %path.display(), "Coreference cache hit on disk");
        self.lock().cache_set(key, annotation.clone());

        Ok(Some(annotation))
    }

    /// Remember the annotation of a document
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory or file cannot be written
    pub fn store(&self, text: &str, annotation: &CorefAnnotation) -> Result<()> {
        let key = Self::key_for(text);

        if let Some(path) = self.path_for(&key) {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, serde_json::to_string_pretty(annotation)?)?;
        }

        self.lock().cache_set(key, annotation.clone());
        Ok(())
    }

    /// Number of annotations held in memory
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().cache_size()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop the memory layer; files on disk are kept
    pub fn clear(&self) {
        self.lock().cache_clear();
    }

    fn path_for(&self, key: &str) -> Option<PathBuf> {
        self.dir.as_ref().map(|dir| dir.join(format!("{key}.json")))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SizedCache<String, CorefAnnotation>> {
        self.memory.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for CorefCache {
    fn default() -> Self {
        Self::in_memory(DEFAULT_CAPACITY)
    }
}
