//! HTTP client for a Stanford CoreNLP server
//!
//! The server is started separately (`java edu.stanford.nlp.pipeline.StanfordCoreNLPServer`).
//! Every request posts the raw text with the pipeline properties encoded in
//! the `properties` query parameter and gets a JSON document back.

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::error::{Error, Result};

/// Annotators for token-level named entity tags
pub const NER_ANNOTATORS: &str = "tokenize,ssplit,ner";

/// Annotators for coreference clusters (CoreNLP adds the prerequisites)
pub const COREF_ANNOTATORS: &str = "coref";

/// Annotators for open information extraction triples
pub const OPENIE_ANNOTATORS: &str = "openie";

/// Connection settings for a CoreNLP server
#[derive(Debug, Clone)]
pub struct CoreNlpConfig {
    /// Server base URL (default: `http://localhost:9000`)
    pub url: String,

    /// Request timeout; coreference on long documents is slow
    pub timeout: Duration,

    /// Value of the `pipelineLanguage` property
    pub language: String,
}

impl Default for CoreNlpConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9000".to_string(),
            timeout: Duration::from_secs(120),
            language: "en".to_string(),
        }
    }
}

/// A sentence of a CoreNLP JSON response
#[derive(Debug, Clone, Deserialize)]
pub struct CoreNlpSentence {
    /// 0-based sentence index
    pub index: usize,

    #[serde(default)]
    pub tokens: Vec<CoreNlpToken>,

    #[serde(default)]
    pub openie: Vec<CoreNlpRelation>,
}

/// A token of a CoreNLP JSON response
#[derive(Debug, Clone, Deserialize)]
pub struct CoreNlpToken {
    /// 1-based token index within the sentence
    pub index: usize,

    pub word: String,

    #[serde(default)]
    pub ner: Option<String>,
}

/// An `openie` relation of a CoreNLP JSON response
#[derive(Debug, Clone, Deserialize)]
pub struct CoreNlpRelation {
    pub subject: String,
    pub relation: String,
    pub object: String,
}

/// The parts of a CoreNLP JSON response this crate reads
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoreNlpDocument {
    #[serde(default)]
    pub sentences: Vec<CoreNlpSentence>,
}

impl CoreNlpDocument {
    /// Parse a CoreNLP JSON response
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Client for a running CoreNLP server
#[derive(Debug, Clone)]
pub struct CoreNlpClient {
    config: CoreNlpConfig,
    http: Client,
}

impl CoreNlpClient {
    /// Create a new client
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the HTTP client cannot be built
    pub fn new(config: CoreNlpConfig) -> Result<Self> {
        Url::parse(&config.url)
            .map_err(|e| Error::Config(format!("Invalid CoreNLP URL '{}': {e}", config.url)))?;

        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(Self { config, http })
    }

    /// Wrap the client for sharing between collaborators
    #[must_use]
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    #[must_use]
    pub const fn config(&self) -> &CoreNlpConfig {
        &self.config
    }

    /// Build the request URL for a set of annotators
    ///
    /// # Errors
    ///
    /// Returns an error if the configured URL is invalid
    pub fn request_url(&self, annotators: &str) -> Result<Url> {
        let mut url = Url::parse(&self.config.url)
            .map_err(|e| Error::Config(format!("Invalid CoreNLP URL: {e}")))?;

        let properties = json!({
            "annotators": annotators,
            "pipelineLanguage": self.config.language,
            "outputFormat": "json",
        });
        url.query_pairs_mut()
            .append_pair("properties", &properties.to_string());

        Ok(url)
    }

    /// Annotate text and return the raw JSON response
    ///
    /// # Errors
    ///
    /// Returns [`Error::Collaborator`] if the server cannot be reached or
    /// rejects the request, and [`Error::Network`] for other HTTP failures
    pub async fn annotate_raw(&self, text: &str, annotators: &str) -> Result<String> {
        let url = self.request_url(annotators)?;
        tracing::debug!(%url, chars = text.len(), "Sending text to CoreNLP");

        let response = self
            .http
            .post(url)
            .body(text.to_string())
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    Error::Collaborator(format!(
                        "CoreNLP server at {} unavailable: {e}",
                        self.config.url
                    ))
                } else {
                    Error::Network(format!("CoreNLP request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Network(format!("Failed to read CoreNLP response: {e}")))?;

        if !status.is_success() {
            return Err(Error::Collaborator(format!(
                "CoreNLP server returned {status}: {body}"
            )));
        }

        Ok(body)
    }

    /// Annotate text and parse the sentences of the response
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is not valid JSON
    pub async fn annotate(&self, text: &str, annotators: &str) -> Result<CoreNlpDocument> {
        let raw = self.annotate_raw(text, annotators).await?;
        CoreNlpDocument::from_json(&raw)
    }
}
