//! Core data types shared by the annotators, the realigner and the graph

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single textual reference to an entity, as reported by the coreference
/// annotator.
///
/// Indices follow CoreNLP: `sentence_index` is 1-based, token indices are
/// 1-based and `end_token` is exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mention {
    /// The surface text of the mention ("he", "the company", "Varun")
    pub text: String,

    #[serde(rename = "sentNum")]
    pub sentence_index: usize,

    #[serde(rename = "startIndex")]
    pub start_token: usize,

    #[serde(rename = "endIndex")]
    pub end_token: usize,

    #[serde(rename = "headIndex")]
    pub head_token_index: usize,

    /// Whether the annotator flagged this mention as the cluster representative
    #[serde(rename = "isRepresentativeMention", default)]
    pub is_representative: bool,
}

impl Mention {
    /// Create a mention from its text and CoreNLP-style indices
    #[must_use]
    pub fn new(
        text: impl Into<String>,
        sentence_index: usize,
        start_token: usize,
        end_token: usize,
        head_token_index: usize,
    ) -> Self {
        Self {
            text: text.into(),
            sentence_index,
            start_token,
            end_token,
            head_token_index,
            is_representative: false,
        }
    }

    /// The token of the mention text sitting at the head position, if any
    #[must_use]
    pub fn head_word(&self) -> Option<&str> {
        let offset = self.head_token_index.checked_sub(self.start_token)?;
        self.text.split_whitespace().nth(offset)
    }
}

/// All mentions judged to refer to the same entity, in annotator order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    /// Identifier assigned by the annotator (CoreNLP uses the mention id)
    pub id: String,

    pub mentions: Vec<Mention>,
}

impl Cluster {
    #[must_use]
    pub fn new(id: impl Into<String>, mentions: Vec<Mention>) -> Self {
        Self {
            id: id.into(),
            mentions,
        }
    }
}

/// Output of a coreference annotator
///
/// Serializes as CoreNLP does, with clusters under a `"corefs"` object. The
/// order of that object is preserved; a cluster's position is its identity
/// during realignment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorefAnnotation {
    #[serde(rename = "corefs", with = "ordered_clusters", default)]
    pub clusters: Vec<Cluster>,
}

impl CorefAnnotation {
    #[must_use]
    pub const fn new(clusters: Vec<Cluster>) -> Self {
        Self { clusters }
    }

    /// Parse an annotator JSON response (any extra keys are ignored)
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid or the `corefs` entries do not
    /// have the expected mention shape
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Total number of mentions across all clusters
    #[must_use]
    pub fn mention_count(&self) -> usize {
        self.clusters.iter().map(|c| c.mentions.len()).sum()
    }
}

/// (De)serializes `Vec<Cluster>` as a JSON object keyed by cluster id while
/// keeping document order, which `serde_json::Map` would otherwise sort.
mod ordered_clusters {
    use super::{Cluster, Mention};
    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(clusters: &[Cluster], serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(clusters.len()))?;
        for cluster in clusters {
            map.serialize_entry(&cluster.id, &cluster.mentions)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Cluster>, D::Error> {
        deserializer.deserialize_map(ClusterVisitor)
    }

    struct ClusterVisitor;

    impl<'de> Visitor<'de> for ClusterVisitor {
        type Value = Vec<Cluster>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of cluster id to mention list")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
            let mut clusters = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some((id, mentions)) = access.next_entry::<String, Vec<Mention>>()? {
                clusters.push(Cluster { id, mentions });
            }
            Ok(clusters)
        }
    }
}

/// Known named entities: surface text to entity type ("Varun" -> "PERSON")
///
/// Only used for membership lookups during canonical mention selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityMap(HashMap<String, String>);

impl EntityMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entity, replacing the type of an existing key
    pub fn insert(&mut self, text: impl Into<String>, entity_type: impl Into<String>) {
        self.0.insert(text.into(), entity_type.into());
    }

    #[must_use]
    pub fn contains(&self, text: &str) -> bool {
        self.0.contains_key(text)
    }

    #[must_use]
    pub fn entity_type(&self, text: &str) -> Option<&str> {
        self.0.get(text).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Entity names sorted alphabetically, for stable diagnostics and output
    #[must_use]
    pub fn sorted_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.0.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl From<HashMap<String, String>> for EntityMap {
    fn from(map: HashMap<String, String>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EntityMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// One token with the tag assigned by a named entity recognizer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedToken {
    pub token: String,
    pub tag: String,
}

impl TaggedToken {
    /// Tag used by recognizers for tokens outside any entity
    pub const OUTSIDE: &'static str = "O";

    #[must_use]
    pub fn new(token: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            tag: tag.into(),
        }
    }

    #[must_use]
    pub fn is_entity(&self) -> bool {
        self.tag != Self::OUTSIDE
    }
}

/// A subject-relation-object statement extracted from text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Triple {
    pub subject: String,
    pub relation: String,
    pub object: String,

    /// Extractor confidence (0.0-1.0), when reported
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub confidence: Option<f64>,
}

impl Triple {
    #[must_use]
    pub fn new(
        subject: impl Into<String>,
        relation: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            relation: relation.into(),
            object: object.into(),
            confidence: None,
        }
    }

    #[must_use]
    pub const fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }
}
