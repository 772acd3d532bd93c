//! Named entity recognition through CoreNLP, and the entity map built from it

use async_trait::async_trait;
use std::sync::Arc;

use crate::corenlp::{CoreNlpClient, CoreNlpDocument, NER_ANNOTATORS};
use crate::error::Result;
use crate::types::{EntityMap, TaggedToken};
use crate::NamedEntityRecognizer;

/// Recognizer backed by the CoreNLP `ner` annotator
pub struct CoreNlpNer {
    client: Arc<CoreNlpClient>,
}

impl CoreNlpNer {
    #[must_use]
    pub const fn new(client: Arc<CoreNlpClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NamedEntityRecognizer for CoreNlpNer {
    async fn process(&self, text: &str) -> Result<Vec<Vec<TaggedToken>>> {
        let doc = self.client.annotate(text, NER_ANNOTATORS).await?;
        Ok(tagged_sentences(&doc))
    }
}

/// Token/tag pairs for every sentence of a CoreNLP response
#[must_use]
pub fn tagged_sentences(doc: &CoreNlpDocument) -> Vec<Vec<TaggedToken>> {
    doc.sentences
        .iter()
        .map(|sentence| {
            sentence
                .tokens
                .iter()
                .map(|token| {
                    TaggedToken::new(
                        token.word.clone(),
                        token.ner.as_deref().unwrap_or(TaggedToken::OUTSIDE),
                    )
                })
                .collect()
        })
        .collect()
}

/// Build the entity lookup used for canonical mention selection
///
/// Every token tagged with an entity type becomes a key; runs of consecutive
/// tokens with the same type are also added as one space-joined phrase
/// ("Barack Obama"). Later occurrences overwrite the type of earlier ones.
#[must_use]
pub fn ner_to_entity_map(tagged: &[Vec<TaggedToken>]) -> EntityMap {
    let mut entities = EntityMap::new();

    for sentence in tagged {
        let mut run: Vec<&str> = Vec::new();
        let mut run_tag: Option<&str> = None;

        for token in sentence {
            if token.is_entity() {
                entities.insert(token.token.as_str(), token.tag.as_str());
            }

            if token.is_entity() && run_tag == Some(token.tag.as_str()) {
                run.push(&token.token);
                continue;
            }

            flush_run(&mut entities, &run, run_tag);
            run.clear();
            run_tag = token.is_entity().then_some(token.tag.as_str());
            if run_tag.is_some() {
                run.push(&token.token);
            }
        }

        flush_run(&mut entities, &run, run_tag);
    }

    entities
}

fn flush_run(entities: &mut EntityMap, run: &[&str], tag: Option<&str>) {
    if let (true, Some(tag)) = (run.len() > 1, tag) {
        entities.insert(run.join(" "), tag);
    }
}
